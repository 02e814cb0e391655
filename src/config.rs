use anyhow::{bail, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// `r2` (default) or `memory`
    pub provider: String,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    pub session_ttl_secs: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Every missing required variable is reported in a single error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut missing: Vec<&'static str> = Vec::new();

        let provider = var("STORAGE_PROVIDER").unwrap_or_else(|| "r2".to_string());
        let uses_r2 = provider != "memory";

        let database_url = var("DATABASE_URL").unwrap_or_else(|| {
            missing.push("DATABASE_URL");
            String::new()
        });

        let endpoint = match (var("R2_ENDPOINT"), var("R2_ACCOUNT_ID")) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account_id)) => format!("https://{}.r2.cloudflarestorage.com", account_id),
            (None, None) => {
                if uses_r2 {
                    missing.push("R2_ENDPOINT (or R2_ACCOUNT_ID)");
                }
                String::new()
            }
        };

        let mut storage_var = |name: &'static str| {
            var(name).unwrap_or_else(|| {
                if uses_r2 {
                    missing.push(name);
                }
                String::new()
            })
        };
        let access_key_id = storage_var("R2_ACCESS_KEY_ID");
        let secret_access_key = storage_var("R2_SECRET_ACCESS_KEY");
        let bucket = storage_var("R2_BUCKET_NAME");

        let secret = var("SESSION_SECRET")
            .or_else(|| var("NEXTAUTH_SECRET"))
            .unwrap_or_else(|| {
                missing.push("SESSION_SECRET");
                String::new()
            });

        if !missing.is_empty() {
            bail!("Missing environment variables: {}", missing.join(", "));
        }

        Ok(Self {
            server: ServerConfig {
                port: var("PORT").unwrap_or_else(|| "3000".to_string()).parse()?,
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                cors_allowed_origins: var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|| "http://localhost:3000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_upload_bytes: var("MAX_UPLOAD_BYTES")
                    .unwrap_or_else(|| (50 * 1024 * 1024).to_string())
                    .parse()?,
                static_dir: var("STATIC_DIR").unwrap_or_else(|| "static".to_string()),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()?,
                min_connections: var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|| "1".to_string())
                    .parse()?,
            },
            storage: StorageConfig {
                provider,
                endpoint,
                region: var("R2_REGION").unwrap_or_else(|| "auto".to_string()),
                bucket,
                access_key_id,
                secret_access_key,
                request_timeout_secs: var("R2_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse()?,
            },
            auth: AuthConfig {
                secret,
                session_ttl_secs: var("SESSION_TTL_SECS")
                    .unwrap_or_else(|| (30 * 24 * 3600).to_string())
                    .parse()?,
                cookie_name: var("SESSION_COOKIE_NAME").unwrap_or_else(|| "session".to_string()),
                cookie_secure: var("SESSION_COOKIE_SECURE")
                    .unwrap_or_else(|| "false".to_string())
                    .parse()?,
            },
            logging: LoggingConfig {
                dir: var("LOG_DIR"),
            },
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        let vars = [
            ("DATABASE_URL", "postgres://localhost/filebox_test"),
            ("STORAGE_PROVIDER", "memory"),
            ("R2_BUCKET_NAME", "test-bucket"),
            ("SESSION_SECRET", "test-session-secret"),
        ];
        Self::from_lookup(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        })
        .expect("test configuration is complete")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let err = Config::from_lookup(lookup_from(&[("R2_ACCESS_KEY_ID", "ak")])).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("DATABASE_URL"));
        assert!(message.contains("R2_ENDPOINT"));
        assert!(message.contains("R2_SECRET_ACCESS_KEY"));
        assert!(message.contains("R2_BUCKET_NAME"));
        assert!(message.contains("SESSION_SECRET"));
        assert!(!message.contains("R2_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_account_id_derives_endpoint() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("R2_ACCOUNT_ID", "abc123"),
            ("R2_ACCESS_KEY_ID", "ak"),
            ("R2_SECRET_ACCESS_KEY", "sk"),
            ("R2_BUCKET_NAME", "files"),
            ("NEXTAUTH_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.storage.endpoint, "https://abc123.r2.cloudflarestorage.com");
        assert_eq!(config.storage.region, "auto");
        assert_eq!(config.auth.secret, "s3cret");
        assert_eq!(config.auth.cookie_name, "session");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_memory_provider_skips_r2_credentials() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("STORAGE_PROVIDER", "memory"),
            ("SESSION_SECRET", "s"),
        ]))
        .unwrap();

        assert_eq!(config.storage.provider, "memory");
        assert!(config.storage.access_key_id.is_empty());
    }
}
