use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use crate::config::DatabaseConfig;
use crate::models::User;
use crate::types::AppResult;
use anyhow::Result;

pub use memory::*;
pub use operations::*;
pub use pool::*;

pub mod memory;
pub mod pool;
pub mod operations;

/// Credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Fails with `InvalidRequest` when the email is already registered.
    async fn create_user(&self, email: &str, password_hash: &str) -> AppResult<User>;

    async fn ping(&self) -> AppResult<()>;
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(&config.url)
        .await?;

    // Test connection
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await?;

    Ok(pool)
}
