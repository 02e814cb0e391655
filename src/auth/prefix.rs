//! Key-prefix authorizer
//!
//! Every user owns the `uploads/{email}/` namespace. A key is accessible only
//! when it lies inside the caller's namespace and has no dot or empty path
//! segments; the check is repeated on every request.

use crate::types::{AppError, AppResult};

const UPLOAD_ROOT: &str = "uploads";

pub fn user_prefix(email: &str) -> String {
    format!("{}/{}/", UPLOAD_ROOT, email)
}

/// Rejects `.`, `..` and empty segments. The S3 client normalizes request
/// paths, so `uploads/a/../b/x` would otherwise address `uploads/b/x` after
/// passing the prefix test. A trailing `/` is allowed for listing prefixes.
pub fn check_key_segments(key: &str) -> AppResult<()> {
    let mut segments = key.split('/').peekable();
    while let Some(segment) = segments.next() {
        let is_last = segments.peek().is_none();
        let invalid = segment == "." || segment == ".." || (segment.is_empty() && !is_last);
        if invalid {
            return Err(AppError::InvalidRequest(format!("Invalid object key: {}", key)));
        }
    }
    Ok(())
}

pub fn authorize_key(email: &str, key: &str) -> AppResult<()> {
    check_key_segments(key)?;
    if key.starts_with(&user_prefix(email)) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Access denied: the object is outside your namespace".to_string(),
        ))
    }
}

/// An empty key list is vacuously allowed; callers that need at least one key
/// validate that before authorizing.
pub fn authorize_keys<S: AsRef<str>>(email: &str, keys: &[S]) -> AppResult<()> {
    keys.iter()
        .try_for_each(|key| authorize_key(email, key.as_ref()))
}

/// Key for a direct upload: `uploads/{email}/{prefix}/{filename}`.
///
/// `prefix` is taken relative to the user's namespace (a prefix that already
/// names the namespace is accepted as-is). Whitespace, empty segments and
/// `.`/`..` segments are dropped; only the last segment of `filename` is kept.
pub fn scoped_key(email: &str, prefix: &str, filename: &str) -> AppResult<String> {
    let root = user_prefix(email);
    let relative = prefix.trim().strip_prefix(root.as_str()).unwrap_or(prefix);

    let segments: Vec<String> = relative
        .split('/')
        .map(|segment| segment.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|segment| !segment.is_empty() && segment != "." && segment != "..")
        .collect();

    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| AppError::InvalidRequest("A file name is required".to_string()))?;

    let mut key = root;
    for segment in segments {
        key.push_str(&segment);
        key.push('/');
    }
    key.push_str(name);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_own_namespace_only() {
        assert!(authorize_key("a@x.com", "uploads/a@x.com/123/report.pdf").is_ok());
        assert!(authorize_key("b@x.com", "uploads/a@x.com/123/report.pdf").is_err());
        // a shared prefix of the email is not enough
        assert!(authorize_key("a@x.co", "uploads/a@x.com/123/report.pdf").is_err());
        assert!(authorize_key("a@x.com", "uploads/a@x.com").is_err());
        assert!(authorize_key("a@x.com", "").is_err());
    }

    #[test]
    fn test_allows_iff_prefixed() {
        let emails = ["a@x.com", "b@y.org", "c.d+e@z.io"];
        let keys = [
            "uploads/a@x.com/1/f.txt",
            "uploads/b@y.org/",
            "uploads/c.d+e@z.io/x/y/z",
            "other/a@x.com/f.txt",
            "uploads/a@x.com.evil/f.txt",
            "f.txt",
        ];
        for email in emails {
            for key in keys {
                let expected = key.starts_with(&format!("uploads/{}/", email));
                assert_eq!(authorize_key(email, key).is_ok(), expected, "{} {}", email, key);
            }
        }
    }

    #[test]
    fn test_dot_segments_rejected() {
        for key in [
            "uploads/a@x.com/../b@x.com/123/report.pdf",
            "uploads/a@x.com/./f.txt",
            "uploads/a@x.com//f.txt",
            "uploads/a@x.com/docs/..",
            "/uploads/a@x.com/f.txt",
        ] {
            let err = authorize_key("a@x.com", key).unwrap_err();
            assert!(matches!(err, AppError::InvalidRequest(_)), "{}", key);
        }

        assert!(authorize_key("a@x.com", "uploads/a@x.com/").is_ok());
        assert!(authorize_key("a@x.com", "uploads/a@x.com/docs/").is_ok());
        assert!(authorize_key("a@x.com", "uploads/a@x.com/1/...txt").is_ok());
        assert!(authorize_key("a@x.com", "uploads/a@x.com/1/.env").is_ok());
    }

    #[test]
    fn test_key_lists() {
        let empty: [&str; 0] = [];
        assert!(authorize_keys("a@x.com", &empty).is_ok());
        assert!(authorize_keys(
            "a@x.com",
            &["uploads/a@x.com/1", "uploads/a@x.com/2"]
        )
        .is_ok());
        let err = authorize_keys("a@x.com", &["uploads/a@x.com/1", "uploads/b@x.com/2"])
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = authorize_keys("a@x.com", &["uploads/a@x.com/1", "uploads/a@x.com/../b@x.com/2"])
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn test_scoped_key_sanitizes_prefix() {
        assert_eq!(
            scoped_key("a@x.com", "", "report.pdf").unwrap(),
            "uploads/a@x.com/report.pdf"
        );
        assert_eq!(
            scoped_key("a@x.com", " /docs/ 2024 /", "report.pdf").unwrap(),
            "uploads/a@x.com/docs/2024/report.pdf"
        );
        assert_eq!(
            scoped_key("a@x.com", "../../uploads/b@x.com", "r.pdf").unwrap(),
            "uploads/a@x.com/uploads/b@x.com/r.pdf"
        );
        assert_eq!(
            scoped_key("a@x.com", "uploads/a@x.com/docs", "r.pdf").unwrap(),
            "uploads/a@x.com/docs/r.pdf"
        );
        assert_eq!(
            scoped_key("a@x.com", "", "C:\\tmp\\r.pdf").unwrap(),
            "uploads/a@x.com/r.pdf"
        );
    }

    #[test]
    fn test_scoped_key_requires_filename() {
        assert!(scoped_key("a@x.com", "docs", "").is_err());
        assert!(scoped_key("a@x.com", "docs", "dir/").is_err());
        assert!(scoped_key("a@x.com", "docs", "..").is_err());
    }
}
