//! Authentication and authorization
//!
//! - [`password`]: bcrypt hashing for the credential store
//! - [`session`]: signed, stateless session tokens (HS256 JWT)
//! - [`prefix`]: per-user object key namespace checks

pub mod password;
pub mod prefix;
pub mod session;

pub use password::{hash_password, verify_password};
pub use prefix::{authorize_key, authorize_keys, scoped_key, user_prefix};
pub use session::{Claims, IssuedSession, SessionIssuer};
