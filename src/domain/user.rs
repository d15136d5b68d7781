//! User account record.

use serde::{Deserialize, Serialize};

/// A registered user as persisted by the user store.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique login name
    pub username: String,

    /// Argon2id PHC string (never the password itself)
    pub password_hash: String,

    /// Registration time
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: chrono::Utc::now(),
        }
    }
}

// The hash stays out of logs.
impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
