//! User store port: Trait for persistent account storage.
//!
//! This trait abstracts the storage backend (SQLite) from the auth service.

use crate::domain::UserRecord;

/// Error type for user store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Username already taken: {0}")]
    Duplicate(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Trait for user account persistence.
///
/// Each call is a single atomic read or write. Username uniqueness is
/// enforced by the store itself, so two concurrent inserts of the same name
/// cannot both succeed.
pub trait UserStore: Send + Sync {
    /// Find a user by exact username.
    ///
    /// # Returns
    /// `None` if no such user exists.
    ///
    /// # Errors
    /// Returns error if the store cannot be reached.
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a new user.
    ///
    /// # Errors
    /// Returns `StoreError::Duplicate` if the username is taken.
    fn insert(&self, user: &UserRecord) -> Result<(), StoreError>;
}
