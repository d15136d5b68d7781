//! Auth service: Registration, login and token verification.
//!
//! Sessions are stateless bearer tokens (see [`TokenIssuer`]). The only
//! persisted state is the user record holding an Argon2id hash.

use std::sync::Arc;
use std::time::Duration;

use super::{run_blocking, run_bounded};
use crate::domain::{password, TokenIssuer, UserRecord};
use crate::ports::UserStore;
use crate::{CardioError, Result};

/// Service for account and session operations.
pub struct AuthService<S>
where
    S: UserStore + 'static,
{
    store: Arc<S>,
    tokens: TokenIssuer,
    timeout: Duration,
}

impl<S> AuthService<S>
where
    S: UserStore + 'static,
{
    /// Create a new auth service; each store call is bounded by `timeout`.
    pub fn new(store: Arc<S>, tokens: TokenIssuer, timeout: Duration) -> Self {
        Self {
            store,
            tokens,
            timeout,
        }
    }

    /// Register a user and log them in.
    ///
    /// # Errors
    /// - `Validation` if either field is empty
    /// - `UserExists` if the username is taken (including a concurrent insert)
    /// - `StoreUnavailable` / `Timeout` if the store cannot be reached
    pub async fn register(&self, username: &str, password: &str) -> Result<String> {
        require_credentials(username, password)?;

        if self.find(username).await?.is_some() {
            return Err(CardioError::UserExists);
        }

        let secret = password.to_string();
        let password_hash = run_blocking("Password hashing", move || {
            password::hash_password(&secret).map_err(|e| CardioError::Internal(e.to_string()))
        })
        .await?;

        let record = UserRecord::new(username, password_hash);
        let store = Arc::clone(&self.store);
        run_bounded(self.timeout, "User store", move || {
            store.insert(&record).map_err(CardioError::from)
        })
        .await?;

        tracing::info!(username, "Registered new user");
        self.tokens.issue(username)
    }

    /// Authenticate and issue a token.
    ///
    /// # Errors
    /// - `Validation` if either field is empty
    /// - `InvalidCredentials` for an unknown user or a wrong password alike
    /// - `StoreUnavailable` / `Timeout` if the store cannot be reached
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        require_credentials(username, password)?;

        let user = self.find(username).await?;
        let secret = password.to_string();

        let verified = run_blocking("Password verification", move || {
            let Some(user) = user else {
                password::verify_against_dummy(&secret);
                return Ok(false);
            };
            match password::verify_password(&secret, &user.password_hash) {
                Ok(ok) => Ok(ok),
                Err(e) => {
                    tracing::warn!("Unusable stored hash: {e}");
                    Ok(false)
                }
            }
        })
        .await?;

        if !verified {
            tracing::info!(username, "Login rejected");
            return Err(CardioError::InvalidCredentials);
        }
        tracing::info!(username, "Logged in");
        self.tokens.issue(username)
    }

    /// Resolve a bearer token to its username.
    ///
    /// # Errors
    /// Returns `Unauthenticated` if the token is malformed, expired or forged.
    pub fn verify(&self, token: &str) -> Result<String> {
        self.tokens.verify(token)
    }

    /// End a session. Tokens are not tracked server-side, so this only
    /// records the event; the client discards the token.
    pub fn logout(&self, username: &str) {
        tracing::info!(username, "Logged out");
    }

    async fn find(&self, username: &str) -> Result<Option<UserRecord>> {
        let store = Arc::clone(&self.store);
        let username = username.to_string();
        run_bounded(self.timeout, "User store", move || {
            store.find_by_username(&username).map_err(CardioError::from)
        })
        .await
    }
}

fn require_credentials(username: &str, password: &str) -> Result<()> {
    if username.is_empty() || password.is_empty() {
        return Err(CardioError::Validation(
            "Username and password are required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteUserStore;
    use crate::domain::TokenSecret;
    use crate::ports::StoreError;

    fn issuer() -> TokenIssuer {
        let secret = TokenSecret::new(vec![42; 32]).expect("secret");
        TokenIssuer::new(&secret, Duration::from_secs(900))
    }

    fn create_test_service() -> AuthService<SqliteUserStore> {
        let store = Arc::new(SqliteUserStore::in_memory().expect("Should create db"));
        AuthService::new(store, issuer(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_register_returns_usable_token() {
        let service = create_test_service();
        let token = service.register("alice", "s3cret").await.expect("register");
        assert_eq!(service.verify(&token).expect("verify"), "alice");
    }

    #[tokio::test]
    async fn test_register_twice_fails() {
        let service = create_test_service();
        service.register("alice", "s3cret").await.expect("register");

        let err = service.register("alice", "other").await.expect_err("duplicate");
        assert!(matches!(err, CardioError::UserExists));

        // Original password still works.
        service.login("alice", "s3cret").await.expect("login");
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let service = create_test_service();
        for (u, p) in [("", "pw"), ("alice", ""), ("", "")] {
            let err = service.register(u, p).await.expect_err("empty");
            assert_eq!(err.to_string(), "Username and password are required");
            let err = service.login(u, p).await.expect_err("empty");
            assert!(matches!(err, CardioError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let service = create_test_service();
        service.register("alice", "s3cret").await.expect("register");

        let wrong_password = service.login("alice", "nope").await.expect_err("wrong");
        let unknown_user = service.login("mallory", "s3cret").await.expect_err("unknown");

        assert!(matches!(wrong_password, CardioError::InvalidCredentials));
        assert!(matches!(unknown_user, CardioError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let service = create_test_service();
        service.register("bob", "hunter2").await.expect("register");
        let token = service.login("bob", "hunter2").await.expect("login");
        assert_eq!(service.verify(&token).expect("verify"), "bob");
        service.logout("bob");
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let service = Arc::new(create_test_service());
        let a = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.register("carol", "pw-a").await }
        });
        let b = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.register("carol", "pw-b").await }
        });

        let results = [a.await.expect("join"), b.await.expect("join")];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let dup = results
            .iter()
            .filter(|r| matches!(r, Err(CardioError::UserExists)))
            .count();
        assert_eq!((ok, dup), (1, 1));
    }

    /// Store that never answers in time.
    struct StalledStore;

    impl UserStore for StalledStore {
        fn find_by_username(&self, _: &str) -> std::result::Result<Option<UserRecord>, StoreError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(None)
        }

        fn insert(&self, _: &UserRecord) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    /// Store that is down.
    struct DownStore;

    impl UserStore for DownStore {
        fn find_by_username(&self, _: &str) -> std::result::Result<Option<UserRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn insert(&self, _: &UserRecord) -> std::result::Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_timeout() {
        let service = AuthService::new(Arc::new(StalledStore), issuer(), Duration::from_millis(20));
        let err = service.login("alice", "pw").await.expect_err("timeout");
        assert!(matches!(err, CardioError::Timeout("User store")));
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let service = AuthService::new(Arc::new(DownStore), issuer(), Duration::from_secs(1));
        let err = service.register("alice", "pw").await.expect_err("down");
        assert!(matches!(err, CardioError::StoreUnavailable(_)));
    }
}
