//! Stateless bearer tokens.
//!
//! Tokens are HS256 JWTs carrying the username and an expiry. Validity is a
//! function of signature and expiry alone; nothing is stored server-side, so
//! logout cannot revoke a token before it expires.
//!
//! # Memory Security
//!
//! The signing secret implements `Zeroize` and `ZeroizeOnDrop`, and its
//! `Debug` output never includes the secret bytes.

use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CardioError;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// HMAC secret used to sign and verify tokens.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenSecret {
    inner: Vec<u8>,
}

impl TokenSecret {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    /// Returns the required minimum length if `bytes` is too short.
    pub fn new(bytes: Vec<u8>) -> Result<Self, usize> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(MIN_SECRET_LEN);
        }
        Ok(Self { inner: bytes })
    }

    /// Short SHA-256 fingerprint for identifying the secret in logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        Sha256::digest(&self.inner)[..8]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSecret")
            .field("fingerprint", &self.fingerprint())
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies access tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer signing with `secret`; tokens live for `ttl`.
    #[must_use]
    pub fn new(secret: &TokenSecret, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(&secret.inner),
            decoding: DecodingKey::from_secret(&secret.inner),
            validation,
            ttl,
        }
    }

    /// Issue a token for `username`.
    ///
    /// # Errors
    /// Returns `CardioError::Internal` if signing fails.
    pub fn issue(&self, username: &str) -> Result<String, CardioError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.sign(&Claims {
            sub: username.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, CardioError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| CardioError::Internal(format!("Token signing failed: {e}")))
    }

    /// Verify a token and return the username it was issued to.
    ///
    /// # Errors
    /// Returns `CardioError::Unauthenticated` if the token is malformed,
    /// expired, or signed with another secret.
    pub fn verify(&self, token: &str) -> Result<String, CardioError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => CardioError::Unauthenticated("Token has expired"),
                _ => CardioError::Unauthenticated("Invalid token"),
            }
        })?;

        if data.claims.sub.is_empty() {
            return Err(CardioError::Unauthenticated("Invalid token"));
        }
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(byte: u8) -> TokenSecret {
        TokenSecret::new(vec![byte; 48]).expect("long enough")
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&secret(7), Duration::from_secs(900))
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let issuer = issuer();
        let token = issuer.issue("alice").expect("issue");
        assert_eq!(issuer.verify(&token).expect("verify"), "alice");
    }

    #[test]
    fn test_short_secret_rejected() {
        assert_eq!(TokenSecret::new(vec![1; 8]).err(), Some(MIN_SECRET_LEN));
    }

    #[test]
    fn test_secret_debug_no_leak() {
        let s = TokenSecret::new(b"0123456789abcdef0123456789abcdef".to_vec()).expect("secret");
        let out = format!("{s:?}");
        assert!(!out.contains("0123456789abcdef"));
        assert!(out.contains("fingerprint"));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let other = TokenIssuer::new(&secret(9), Duration::from_secs(900));
        let token = other.issue("alice").expect("issue");
        assert!(matches!(
            issuer().verify(&token),
            Err(CardioError::Unauthenticated("Invalid token"))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer();
        let now = chrono::Utc::now().timestamp();
        let token = issuer
            .sign(&Claims {
                sub: "alice".into(),
                iat: now - 120,
                exp: now - 60,
            })
            .expect("sign");
        assert!(matches!(
            issuer.verify(&token),
            Err(CardioError::Unauthenticated("Token has expired"))
        ));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let issuer = issuer();
        for token in ["", "abc", "a.b.c", "Bearer x"] {
            assert!(matches!(
                issuer.verify(token),
                Err(CardioError::Unauthenticated(_))
            ));
        }
    }

    #[test]
    fn test_tampered_token_rejected() {
        let issuer = issuer();
        let token = issuer.issue("alice").expect("issue");
        let forged = issuer
            .issue("mallory")
            .expect("issue")
            .split('.')
            .nth(1)
            .map(str::to_string)
            .expect("payload");
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert!(issuer.verify(&tampered).is_err());
    }
}
