//! Runtime configuration from the environment.
//!
//! Every setting has a `CARDIORISK_*` name; a few also accept the bare name
//! used by older deployments (`PORT`, `ALLOWED_ORIGINS`, `MODEL_PATH`).
//!
//! The token signing secret is loaded separately by [`load_token_secret`]
//! and never has a default.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use zeroize::Zeroizing;

use crate::domain::token::{TokenSecret, MIN_SECRET_LEN};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,https://*.vercel.app";

const TOKEN_SECRET_FILE_ENV: &str = "CARDIORISK_TOKEN_SECRET_FILE";
const TOKEN_SECRET_DOCKER_PATH: &str = "/run/secrets/cardiorisk_token_secret";
const TOKEN_SECRET_ENV_DEV: &str = "CARDIORISK_TOKEN_SECRET";
const TOKEN_SECRET_ENV_LEGACY: &str = "JWT_SECRET_KEY";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error(
        "Missing token secret: set CARDIORISK_TOKEN_SECRET_FILE or mount /run/secrets/cardiorisk_token_secret (debug builds also read CARDIORISK_TOKEN_SECRET or JWT_SECRET_KEY)"
    )]
    MissingSecret,

    #[error("Token secret must be at least {0} bytes")]
    WeakSecret(usize),

    #[error("Cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub model_path: PathBuf,
    pub model_pubkey_file: Option<PathBuf>,
    pub db_path: PathBuf,
    pub token_ttl: Duration,
    pub store_timeout: Duration,
    pub classifier_timeout: Duration,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup` (variable name to value).
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str, fallback: Option<&str>| {
            lookup(name)
                .or_else(|| fallback.and_then(|f| lookup(f)))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get("CARDIORISK_HOST", None).unwrap_or_else(|| "0.0.0.0".to_string());
        let host: IpAddr = host.parse().map_err(|_| ConfigError::Invalid {
            name: "CARDIORISK_HOST",
            value: host.clone(),
        })?;
        let port = parse_or(get("CARDIORISK_PORT", Some("PORT")), "CARDIORISK_PORT", 5000u16)?;

        let allowed_origins = get("CARDIORISK_ALLOWED_ORIGINS", Some("ALLOWED_ORIGINS"))
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bind: SocketAddr::new(host, port),
            allowed_origins,
            model_path: get("CARDIORISK_MODEL_PATH", Some("MODEL_PATH"))
                .map_or_else(|| PathBuf::from("models"), PathBuf::from),
            model_pubkey_file: get("CARDIORISK_MODEL_PUBKEY_B64_FILE", None).map(PathBuf::from),
            db_path: get("CARDIORISK_DB_PATH", None)
                .map_or_else(|| PathBuf::from("data/users.db"), PathBuf::from),
            token_ttl: Duration::from_secs(parse_or(
                get("CARDIORISK_TOKEN_TTL_SECS", None),
                "CARDIORISK_TOKEN_TTL_SECS",
                900,
            )?),
            store_timeout: Duration::from_millis(parse_or(
                get("CARDIORISK_STORE_TIMEOUT_MS", None),
                "CARDIORISK_STORE_TIMEOUT_MS",
                5000,
            )?),
            classifier_timeout: Duration::from_millis(parse_or(
                get("CARDIORISK_CLASSIFIER_TIMEOUT_MS", None),
                "CARDIORISK_CLASSIFIER_TIMEOUT_MS",
                2000,
            )?),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Load the token signing secret.
///
/// Sources, first match wins:
/// 1. file named by `CARDIORISK_TOKEN_SECRET_FILE`
/// 2. `/run/secrets/cardiorisk_token_secret` (Docker/Compose secret)
/// 3. `CARDIORISK_TOKEN_SECRET` or `JWT_SECRET_KEY` (debug builds only)
///
/// # Errors
/// Returns `ConfigError` if no source is set, a file cannot be read, or the
/// secret is shorter than 32 bytes.
pub fn load_token_secret() -> Result<TokenSecret, ConfigError> {
    load_token_secret_from(
        |name| std::env::var(name).ok(),
        Path::new(TOKEN_SECRET_DOCKER_PATH),
    )
}

fn load_token_secret_from<F>(lookup: F, docker_path: &Path) -> Result<TokenSecret, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw: Zeroizing<String> = if let Some(path) = lookup(TOKEN_SECRET_FILE_ENV) {
        read_secret_file(Path::new(path.trim()))?
    } else if docker_path.exists() {
        read_secret_file(docker_path)?
    } else if cfg!(debug_assertions) {
        let value = lookup(TOKEN_SECRET_ENV_DEV)
            .or_else(|| lookup(TOKEN_SECRET_ENV_LEGACY))
            .ok_or(ConfigError::MissingSecret)?;
        tracing::warn!("Using token secret from environment (debug build only)");
        Zeroizing::new(value)
    } else {
        return Err(ConfigError::MissingSecret);
    };

    let trimmed = raw.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        return Err(ConfigError::MissingSecret);
    }
    TokenSecret::new(trimmed.as_bytes().to_vec()).map_err(|_| ConfigError::WeakSecret(MIN_SECRET_LEN))
}

fn read_secret_file(path: &Path) -> Result<Zeroizing<String>, ConfigError> {
    std::fs::read_to_string(path)
        .map(Zeroizing::new)
        .map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Whether `origin` matches one of the allowed `patterns`.
///
/// A pattern is an exact origin, `*` for any origin, or an origin with one
/// `*` standing for a single non-empty DNS label run (`https://*.vercel.app`).
#[must_use]
pub fn origin_allowed(patterns: &[String], origin: &str) -> bool {
    patterns.iter().any(|pattern| match pattern.split_once('*') {
        None => pattern == origin,
        Some(("", "")) => true,
        Some((prefix, suffix)) => {
            origin.len() > prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
                && !origin[prefix.len()..origin.len() - suffix.len()].contains(['/', ':'])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.bind.to_string(), "0.0.0.0:5000");
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "https://*.vercel.app"]
        );
        assert!(origin_allowed(&config.allowed_origins, "https://heart-ui.vercel.app"));
        assert_eq!(config.model_path, PathBuf::from("models"));
        assert_eq!(config.db_path, PathBuf::from("data/users.db"));
        assert_eq!(config.token_ttl, Duration::from_secs(900));
        assert_eq!(config.store_timeout, Duration::from_millis(5000));
        assert!(config.model_pubkey_file.is_none());
    }

    #[test]
    fn test_fallback_names_and_precedence() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "https://a.example, https://*.vercel.app ,"),
            ("MODEL_PATH", "/srv/model"),
        ]))
        .expect("config");
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://*.vercel.app"]
        );
        assert_eq!(config.model_path, PathBuf::from("/srv/model"));

        let config = AppConfig::from_lookup(lookup(&[("PORT", "8080"), ("CARDIORISK_PORT", "9090")]))
            .expect("config");
        assert_eq!(config.bind.port(), 9090);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("CARDIORISK_PORT", "http")])).expect_err("port");
        assert!(matches!(err, ConfigError::Invalid { name: "CARDIORISK_PORT", .. }));

        let err = AppConfig::from_lookup(lookup(&[("CARDIORISK_HOST", "not a host")]))
            .expect_err("host");
        assert!(matches!(err, ConfigError::Invalid { name: "CARDIORISK_HOST", .. }));
    }

    #[test]
    fn test_origin_patterns() {
        let patterns = vec![
            "http://localhost:3000".to_string(),
            "https://*.vercel.app".to_string(),
        ];
        assert!(origin_allowed(&patterns, "http://localhost:3000"));
        assert!(origin_allowed(&patterns, "https://heart-ui.vercel.app"));
        assert!(!origin_allowed(&patterns, "https://.vercel.app"));
        assert!(!origin_allowed(&patterns, "https://evil.com/x.vercel.app"));
        assert!(!origin_allowed(&patterns, "http://heart-ui.vercel.app"));
        assert!(!origin_allowed(&patterns, "http://localhost:3001"));

        assert!(origin_allowed(&["*".to_string()], "https://anything.example"));
    }

    #[test]
    fn test_secret_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("secret");
        std::fs::write(&path, "0123456789abcdef0123456789abcdef\n").expect("write");

        let path_str = path.display().to_string();
        let secret = load_token_secret_from(
            lookup(&[(TOKEN_SECRET_FILE_ENV, path_str.as_str())]),
            &dir.path().join("absent"),
        )
        .expect("secret");
        assert_eq!(secret.fingerprint().len(), 16);
    }

    #[test]
    fn test_short_secret_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let docker = dir.path().join("docker_secret");
        std::fs::write(&docker, "short").expect("write");

        let err = load_token_secret_from(lookup(&[]), &docker).expect_err("short");
        assert!(matches!(err, ConfigError::WeakSecret(32)));
    }

    #[test]
    fn test_missing_secret() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_token_secret_from(lookup(&[]), &dir.path().join("absent"))
            .expect_err("missing");
        assert!(matches!(err, ConfigError::MissingSecret));
        let message = err.to_string();
        assert!(message.contains("CARDIORISK_TOKEN_SECRET_FILE"));
        assert!(message.contains("JWT_SECRET_KEY"));
    }

    #[test]
    fn test_env_secret_in_debug_builds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_token_secret_from(
            lookup(&[(TOKEN_SECRET_ENV_LEGACY, "a-dev-secret-that-is-long-enough-123")]),
            &dir.path().join("absent"),
        );
        assert_eq!(result.is_ok(), cfg!(debug_assertions));
    }
}
