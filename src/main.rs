//! Cardiorisk: cardiovascular risk prediction service.
//!
//! Main entry point for the HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardiorisk::adapters::logistic::{LogisticClassifier, ModelTrust};
use cardiorisk::adapters::sanitize::SanitizingMakeWriter;
use cardiorisk::adapters::sqlite::SqliteUserStore;
use cardiorisk::application::{AuthService, PredictionService};
use cardiorisk::config::{load_token_secret, AppConfig};
use cardiorisk::domain::TokenIssuer;
use cardiorisk::http::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    //
    // Default is stdout (so `docker logs` works); CARDIORISK_LOG_MODE=file
    // writes to CARDIORISK_LOG_FILE instead.
    let use_file = std::env::var("CARDIORISK_LOG_MODE").is_ok_and(|m| m == "file");

    let (writer, _guard) = if use_file {
        let log_file = std::env::var("CARDIORISK_LOG_FILE")
            .unwrap_or_else(|_| "data/cardiorisk.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: don't fail startup just because the directory is missing.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Cannot open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting Cardiorisk...");

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let secret = load_token_secret().context("Cannot load token secret")?;
    tracing::info!("Token secret loaded (fingerprint {})", secret.fingerprint());

    let store = SqliteUserStore::open(&config.db_path, config.store_timeout)
        .with_context(|| format!("Cannot open user store {}", config.db_path.display()))?;

    // A missing or untrusted model is not fatal: /predict fails closed until fixed.
    let mut classifier = LogisticClassifier::new();
    let trust = match &config.model_pubkey_file {
        Some(path) => ModelTrust::from_pubkey_file(path),
        None => Ok(ModelTrust::Unsigned),
    };
    if let Err(e) = trust.and_then(|trust| classifier.load_model(&config.model_path, &trust)) {
        tracing::error!("Model not loaded, predictions disabled: {e}");
    }

    let prediction = PredictionService::new(Arc::new(classifier), config.classifier_timeout);
    let auth = AuthService::new(
        Arc::new(store),
        TokenIssuer::new(&secret, config.token_ttl),
        config.store_timeout,
    );
    drop(secret);

    if !prediction.is_ready() {
        tracing::warn!("Serving without a model");
    }

    let state = Arc::new(AppState::new(prediction, auth));
    let app = http::router(state, &config.allowed_origins);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Cannot bind {}", config.bind))?;
    tracing::info!("Listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Cardiorisk shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
