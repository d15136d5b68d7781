//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `logistic`: exported logistic-regression model (serde_json, ed25519-dalek)
//! - `sqlite`: SQLite user store
//! - `sanitize`: credential filtering for logs

pub mod logistic;
pub mod sanitize;
pub mod sqlite;
