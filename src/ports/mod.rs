//! Ports layer: Trait definitions for external collaborators.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (model artifact, database).

mod classifier;
mod user_store;

pub use classifier::{ClassifierError, RiskClassifier};
pub use user_store::{StoreError, UserStore};
