//! Durable refresh credential storage

pub mod store;

pub use store::{CredentialStore, RotationOutcome, REFRESH_TOKEN_KEY};
