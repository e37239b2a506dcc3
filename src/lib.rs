//! coursegate: authentication, access control, rate limiting and response caching for the
//! course-management REST API.
//!
//! The pipeline lives in [`gate`]; identities, tokens and role/ownership decisions in [`identity`];
//! [`server`] wires both into an axum router with in-memory collaborators.

pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod server;

pub use config::GateConfig;
pub use error::{FieldError, GateError, GateResult};
