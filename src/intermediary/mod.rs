//! Intermediary (LP) registry and typed HTTP client (§4.2).

pub mod client;
pub mod registry;
pub mod types;

pub use client::{unwrap_envelope, IntermediaryClient};
pub use registry::{Intermediary, IntermediaryRegistry};
