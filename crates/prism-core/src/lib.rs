//! Core types and configuration for Prism.
//!
//! This crate provides the building blocks shared by the signer, the
//! object-store client and the synchronization engine: credential and
//! destination value types, and the settings consumed by the core.

mod config;
mod error;
mod types;

pub use config::PrismConfig;
pub use error::{PrismError, PrismResult};
pub use types::{AccessProfile, Destination};
