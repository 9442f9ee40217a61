//! Object-store protocol client for Prism.
//!
//! [`ObjectStoreClient`] owns a registry of named destinations (bucket, key
//! prefix and credentials) and hands out [`ObjectStoreRequest`]s bound to one
//! of them. A request performs one `HEAD`, `GET`, `PUT` or `DELETE` at a time,
//! streams bodies so that [`ObjectStoreRequest::cancel`] can interrupt a
//! transfer from any thread, and must be [`reset`](ObjectStoreRequest::reset)
//! before it is reused.
//!
//! # Modules
//!
//! - [`client`] - Destination registry and request factory
//! - [`error`] - Store, validation and profiles error types
//! - [`profiles`] - Destination profiles file loader
//! - [`request`] - The request state machine
//! - [`response`] - Response metadata parsed from headers

pub mod client;
pub mod error;
pub mod profiles;
pub mod request;
pub mod response;

pub use client::ObjectStoreClient;
pub use error::{ProfilesError, StoreError, ValidationError};
pub use profiles::load_profiles;
pub use request::{CancelHandle, ObjectStoreRequest, RequestState};
pub use response::ResponseMetadata;
