//! Error types for the Prism core.

/// Core error type for Prism configuration and shared types.
#[derive(Debug, thiserror::Error)]
pub enum PrismError {
    /// A configuration value could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidSetting {
        /// Name of the setting (environment variable).
        name: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for Prism core operations.
pub type PrismResult<T> = Result<T, PrismError>;
