//! Error types for request signing.

/// Errors that can occur while signing or verifying a request.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The access profile has no access key id.
    #[error("missing access key id")]
    MissingAccessKeyId,

    /// The access profile has no secret access key.
    #[error("missing secret access key")]
    MissingSecretAccessKey,

    /// The destination has no bucket.
    #[error("missing bucket")]
    MissingBucket,

    /// The body digest is not the base64 form of a 16-byte MD5 digest.
    #[error("Content-MD5 must be the base64 encoding of a binary MD5 digest: {0:?}")]
    InvalidContentMd5(String),

    /// The HMAC key was rejected.
    #[error("invalid signing key")]
    InvalidKey,

    /// The `Authorization` value could not be parsed.
    #[error("invalid Authorization header format")]
    InvalidAuthorization,

    /// The token was issued for a different access key.
    #[error("access key mismatch: {0}")]
    AccessKeyMismatch(String),

    /// The computed signature does not match the provided signature.
    #[error("signature does not match")]
    SignatureDoesNotMatch,
}
