//! Signature Version 2 signing.
//!
//! ```text
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedResource
//! ```
//!
//! `Content-MD5` is always the base64 form of the binary MD5 digest, the same
//! value sent in the `Content-MD5` header. The resource is
//! `/bucket/prefix/key`, percent-encoded exactly as it appears in the URL.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use digest::Digest;
use hmac::{Hmac, KeyInit, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use prism_core::{AccessProfile, Destination};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::SigningError;

type HmacSha1 = Hmac<Sha1>;

/// Characters left untouched in object paths: unreserved characters and `/`.
const OBJECT_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Length of a binary MD5 digest.
const MD5_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Verb
// ---------------------------------------------------------------------------

/// HTTP verbs used against the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Fetch object metadata.
    Head,
    /// Download an object.
    Get,
    /// Upload an object.
    Put,
    /// Delete an object.
    Delete,
}

impl Verb {
    /// The verb as it appears on the wire and in the string to sign.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Head => "HEAD",
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Base64 of the binary MD5 digest of `body`.
///
/// # Examples
///
/// ```
/// assert_eq!(prism_auth::content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
/// ```
#[must_use]
pub fn content_md5(body: &[u8]) -> String {
    BASE64.encode(md5::Md5::digest(body))
}

/// Format a timestamp as an RFC 1123 date (`Tue, 27 Mar 2007 19:36:42 GMT`).
///
/// Day and month names are always English regardless of the host locale.
#[must_use]
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Percent-encode an object path, keeping `/` separators.
#[must_use]
pub fn encode_object_path(object_path: &str) -> String {
    utf8_percent_encode(object_path, OBJECT_PATH).to_string()
}

/// Build the canonicalized resource `/bucket/prefix/key`.
///
/// `object_path` is the prefix-joined key, unencoded.
#[must_use]
pub fn canonical_resource(bucket: &str, object_path: &str) -> String {
    let path = object_path.trim_start_matches('/');
    if path.is_empty() {
        format!("/{bucket}/")
    } else {
        format!("/{bucket}/{}", encode_object_path(path))
    }
}

// ---------------------------------------------------------------------------
// String to sign
// ---------------------------------------------------------------------------

/// Everything that contributes to a request signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    /// Request verb.
    pub verb: Verb,
    /// Base64 body digest, when the request has a body.
    pub content_md5: Option<&'a str>,
    /// Body content type, when the request has a body.
    pub content_type: Option<&'a str>,
    /// The `Date` header value.
    pub date: &'a str,
    /// Bucket name.
    pub bucket: &'a str,
    /// Prefix-joined object key, unencoded.
    pub object_path: &'a str,
}

/// Build the string to sign for `input`.
#[must_use]
pub fn string_to_sign(input: &SigningInput<'_>) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}",
        input.verb,
        input.content_md5.unwrap_or(""),
        input.content_type.unwrap_or(""),
        input.date,
        canonical_resource(input.bucket, input.object_path),
    )
}

/// Produce the `Authorization` value for `input`: `AWS <AccessKeyId>:<Signature>`.
///
/// # Errors
///
/// Fails without producing a token when the access key id, the secret or the
/// bucket is empty, or when the body digest is not a base64 MD5 digest.
pub fn sign(input: &SigningInput<'_>, profile: &AccessProfile) -> Result<String, SigningError> {
    validate(profile, input.bucket)?;
    if let Some(md5) = input.content_md5 {
        check_content_md5(md5)?;
    }

    let string_to_sign = string_to_sign(input);
    debug!(string_to_sign = ?string_to_sign, "Built SigV2 string to sign");

    let signature = compute_signature(&profile.secret_access_key, &string_to_sign)?;
    Ok(format!("AWS {}:{signature}", profile.access_key_id))
}

/// Verify an `Authorization` value against `input` and `profile`.
///
/// The signature comparison is constant time.
///
/// # Errors
///
/// Returns a [`SigningError`] if the value is malformed, names another access
/// key, or carries a signature that does not match.
pub fn verify(
    authorization: &str,
    input: &SigningInput<'_>,
    profile: &AccessProfile,
) -> Result<(), SigningError> {
    let (access_key_id, provided) = parse_authorization(authorization)?;
    if access_key_id != profile.access_key_id {
        return Err(SigningError::AccessKeyMismatch(access_key_id.to_owned()));
    }

    let expected = sign(input, profile)?;
    let expected = expected
        .rsplit_once(':')
        .map_or("", |(_, signature)| signature);

    if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        debug!(expected = %expected, provided = %provided, "SigV2 signature mismatch");
        Err(SigningError::SignatureDoesNotMatch)
    }
}

/// Split `AWS AKID:Signature` into its two parts.
fn parse_authorization(header: &str) -> Result<(&str, &str), SigningError> {
    let rest = header
        .strip_prefix("AWS ")
        .ok_or(SigningError::InvalidAuthorization)?;
    let (access_key_id, signature) = rest
        .split_once(':')
        .ok_or(SigningError::InvalidAuthorization)?;
    if access_key_id.is_empty() || signature.is_empty() {
        return Err(SigningError::InvalidAuthorization);
    }
    Ok((access_key_id, signature))
}

fn validate(profile: &AccessProfile, bucket: &str) -> Result<(), SigningError> {
    if profile.access_key_id.is_empty() {
        return Err(SigningError::MissingAccessKeyId);
    }
    if profile.secret_access_key.is_empty() {
        return Err(SigningError::MissingSecretAccessKey);
    }
    if bucket.is_empty() {
        return Err(SigningError::MissingBucket);
    }
    Ok(())
}

// Raw digest bytes spliced into the string to sign are not accepted.
fn check_content_md5(value: &str) -> Result<(), SigningError> {
    match BASE64.decode(value) {
        Ok(bytes) if bytes.len() == MD5_LEN => Ok(()),
        _ => Err(SigningError::InvalidContentMd5(value.to_owned())),
    }
}

/// Compute Base64(HMAC-SHA1(secret, string_to_sign)).
fn compute_signature(secret_key: &str, string_to_sign: &str) -> Result<String, SigningError> {
    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).map_err(|_| SigningError::InvalidKey)?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

// ---------------------------------------------------------------------------
// RequestSigner
// ---------------------------------------------------------------------------

/// A request body together with its content type.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    /// Body bytes.
    pub body: &'a [u8],
    /// `Content-Type` header value.
    pub content_type: &'a str,
}

/// Header values a signed request must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `Authorization` header value.
    pub authorization: String,
    /// `Date` header value.
    pub date: String,
    /// `Content-MD5` header value, present when the request has a body.
    pub content_md5: Option<String>,
}

/// Signs requests for one destination with one access profile.
#[derive(Debug, Clone, Copy)]
pub struct RequestSigner<'a> {
    profile: &'a AccessProfile,
    destination: &'a Destination,
}

impl<'a> RequestSigner<'a> {
    /// Create a signer, rejecting incomplete credentials or an empty bucket.
    pub fn new(
        profile: &'a AccessProfile,
        destination: &'a Destination,
    ) -> Result<Self, SigningError> {
        validate(profile, &destination.bucket)?;
        Ok(Self {
            profile,
            destination,
        })
    }

    /// Sign a request for `key` (relative to the destination prefix) at `now`.
    pub fn sign(
        &self,
        verb: Verb,
        key: &str,
        payload: Option<Payload<'_>>,
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders, SigningError> {
        let date = http_date(now);
        let object_path = self.destination.object_path(key);
        let content_md5 = payload.map(|p| content_md5(p.body));

        let input = SigningInput {
            verb,
            content_md5: content_md5.as_deref(),
            content_type: payload.map(|p| p.content_type),
            date: &date,
            bucket: &self.destination.bucket,
            object_path: &object_path,
        };
        let authorization = sign(&input, self.profile)?;

        Ok(SignedHeaders {
            authorization,
            date,
            content_md5,
        })
    }
}
