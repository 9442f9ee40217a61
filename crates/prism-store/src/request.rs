//! The object-store request state machine.
//!
//! A request moves through the following states:
//!
//! ```text
//! Idle -> Opening -> Transferring (PUT body pulled) -> Receiving -> Complete
//!                \------------------------------------------------> Cancelled
//! ```
//!
//! Operations are accepted only in `Idle`. Once a request reaches `Complete`
//! or `Cancelled` it must be [`reset`](ObjectStoreRequest::reset) before reuse.
//! Validation failures leave the request in `Idle`.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use prism_auth::{Payload, RequestSigner, SignedHeaders, Verb, encode_object_path};
use tracing::{debug, error, warn};

use crate::client::DestinationRegistration;
use crate::error::{StoreError, ValidationError};
use crate::response::ResponseMetadata;

/// Longest accepted object key, in bytes.
pub const MAX_KEY_LEN: usize = 1024;
/// Longest accepted request URL, in bytes.
pub const MAX_URL_LEN: usize = 2048;

/// Content type used by [`ObjectStoreRequest::put`].
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
/// Size of one streaming read.
const CHUNK_SIZE: usize = 16 * 1024;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Observable state of an [`ObjectStoreRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Ready to start an operation.
    Idle,
    /// Operation started, nothing transferred yet.
    Opening,
    /// Request body is being sent.
    Transferring,
    /// Response is being received.
    Receiving,
    /// The network exchange finished.
    Complete,
    /// Cancellation was observed during the operation.
    Cancelled,
}

/// Internal state. Response metadata only exists once complete.
#[derive(Debug)]
enum Phase {
    Idle,
    Opening,
    Transferring,
    Receiving,
    /// `None` when the transport failed before any response arrived.
    Complete(Option<ResponseMetadata>),
    Cancelled,
}

impl Phase {
    fn state(&self) -> RequestState {
        match self {
            Self::Idle => RequestState::Idle,
            Self::Opening => RequestState::Opening,
            Self::Transferring => RequestState::Transferring,
            Self::Receiving => RequestState::Receiving,
            Self::Complete(_) => RequestState::Complete,
            Self::Cancelled => RequestState::Cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancels a request from any thread.
///
/// Cancellation takes effect at the next streaming boundary and persists until
/// the request is reset.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Counts a live request against its client.
#[derive(Debug)]
pub(crate) struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    pub(crate) fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Body streaming
// ---------------------------------------------------------------------------

/// Streams a borrowed PUT body, checking for cancellation before every read.
struct BodyReader<'a> {
    remaining: &'a [u8],
    phase: &'a mut Phase,
    cancel: &'a CancelHandle,
}

impl Read for BodyReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("request cancelled"));
        }
        if matches!(self.phase, Phase::Opening) {
            *self.phase = Phase::Transferring;
        }
        let n = self.remaining.len().min(buf.len()).min(CHUNK_SIZE);
        buf[..n].copy_from_slice(&self.remaining[..n]);
        self.remaining = &self.remaining[n..];
        Ok(n)
    }
}

/// Read a response body in chunks, stopping as soon as cancellation is seen.
fn read_body(
    mut reader: impl Read,
    size_hint: Option<u64>,
    cancel: &CancelHandle,
) -> io::Result<Vec<u8>> {
    let capacity = size_hint
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
        .min(64 * 1024 * 1024);
    let mut body = Vec::with_capacity(capacity);
    let mut chunk = vec![0_u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(io::Error::other("request cancelled"));
        }
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(body),
            Ok(n) => body.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectStoreRequest
// ---------------------------------------------------------------------------

/// Everything needed to put one operation on the wire.
struct Prepared {
    url: String,
    headers: SignedHeaders,
}

/// A single-operation-at-a-time request bound to one destination.
///
/// Created by [`ObjectStoreClient::create_request`](crate::ObjectStoreClient::create_request).
pub struct ObjectStoreRequest {
    registration: Arc<DestinationRegistration>,
    agent: ureq::Agent,
    endpoint: Option<Arc<str>>,
    cancel: CancelHandle,
    phase: Phase,
    _live: LiveGuard,
}

impl std::fmt::Debug for ObjectStoreRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreRequest")
            .field("destination", &self.registration.identifier)
            .field("phase", &self.phase)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ObjectStoreRequest {
    pub(crate) fn new(
        registration: Arc<DestinationRegistration>,
        agent: ureq::Agent,
        endpoint: Option<Arc<str>>,
        live: LiveGuard,
    ) -> Self {
        Self {
            registration,
            agent,
            endpoint,
            cancel: CancelHandle::default(),
            phase: Phase::Idle,
            _live: live,
        }
    }

    /// Identifier of the destination this request is bound to.
    #[must_use]
    pub fn destination_id(&self) -> &str {
        &self.registration.identifier
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.phase.state()
    }

    /// Response metadata. `Some` only in [`RequestState::Complete`] after a
    /// response was received.
    #[must_use]
    pub fn response(&self) -> Option<&ResponseMetadata> {
        match &self.phase {
            Phase::Complete(response) => response.as_ref(),
            _ => None,
        }
    }

    /// HTTP status of the completed exchange.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    /// Handle that cancels this request from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Request cancellation of the current or next operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Return to `Idle`, dropping the response and clearing cancellation.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.cancel.clear();
    }

    /// Fetch object metadata. Expects `200`.
    pub fn head(&mut self, key: &str) -> Result<(), StoreError> {
        self.execute(Verb::Head, key, None, None)
    }

    /// Download an object into `out`. Expects `200`.
    ///
    /// `out` must be empty. On success it holds exactly the received payload;
    /// on failure it is left untouched.
    pub fn get(&mut self, key: &str, out: &mut Vec<u8>) -> Result<(), StoreError> {
        self.ensure_idle()?;
        if !out.is_empty() {
            return Err(self.invalid(ValidationError::OutputNotEmpty));
        }
        self.execute(Verb::Get, key, None, Some(out))
    }

    /// Upload `body` as `application/octet-stream`. Expects `200`.
    ///
    /// `body` is borrowed for the duration of the call.
    pub fn put(&mut self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        self.put_with_content_type(key, body, DEFAULT_CONTENT_TYPE)
    }

    /// Upload `body` with an explicit content type. Expects `200`.
    pub fn put_with_content_type(
        &mut self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        let payload = Payload { body, content_type };
        self.execute(Verb::Put, key, Some(payload), None)
    }

    /// Delete an object. Expects `204`.
    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.execute(Verb::Delete, key, None, None)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_idle(&self) -> Result<(), StoreError> {
        if matches!(self.phase, Phase::Idle) {
            Ok(())
        } else {
            let state = self.state();
            warn!(destination = %self.registration.identifier, ?state, "request is not idle");
            Err(StoreError::InvalidState(state))
        }
    }

    fn invalid(&self, err: ValidationError) -> StoreError {
        warn!(destination = %self.registration.identifier, error = %err, "request validation failed");
        StoreError::Validation(err)
    }

    fn expected_status(verb: Verb) -> u16 {
        match verb {
            Verb::Head | Verb::Get | Verb::Put => 200,
            Verb::Delete => 204,
        }
    }

    /// Build the URL: `{endpoint}/{bucket}/{path}` or
    /// `https://{bucket}.s3.amazonaws.com/{path}`.
    fn url_for(&self, object_path: &str) -> String {
        let bucket = &self.registration.destination.bucket;
        let path = encode_object_path(object_path);
        let base = match &self.endpoint {
            Some(endpoint) => format!("{endpoint}/{bucket}"),
            None => format!("https://{bucket}.s3.amazonaws.com"),
        };
        if path.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{path}")
        }
    }

    fn prepare(
        &self,
        verb: Verb,
        key: &str,
        payload: Option<Payload<'_>>,
    ) -> Result<Prepared, ValidationError> {
        if key.len() > MAX_KEY_LEN {
            return Err(ValidationError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_LEN,
            });
        }

        let registration = &*self.registration;
        let url = self.url_for(&registration.destination.object_path(key));
        if url.len() > MAX_URL_LEN {
            return Err(ValidationError::UrlTooLong {
                len: url.len(),
                max: MAX_URL_LEN,
            });
        }

        let signer = RequestSigner::new(&registration.profile, &registration.destination)?;
        let headers = signer.sign(verb, key, payload, Utc::now())?;
        Ok(Prepared { url, headers })
    }

    fn finish_cancelled(&mut self, verb: Verb, key: &str) -> StoreError {
        debug!(%verb, key, "request cancelled");
        self.phase = Phase::Cancelled;
        StoreError::Cancelled
    }

    fn execute(
        &mut self,
        verb: Verb,
        key: &str,
        payload: Option<Payload<'_>>,
        sink: Option<&mut Vec<u8>>,
    ) -> Result<(), StoreError> {
        self.ensure_idle()?;
        let prepared = self
            .prepare(verb, key, payload)
            .map_err(|e| self.invalid(e))?;

        self.phase = Phase::Opening;
        debug!(%verb, url = %prepared.url, "starting request");

        if self.cancel.is_cancelled() {
            return Err(self.finish_cancelled(verb, key));
        }

        let request = self
            .agent
            .request(verb.as_str(), &prepared.url)
            .set("Date", &prepared.headers.date)
            .set("Authorization", &prepared.headers.authorization);

        let result = match payload {
            Some(payload) => {
                let mut request = request
                    .set("Content-Type", payload.content_type)
                    .set("Content-Length", &payload.body.len().to_string());
                if let Some(md5) = &prepared.headers.content_md5 {
                    request = request.set("Content-MD5", md5);
                }
                let reader = BodyReader {
                    remaining: payload.body,
                    phase: &mut self.phase,
                    cancel: &self.cancel,
                };
                request.send(reader)
            }
            None => request.call(),
        };

        let response = match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                if self.cancel.is_cancelled() {
                    return Err(self.finish_cancelled(verb, key));
                }
                error!(%verb, key, error = %err, "transport failure");
                self.phase = Phase::Complete(None);
                return Err(StoreError::Transport(err.to_string()));
            }
        };

        self.phase = Phase::Receiving;
        let metadata = ResponseMetadata::from(&response);
        let expected = Self::expected_status(verb);

        if metadata.status != expected {
            if self.cancel.is_cancelled() {
                return Err(self.finish_cancelled(verb, key));
            }
            error!(%verb, key, expected, actual = metadata.status, "unexpected status code");
            let actual = metadata.status;
            self.phase = Phase::Complete(Some(metadata));
            return Err(StoreError::UnexpectedStatus {
                verb,
                expected,
                actual,
            });
        }

        let body = if sink.is_some() {
            match read_body(response.into_reader(), metadata.content_length, &self.cancel) {
                Ok(body) => Some(body),
                Err(_) if self.cancel.is_cancelled() => {
                    return Err(self.finish_cancelled(verb, key));
                }
                Err(err) => {
                    error!(%verb, key, error = %err, "failed to read response body");
                    self.phase = Phase::Complete(Some(metadata));
                    return Err(StoreError::Transport(err.to_string()));
                }
            }
        } else {
            None
        };

        if self.cancel.is_cancelled() {
            return Err(self.finish_cancelled(verb, key));
        }

        if let (Some(out), Some(body)) = (sink, body) {
            *out = body;
        }
        debug!(%verb, key, status = metadata.status, "request complete");
        self.phase = Phase::Complete(Some(metadata));
        Ok(())
    }
}
