//! Destination registry and request factory.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use prism_auth::RequestSigner;
use prism_core::{AccessProfile, Destination, PrismConfig};
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, ValidationError};
use crate::request::{LiveGuard, ObjectStoreRequest};

/// A registered destination. Shared with every request created for it, so
/// removing the registration never invalidates an outstanding request.
#[derive(Debug)]
pub(crate) struct DestinationRegistration {
    pub(crate) identifier: String,
    pub(crate) profile: AccessProfile,
    pub(crate) destination: Destination,
}

/// Registry of named destinations and factory for requests bound to them.
///
/// Every request must be released (dropped or passed to
/// [`free_request`](Self::free_request)) before the client is dropped.
///
/// # Examples
///
/// ```
/// use prism_core::{AccessProfile, Destination, PrismConfig};
/// use prism_store::ObjectStoreClient;
///
/// let client = ObjectStoreClient::new(&PrismConfig::default());
/// client
///     .register_destination(
///         "previews",
///         AccessProfile::new("AKID", "SECRET"),
///         Destination::new("my-bucket", "lr/previews"),
///     )
///     .unwrap();
///
/// let request = client.create_request("previews").unwrap();
/// assert_eq!(client.live_requests(), 1);
/// client.free_request(request);
/// assert!(client.create_request("unknown").is_err());
/// ```
pub struct ObjectStoreClient {
    destinations: DashMap<String, Arc<DestinationRegistration>>,
    agent: ureq::Agent,
    endpoint: Option<Arc<str>>,
    live: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient")
            .field("destinations", &self.destinations.len())
            .field("endpoint", &self.endpoint)
            .field("live", &self.live.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl ObjectStoreClient {
    /// Create a client using the endpoint and transport timeouts in `config`.
    #[must_use]
    pub fn new(config: &PrismConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout())
            .timeout_read(config.io_timeout())
            .timeout_write(config.io_timeout())
            .redirects(0)
            .build();
        let endpoint = config
            .endpoint
            .as_deref()
            .map(|e| Arc::from(e.trim_end_matches('/')));

        Self {
            destinations: DashMap::new(),
            agent,
            endpoint,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register `destination` under `identifier` with `profile` credentials.
    ///
    /// Fails without mutating the registry when the identifier is taken or
    /// when the access key id, secret or bucket is empty.
    pub fn register_destination(
        &self,
        identifier: &str,
        profile: AccessProfile,
        destination: Destination,
    ) -> Result<(), StoreError> {
        if let Err(err) = RequestSigner::new(&profile, &destination) {
            warn!(identifier, error = %err, "rejecting destination");
            return Err(ValidationError::from(err).into());
        }

        match self.destinations.entry(identifier.to_owned()) {
            Entry::Occupied(_) => {
                warn!(identifier, "destination already created");
                Err(StoreError::DuplicateDestination(identifier.to_owned()))
            }
            Entry::Vacant(slot) => {
                info!(identifier, bucket = %destination.bucket, prefix = %destination.key_prefix, "registered destination");
                slot.insert(Arc::new(DestinationRegistration {
                    identifier: identifier.to_owned(),
                    profile,
                    destination,
                }));
                Ok(())
            }
        }
    }

    /// Remove a destination. Returns whether it was registered.
    ///
    /// Outstanding requests for it keep working.
    pub fn remove_destination(&self, identifier: &str) -> bool {
        let removed = self.destinations.remove(identifier).is_some();
        debug!(identifier, removed, "remove destination");
        removed
    }

    /// Remove every destination.
    pub fn remove_all(&self) {
        self.destinations.clear();
    }

    /// Whether `identifier` is registered.
    #[must_use]
    pub fn has_destination(&self, identifier: &str) -> bool {
        self.destinations.contains_key(identifier)
    }

    /// Number of registered destinations.
    #[must_use]
    pub fn destination_count(&self) -> usize {
        self.destinations.len()
    }

    /// Create a request bound to the destination registered as `identifier`.
    pub fn create_request(&self, identifier: &str) -> Result<ObjectStoreRequest, StoreError> {
        let Some(registration) = self.destinations.get(identifier).map(|r| Arc::clone(r.value())) else {
            warn!(identifier, "unknown destination");
            return Err(StoreError::UnknownDestination(identifier.to_owned()));
        };

        Ok(ObjectStoreRequest::new(
            registration,
            self.agent.clone(),
            self.endpoint.clone(),
            LiveGuard::new(&self.live),
        ))
    }

    /// Release a request. Equivalent to dropping it.
    pub fn free_request(&self, request: ObjectStoreRequest) {
        drop(request);
    }

    /// Number of requests created by this client that are still alive.
    #[must_use]
    pub fn live_requests(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Drop for ObjectStoreClient {
    fn drop(&mut self) {
        let live = self.live.load(Ordering::SeqCst);
        if live > 0 {
            error!(live, "object store client dropped with live requests");
        }
        assert!(
            std::thread::panicking() || live == 0,
            "object store client dropped with {live} live request(s)"
        );
    }
}
