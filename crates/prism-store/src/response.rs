//! Response metadata.

/// Metadata of a completed exchange.
///
/// Only `Content-Length`, `Content-Type` and `ETag` are retained.
///
/// Header names are compared ASCII case-insensitively, as HTTP requires, not
/// by exact spelling: `etag`, `ETag` and `ETAG` all fill [`etag`](Self::etag).
/// Servers and proxies that lower-case header names are therefore understood.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// HTTP status code.
    pub status: u16,
    /// Value of `Content-Length`, if present and numeric.
    pub content_length: Option<u64>,
    /// Value of `Content-Type`, if present.
    pub content_type: Option<String>,
    /// Value of `ETag` with surrounding quotes removed.
    pub etag: Option<String>,
}

impl ResponseMetadata {
    /// Create metadata for `status` with no headers absorbed yet.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Record one response header. Unrecognized headers are ignored.
    pub fn absorb_header(&mut self, name: &str, value: &str) {
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            self.content_length = value.parse().ok();
        } else if name.eq_ignore_ascii_case("content-type") {
            self.content_type = Some(value.to_owned());
        } else if name.eq_ignore_ascii_case("etag") {
            self.etag = Some(strip_quotes(value).to_owned());
        }
    }
}

impl From<&ureq::Response> for ResponseMetadata {
    fn from(response: &ureq::Response) -> Self {
        let mut metadata = Self::new(response.status());
        for name in response.headers_names() {
            if let Some(value) = response.header(&name) {
                metadata.absorb_header(&name, value);
            }
        }
        metadata
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
