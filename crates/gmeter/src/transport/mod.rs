//! The `Transport` seam: send one request, get one response or an error.

pub mod live;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::error::TransportError;

pub use live::LiveTransport;

/// A single request/response exchange over some medium: the live upstream,
/// a cassette, or nothing at all.
///
/// Requests carry an absolute URI. Bodies are fully buffered.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError>;
}

/// Transport installed before any mode switch: refuses every request without
/// touching the network or the cassette store.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rejecting;

#[async_trait]
impl Transport for Rejecting {
    async fn round_trip(&self, _request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        Err(TransportError::NotInitialized)
    }
}

/// Headers that should NOT be forwarded (hop-by-hop headers).
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &http::HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}
