//! Recording transport: forward live, then write the exchange through.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use super::{CassetteStore, Interaction, StoredRequest, StoredResponse};
use crate::error::TransportError;
use crate::mode::CassetteName;
use crate::transport::Transport;

pub struct RecordingTransport {
    upstream: Arc<dyn Transport>,
    store: CassetteStore,
    name: CassetteName,
}

impl RecordingTransport {
    pub fn new(upstream: Arc<dyn Transport>, store: CassetteStore, name: CassetteName) -> Self {
        Self { upstream, store, name }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let stored_request = StoredRequest::from_request(&request);

        // Upstream errors are never recorded.
        let response = self.upstream.round_trip(request).await?;

        let interaction = Interaction {
            request: stored_request,
            response: StoredResponse::from_response(&response),
            recorded_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };

        let interactions = self.store.append(&self.name, interaction).await?;
        tracing::debug!(cassette = %self.name, interactions, "Interaction recorded");

        Ok(response)
    }
}
