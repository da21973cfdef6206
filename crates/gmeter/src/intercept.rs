//! The interception transport: every proxied request passes through here.
//!
//! The active `(Mode, Transport)` pair is an immutable snapshot behind a
//! read-write lock. `dispatch` holds the read lock only long enough to clone
//! the snapshot, so round trips never serialize each other. Switches build
//! the next transport fully, then swap the snapshot under the write lock;
//! requests already in flight finish on the transport they started with.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{Request, Response};
use tokio::sync::{Mutex, RwLock};
use tracing::Instrument;
use uuid::Uuid;

use crate::cassette::{CassetteMode, CassetteStore};
use crate::error::{SwitchError, TransportError};
use crate::mode::{CassetteName, Mode};
use crate::stats::ProxyStats;
use crate::transport::{LiveTransport, Rejecting, Transport};

/// Settings for the live upstream client built on each switch to recording.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpstreamOptions {
    pub insecure: bool,
    pub timeout: Option<Duration>,
}

struct Active {
    mode: Mode,
    transport: Arc<dyn Transport>,
}

pub struct InterceptionTransport {
    active: RwLock<Arc<Active>>,
    switching: Mutex<()>,
    store: CassetteStore,
    upstream: UpstreamOptions,
    stats: ProxyStats,
}

impl InterceptionTransport {
    pub fn new(store: CassetteStore, upstream: UpstreamOptions, stats: ProxyStats) -> Self {
        Self {
            active: RwLock::new(Arc::new(Active {
                mode: Mode::Uninitialized,
                transport: Arc::new(Rejecting),
            })),
            switching: Mutex::new(()),
            store,
            upstream,
            stats,
        }
    }

    pub async fn mode(&self) -> Mode {
        self.active.read().await.mode.clone()
    }

    async fn snapshot(&self) -> Arc<Active> {
        Arc::clone(&*self.active.read().await)
    }

    /// Send `request` through whichever transport is active right now.
    ///
    /// Any HTTP status counts as success; only transport-level failures are
    /// errors, and they are returned unchanged.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let request_id = Uuid::new_v4();
        let method = request.method().clone();
        let url = request.uri().to_string();
        let span = gmeter_tracing::dispatch_span!(request_id, method, url);

        async {
            let active = self.snapshot().await;
            let current = tracing::Span::current();
            current.record("mode", active.mode.name());
            self.stats.inc_dispatched();

            let start = Instant::now();
            let result = active.transport.round_trip(request).await;
            let latency = start.elapsed().as_millis() as u64;
            current.record("latency_ms", latency);

            match &result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    current.record("status", status);
                    self.stats.inc_succeeded();
                    tracing::info!(method = %method, url = %url, status, "Dispatch complete");
                }
                Err(TransportError::UnmatchedPlayback { method, url, dump }) => {
                    self.stats.inc_failed();
                    tracing::warn!(method = %method, url = %url, "Track not found");
                    tracing::debug!(request = %dump, "Unmatched request");
                }
                Err(e) => {
                    self.stats.inc_failed();
                    tracing::warn!(method = %method, url = %url, error = %e, "Dispatch failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Start recording `cassette`: live traffic to the upstream, every
    /// exchange written through to the store.
    pub async fn switch_to_recording(&self, cassette: &str) -> Result<Mode, SwitchError> {
        let name = CassetteName::try_from(cassette)?;
        let _switching = self.switching.lock().await;

        let live = LiveTransport::new(self.upstream.insecure, self.upstream.timeout)?;
        let transport = self
            .store
            .transport(name.clone(), CassetteMode::Record(Arc::new(live)))
            .instrument(gmeter_tracing::switch_span!("recording", name))
            .await?;

        let mode = Mode::Recording(name);
        self.install(mode.clone(), transport).await;
        tracing::info!(cassette = %cassette, "Started recording of the cassette");
        Ok(mode)
    }

    /// Start playing `cassette`: no live calls, misses fail.
    pub async fn switch_to_playing(&self, cassette: &str) -> Result<Mode, SwitchError> {
        let name = CassetteName::try_from(cassette)?;
        let _switching = self.switching.lock().await;

        let transport = self
            .store
            .transport(name.clone(), CassetteMode::Play)
            .instrument(gmeter_tracing::switch_span!("playing", name))
            .await?;

        let mode = Mode::Playing(name);
        self.install(mode.clone(), transport).await;
        tracing::info!(cassette = %cassette, "Started playing the cassette");
        Ok(mode)
    }

    /// Replace the active snapshot. The previous one is dropped once the last
    /// in-flight request holding it completes.
    async fn install(&self, mode: Mode, transport: Arc<dyn Transport>) {
        let next = Arc::new(Active { mode, transport });
        let previous = {
            let mut slot = self.active.write().await;
            std::mem::replace(&mut *slot, next)
        };
        self.stats.inc_switches();
        tracing::debug!(previous = %previous.mode, "Active transport replaced");
    }
}
