//! Playback transport: answer from a cassette, never from the network.

use std::fmt::Write;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tokio::sync::Mutex;

use super::Cassette;
use crate::error::TransportError;
use crate::transport::Transport;

pub struct PlaybackTransport {
    cassette: Cassette,
    replayed: Mutex<Vec<bool>>,
}

impl PlaybackTransport {
    pub fn new(cassette: Cassette) -> Self {
        let replayed = vec![false; cassette.interactions.len()];
        Self {
            cassette,
            replayed: Mutex::new(replayed),
        }
    }

    /// First matching interaction not yet served; once all are used up, the
    /// last match is served again.
    async fn select(&self, request: &Request<Bytes>) -> Option<usize> {
        let mut replayed = self.replayed.lock().await;
        let mut last_match = None;
        for (i, interaction) in self.cassette.interactions.iter().enumerate() {
            if !interaction.request.matches(request) {
                continue;
            }
            if !replayed[i] {
                replayed[i] = true;
                return Some(i);
            }
            last_match = Some(i);
        }
        last_match
    }
}

#[async_trait]
impl Transport for PlaybackTransport {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        match self.select(&request).await {
            Some(i) => Ok(self.cassette.interactions[i].response.to_response()?),
            None => Err(TransportError::UnmatchedPlayback {
                method: request.method().clone(),
                url: request.uri().to_string(),
                dump: dump_request(&request),
            }),
        }
    }
}

/// Render a request the way it would appear on the wire: request line,
/// headers, blank line, body.
pub fn dump_request(request: &Request<Bytes>) -> String {
    let mut dump = format!("{} {} {:?}\r\n", request.method(), request.uri(), request.version());
    if !request.headers().contains_key(http::header::HOST) {
        if let Some(authority) = request.uri().authority() {
            let _ = write!(dump, "Host: {authority}\r\n");
        }
    }
    for (name, value) in request.headers() {
        let _ = write!(dump, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()));
    }
    dump.push_str("\r\n");
    dump.push_str(&String::from_utf8_lossy(request.body()));
    dump
}
