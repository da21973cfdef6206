//! Cassettes: named, persisted collections of request/response interactions.
//!
//! A cassette lives at `<dir>/<name>.cassette` as a JSON document. Headers
//! are kept for fidelity but only method, URL and body take part in matching.

mod player;
mod recorder;
mod store;

use std::collections::BTreeMap;

use bytes::Bytes;
use http::{HeaderMap, Request, Response};
use serde::{Deserialize, Serialize};

use crate::error::CassetteError;

pub use player::PlaybackTransport;
pub use recorder::RecordingTransport;
pub use store::{CassetteMode, CassetteStore};

/// On-disk cassette document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    pub name: String,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// One recorded request paired with its response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    pub request: StoredRequest,
    pub response: StoredResponse,
    /// Unix seconds at which the exchange was recorded.
    #[serde(default)]
    pub recorded_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub body: Vec<u8>,
}

fn headers_to_stored(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut stored: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        stored
            .entry(name.to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    stored
}

impl StoredRequest {
    pub fn from_request(request: &Request<Bytes>) -> Self {
        Self {
            method: request.method().to_string(),
            url: request.uri().to_string(),
            headers: headers_to_stored(request.headers()),
            body: request.body().to_vec(),
        }
    }

    /// Whether `request` is equivalent to this recording. Headers are
    /// excluded: they carry dates, tracing ids and other per-call noise.
    pub fn matches(&self, request: &Request<Bytes>) -> bool {
        self.method == request.method().as_str()
            && self.url == request.uri().to_string()
            && self.body.as_slice() == request.body().as_ref()
    }
}

impl StoredResponse {
    pub fn from_response(response: &Response<Bytes>) -> Self {
        Self {
            status: response.status().as_u16(),
            headers: headers_to_stored(response.headers()),
            body: response.body().to_vec(),
        }
    }

    pub fn to_response(&self) -> Result<Response<Bytes>, CassetteError> {
        let mut builder = Response::builder().status(self.status);
        for (name, values) in &self.headers {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        builder
            .body(Bytes::from(self.body.clone()))
            .map_err(|e| CassetteError::InvalidInteraction(e.to_string()))
    }
}
