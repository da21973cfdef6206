//! Live forwarding to the upstream over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use super::{is_hop_by_hop, Transport};
use crate::error::TransportError;

/// Sends requests to the real upstream. Cheap to clone.
#[derive(Clone)]
pub struct LiveTransport {
    client: reqwest::Client,
}

impl LiveTransport {
    /// Build a client for the upstream. `insecure` skips certificate checks;
    /// `timeout` bounds each round trip when set.
    pub fn new(insecure: bool, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for LiveTransport {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let (parts, body) = request.into_parts();
        let url = reqwest::Url::parse(&parts.uri.to_string())
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {e}", parts.uri)))?;

        let mut req_builder = self.client.request(parts.method, url).body(body);
        for (name, value) in parts.headers.iter() {
            if is_hop_by_hop(name) || name == http::header::HOST {
                continue;
            }
            req_builder = req_builder.header(name, value);
        }

        let upstream = req_builder.send().await?;

        let mut response_builder = Response::builder().status(upstream.status());
        for (name, value) in upstream.headers().iter() {
            if is_hop_by_hop(name) {
                continue;
            }
            response_builder = response_builder.header(name, value);
        }
        let body = upstream.bytes().await?;

        response_builder
            .body(body)
            .map_err(|e| TransportError::InvalidRequest(format!("upstream response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_forwards_method_headers_and_body() {
        let app = Router::new().route(
            "/echo",
            axum::routing::post(|headers: http::HeaderMap, body: Bytes| async move {
                let token = headers
                    .get("x-token")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                (http::StatusCode::CREATED, [("x-seen-token", token)], body)
            }),
        );
        let base = spawn_upstream(app).await;

        let live = LiveTransport::new(false, None).unwrap();
        let request = Request::post(format!("{base}/echo"))
            .header("x-token", "abc")
            .header(http::header::CONNECTION, "close")
            .body(Bytes::from_static(b"payload"))
            .unwrap();
        let response = live.round_trip(request).await.unwrap();

        assert_eq!(response.status(), http::StatusCode::CREATED);
        assert_eq!(response.headers()["x-seen-token"], "abc");
        assert_eq!(response.body(), &Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn test_error_status_is_still_a_response() {
        let app = Router::new().route(
            "/missing",
            get(|| async { (http::StatusCode::NOT_FOUND, "nope") }),
        );
        let base = spawn_upstream(app).await;

        let live = LiveTransport::new(false, None).unwrap();
        let request = Request::get(format!("{base}/missing")).body(Bytes::new()).unwrap();
        let response = live.round_trip(request).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_connection_failure_is_upstream_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let live = LiveTransport::new(false, None).unwrap();
        let request = Request::get(format!("http://{addr}/a")).body(Bytes::new()).unwrap();
        let err = live.round_trip(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Upstream(_)));
    }
}
