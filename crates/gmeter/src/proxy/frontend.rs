//! Inbound request rewriting and response relaying.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::Request;
use reqwest::Url;

use crate::error::TransportError;
use crate::transport::is_hop_by_hop;

/// Join the target base path and the inbound path with exactly one slash.
fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Absolute URI on the target for an inbound request URI.
pub fn target_uri(target: &Url, inbound: &Uri) -> Result<Uri, TransportError> {
    let path = join_path(target.path(), inbound.path());
    let query = match (target.query().filter(|q| !q.is_empty()), inbound.query().filter(|q| !q.is_empty())) {
        (Some(t), Some(i)) => format!("?{t}&{i}"),
        (Some(q), None) | (None, Some(q)) => format!("?{q}"),
        (None, None) => String::new(),
    };
    let host = target.host_str().unwrap_or_default();
    let authority = match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    format!("{}://{authority}{path}{query}", target.scheme())
        .parse()
        .map_err(|e| TransportError::InvalidRequest(format!("{e}")))
}

/// Point an inbound request at the target: absolute URI, target Host, no
/// hop-by-hop headers.
pub fn rewrite_request(target: &Url, request: Request<Bytes>) -> Result<Request<Bytes>, TransportError> {
    let (mut parts, body) = request.into_parts();
    parts.uri = target_uri(target, &parts.uri)?;

    let hop_by_hop: Vec<_> = parts
        .headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop_by_hop {
        parts.headers.remove(name);
    }

    if let Some(authority) = parts.uri.authority() {
        let host = HeaderValue::from_str(authority.as_str())
            .map_err(|e| TransportError::InvalidRequest(format!("host header: {e}")))?;
        parts.headers.insert(http::header::HOST, host);
    }

    Ok(Request::from_parts(parts, body))
}

/// Relay a dispatched response to the client, dropping hop-by-hop headers.
pub fn relay_response(response: http::Response<Bytes>) -> Response {
    let (mut parts, body) = response.into_parts();
    let hop_by_hop: Vec<_> = parts
        .headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop_by_hop {
        parts.headers.remove(name);
    }
    Response::from_parts(parts, Body::from(body))
}

/// Gateway failure for a dispatch error.
pub fn error_response(err: &TransportError) -> Response {
    let status = if err.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "/a"), "/a");
        assert_eq!(join_path("/v1", "/a"), "/v1/a");
        assert_eq!(join_path("/v1/", "/a"), "/v1/a");
        assert_eq!(join_path("/v1", "a"), "/v1/a");
    }

    #[test]
    fn test_target_uri_keeps_port_and_query() {
        let target = url("https://api.example.com:8443/v1?key=1");
        assert_eq!(
            target_uri(&target, &uri("/users?page=2")).unwrap(),
            uri("https://api.example.com:8443/v1/users?key=1&page=2")
        );
        assert_eq!(
            target_uri(&url("http://github.com"), &uri("/hexdigest/gmeter")).unwrap(),
            uri("http://github.com/hexdigest/gmeter")
        );
    }

    #[test]
    fn test_rewrite_request_sets_host_and_strips_hop_by_hop() {
        let request = Request::post("/a?x=1")
            .header(http::header::HOST, "localhost:8080")
            .header(http::header::CONNECTION, "keep-alive")
            .header("keep-alive", "timeout=5")
            .header("x-custom", "kept")
            .body(Bytes::from_static(b"body"))
            .unwrap();

        let rewritten = rewrite_request(&url("http://upstream.test:9000"), request).unwrap();
        assert_eq!(rewritten.uri(), &uri("http://upstream.test:9000/a?x=1"));
        assert_eq!(rewritten.headers()[http::header::HOST], "upstream.test:9000");
        assert!(rewritten.headers().get(http::header::CONNECTION).is_none());
        assert!(rewritten.headers().get("keep-alive").is_none());
        assert_eq!(rewritten.headers()["x-custom"], "kept");
        assert_eq!(rewritten.body(), &Bytes::from_static(b"body"));
    }

    #[test]
    fn test_relay_response_strips_hop_by_hop() {
        let response = http::Response::builder()
            .status(404)
            .header(http::header::TRANSFER_ENCODING, "chunked")
            .header(http::header::CONTENT_TYPE, "text/plain")
            .body(Bytes::from_static(b"missing"))
            .unwrap();
        let relayed = relay_response(response);
        assert_eq!(relayed.status(), StatusCode::NOT_FOUND);
        assert!(relayed.headers().get(http::header::TRANSFER_ENCODING).is_none());
        assert_eq!(relayed.headers()[http::header::CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_error_response_is_bad_gateway() {
        let response = error_response(&TransportError::NotInitialized);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
