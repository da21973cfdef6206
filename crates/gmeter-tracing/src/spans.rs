//! Span builder helpers for gmeter instrumentation.

/// Create a tracing span for one request passing through the interception
/// transport.
///
/// Usage: `let span = dispatch_span!(request_id, method, url);`
///
/// Fields recorded once the round trip completes:
/// - `mode`: the mode whose transport served the request
/// - `status`: response status code (absent on transport errors)
/// - `latency_ms`: time spent in the delegate transport
#[macro_export]
macro_rules! dispatch_span {
    ($request_id:expr, $method:expr, $url:expr) => {
        tracing::info_span!(
            "dispatch",
            request_id = %$request_id,
            method = %$method,
            url = %$url,
            mode = tracing::field::Empty,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    };
}

/// Create a tracing span for a mode switch.
#[macro_export]
macro_rules! switch_span {
    ($mode:expr, $cassette:expr) => {
        tracing::info_span!(
            "switch",
            mode = %$mode,
            cassette = %$cassette,
        )
    };
}
