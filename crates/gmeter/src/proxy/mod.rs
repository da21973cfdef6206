//! Reverse-proxy frontend: rewrite inbound requests onto the target and map
//! dispatch outcomes back to client responses.

pub mod frontend;
