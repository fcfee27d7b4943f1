//! Transport layer: the HTTP API

pub mod http;

pub use http::{build_router, run_http_server, AppState};
