//! HTTP request bridge.

mod routes;
mod server;

pub use routes::{AnalyzeAccepted, BridgeState, ErrorResponse, MAX_BODY_BYTES, routes};
pub use server::{BridgeConfig, BridgeHandle, start_bridge};
