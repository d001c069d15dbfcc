//! Transport layer for codenet.
//!
//! The request bridge speaks plain HTTP via axum on its own listener thread.

pub mod http;

pub use http::{BridgeConfig, BridgeHandle, start_bridge};
