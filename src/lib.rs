//! Recon Gateway Library
//!
//! Safe execution of external reconnaissance tools for a scan API: input
//! allow-listing, argument-vector invocation, time bounds with process-group
//! cleanup, and output projection. The HTTP server, configuration, metrics
//! and notifications sit around the `gateway` module.

pub mod config;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod server;
