#![forbid(unsafe_code)]

//! Interactive process execution bridge.
//!
//! Lets a stateless request/response channel drive a long-running child
//! process that may block on standard input. Sessions survive across
//! requests, output is delivered in increments, and a heuristic classifier
//! decides when the child is waiting for input.

pub mod classifier;
pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod process;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
