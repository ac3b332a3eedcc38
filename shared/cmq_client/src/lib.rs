//! Signed HTTP client for the CMQ message queue service
//!
//! This crate implements the two queue operations the poller needs,
//! `ReceiveMessage` and `DeleteMessage`, including the HMAC-SHA256 request
//! signing scheme the service validates every call against.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Queue client and the `MessageQueue` trait
pub mod client;
/// Error types for queue operations
pub mod error;
/// Request parameter values and their serializations
pub mod params;
/// Canonical request signing
pub mod signer;
/// Configuration and response types
pub mod types;

/// Test doubles: scripted queue and mock CMQ server
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::{CmqClient, MessageQueue};
pub use error::{CmqError, CmqResult};
pub use params::{ParamValue, RequestParams};
pub use types::{Credentials, QueueConfig, ReceivedMessage};
