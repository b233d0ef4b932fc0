//! # rtw-core
//!
//! Foundation types for the RTW long-poll telemetry client.
//!
//! This crate provides the shared vocabulary the client crates depend on:
//!
//! - **Connection config**: [`ConnectionConfig`] with compiled defaults,
//!   [`Credentials`], and the [`Target`] addressed by a session
//! - **Retry policy**: [`RetryPolicy`] — bounded attempt budget and
//!   per-attempt timeout for every wire request
//! - **Records**: [`Record`] — one parsed unit of the wire format, a
//!   document-ordered mapping of sensor field to raw text value

#![deny(unsafe_code)]

pub mod config;
pub mod record;
pub mod retry;

pub use config::{ConnectionConfig, Credentials, Target};
pub use record::Record;
pub use retry::RetryPolicy;
