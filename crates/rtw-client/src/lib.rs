//! # rtw-client
//!
//! Client for the RTW long-poll telemetry protocol.
//!
//! The server answers every long poll with the cumulative stream history;
//! this crate turns that into per-field updates:
//!
//! - [`transport`] — `POST` requests with bounded retry; long-poll mode
//!   completes on headers and yields cumulative body snapshots
//! - [`diff`] — strips the previously-seen prefix off each snapshot
//! - [`fragment`] — parses the unseen suffix into [`Record`]s
//! - [`registry`] — routes records to field, channel, and wildcard
//!   listeners
//! - [`session`] — orchestrates the four in a loop for the lifetime of a
//!   connection
//! - [`command`] — the one-shot operations (push, resolve, map-ID,
//!   search) that reuse the transport but not the streaming loop
//!
//! [`Record`]: rtw_core::record::Record

#![deny(unsafe_code)]

pub mod command;
pub mod diff;
pub mod error;
pub mod fragment;
pub mod registry;
pub mod search;
pub mod session;
pub mod transport;
pub mod wire;

pub use command::{CommandClient, ResolvedObject, SearchQuery};
pub use diff::DiffDecoder;
pub use error::{ClientError, ClientResult};
pub use fragment::{records, FragmentRecords};
pub use registry::{ListenerRegistry, SubscriptionId};
pub use search::{SearchUnit, ServiceUrl};
pub use session::{PollingSession, SessionHandle, SessionState};
pub use transport::{HttpTransport, PollEvent, PollEventStream, Transport};
pub use wire::{Category, WireRequest};

pub use rtw_core::config::{ConnectionConfig, Credentials, Target};
pub use rtw_core::record::Record;
pub use rtw_core::retry::RetryPolicy;
