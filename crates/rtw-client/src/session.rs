//! Polling session.
//!
//! Orchestrates transport → diff decoder → fragment parser → listener
//! registry for the lifetime of a connection:
//!
//! ```text
//! Idle → Connecting → Streaming ⇄ Retrying → Closed
//! ```
//!
//! `connect()` spawns the poll loop on its own task. Each long-poll
//! response body is appended to a FIFO queue and the queue is drained in
//! arrival order — decode the unseen suffix, parse it into records,
//! dispatch each record synchronously — before the next long poll is
//! re-issued. The transport owns per-request retry; the session only
//! observes the in-band retry events to expose its `Retrying` state.
//! A transport timeout (budget exhausted) is terminal: the session stops
//! resubmitting and closes. There is no automatic reconnect.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;
use rtw_core::config::ConnectionConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::diff::DiffDecoder;
use crate::error::{ClientError, ClientResult};
use crate::fragment;
use crate::registry::ListenerRegistry;
use crate::transport::{HttpTransport, PollEvent, Transport};
use crate::wire::{self, Category, WireRequest};

/// Lifecycle state of a polling session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not yet connected.
    Idle,
    /// First long-poll request submitted, no data yet.
    Connecting,
    /// Receiving and dispatching records.
    Streaming,
    /// A request attempt failed; the transport is re-issuing.
    Retrying,
    /// Terminal. Reached on timeout or explicit disconnect.
    Closed,
}

/// A long-poll session against one sensor object.
///
/// The registry is shared: listeners can be registered before or after
/// `connect()`, including from inside callbacks. `connect()` is a
/// one-shot — a session that reached `Closed` stays closed.
pub struct PollingSession {
    config: Arc<ConnectionConfig>,
    transport: Arc<dyn Transport>,
    registry: Arc<ListenerRegistry>,
    state: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
}

impl PollingSession {
    /// Create a session over the default HTTP transport.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.retry.clone()));
        Self::with_transport(config, transport)
    }

    /// Create a session over a caller-supplied transport.
    pub fn with_transport(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        let registry = Arc::new(ListenerRegistry::new(&config.expected_fields));
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            config: Arc::new(config),
            transport,
            registry,
            state: Arc::new(state),
            cancel: CancellationToken::new(),
        }
    }

    /// The session's connection parameters.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The session's listener registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Bind an on-change callback for a declared field.
    pub fn register<F>(&self, name: &str, callback: F) -> ClientResult<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.registry.register(name, callback)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Connect and start streaming.
    pub fn connect(&self) -> SessionHandle {
        self.spawn(None)
    }

    /// Connect with a one-time callback fired on the first response.
    pub fn connect_with<F>(&self, on_connected: F) -> SessionHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(Some(Box::new(on_connected)))
    }

    /// Cancel the outstanding request and close the session.
    ///
    /// A response arriving after cancellation is discarded, not
    /// dispatched.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    fn spawn(&self, on_connected: Option<Box<dyn FnOnce() + Send>>) -> SessionHandle {
        let _ = self.state.send_replace(SessionState::Connecting);

        let config = self.config.clone();
        let transport = self.transport.clone();
        let registry = self.registry.clone();
        let state = self.state.clone();
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            let result = poll_loop(
                &config,
                transport.as_ref(),
                &registry,
                &state,
                &cancel,
                on_connected,
            )
            .await;
            let _ = state.send_replace(SessionState::Closed);
            if let Err(err) = &result {
                warn!(code = err.code(), error = %err, "polling session closed");
            } else {
                debug!("polling session closed");
            }
            result
        });

        SessionHandle {
            cancel: self.cancel.clone(),
            state: self.state.subscribe(),
            task,
        }
    }
}

/// Handle to a connected session's poll loop.
pub struct SessionHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<ClientResult<()>>,
}

impl SessionHandle {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Cancel the outstanding request and close the session.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Wait until the session reaches `target`.
    pub async fn wait_for_state(&mut self, target: SessionState) {
        let _ = self
            .state
            .wait_for(|current| *current == target)
            .await;
    }

    /// Wait for the session to close.
    ///
    /// Returns `Ok(())` after a clean `disconnect()`, or the terminal
    /// error — `Timeout` with code `"Timedout"` when the retry budget was
    /// exhausted.
    pub async fn closed(self) -> ClientResult<()> {
        match self.task.await {
            Ok(result) => result,
            Err(_join) => Err(ClientError::Cancelled),
        }
    }
}

/// The poll loop: one long-poll request at a time, re-issued immediately
/// after each response is drained.
async fn poll_loop(
    config: &ConnectionConfig,
    transport: &dyn Transport,
    registry: &ListenerRegistry,
    state: &watch::Sender<SessionState>,
    cancel: &CancellationToken,
    mut on_connected: Option<Box<dyn FnOnce() + Send>>,
) -> ClientResult<()> {
    let request = WireRequest::to_endpoint(config, wire::connect_body(config), Category::Connect);
    let mut decoder = DiffDecoder::new();
    let mut pending: VecDeque<String> = VecDeque::new();

    loop {
        let mut events = transport.poll(request.clone());
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                event = events.next() => event,
            };
            match event {
                Some(Ok(PollEvent::Body(body))) => {
                    if let Some(connected) = on_connected.take() {
                        connected();
                    }
                    let _ = state.send_replace(SessionState::Streaming);
                    pending.push_back(body.trim().to_string());
                    drain(&mut pending, &mut decoder, registry, &config.expected_fields);
                }
                Some(Ok(PollEvent::Retrying { attempt, max_attempts })) => {
                    debug!(attempt, max_attempts, "long-poll retrying");
                    let _ = state.send_replace(SessionState::Retrying);
                }
                Some(Err(err)) => return Err(err),
                // Response exhausted: re-issue the next long poll at once.
                None => break,
            }
        }
    }
}

/// Drain the pending queue in arrival order.
///
/// The decoder is only correct against the immediately preceding body, so
/// FIFO order here is load-bearing. Listener dispatch for a record
/// completes before the next record of the same response is parsed.
fn drain(
    pending: &mut VecDeque<String>,
    decoder: &mut DiffDecoder,
    registry: &ListenerRegistry,
    expected_fields: &[String],
) {
    while let Some(body) = pending.pop_front() {
        let suffix = decoder.decode(&body);
        if suffix.is_empty() {
            continue;
        }
        for record in fragment::records(&suffix, expected_fields) {
            registry.update(&record);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
