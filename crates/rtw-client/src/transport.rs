//! HTTP transport with bounded retry.
//!
//! Two completion modes cover the protocol's needs:
//!
//! - [`Transport::send`] — classic request/response: done when the full
//!   body has arrived. Used by every one-shot operation.
//! - [`Transport::poll`] — long-poll mode: an attempt completes when the
//!   response headers arrive, after which the stream yields the cumulative
//!   body received so far on every chunk. Used by the polling session.
//!
//! Both modes re-issue a fresh request (never a resumed one) when an
//! attempt does not complete inside its timeout window, up to the policy's
//! attempt budget. A failed attempt waits out the remainder of its window
//! so attempts are paced at a fixed interval. Exhausting the budget fails
//! with [`ClientError::Timeout`]. Retries happening between attempts are
//! reported in-band as [`PollEvent::Retrying`] so the session can surface
//! its `Retrying` state without owning any retry logic itself.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use rtw_core::retry::RetryPolicy;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::wire::{WireRequest, SYNX_CAT_HEADER};

/// One event on a long-poll stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollEvent {
    /// An attempt failed and the request is about to be re-issued.
    Retrying {
        /// 1-based index of the attempt that failed.
        attempt: u32,
        /// Total attempt budget.
        max_attempts: u32,
    },
    /// Cumulative response body received so far.
    Body(String),
}

/// Boxed stream of [`PollEvent`]s returned by [`Transport::poll`].
pub type PollEventStream = Pin<Box<dyn Stream<Item = ClientResult<PollEvent>> + Send>>;

/// The seam between the protocol pipeline and the network.
///
/// Implementors must be `Send + Sync`; the polling session drives the
/// transport from a spawned task so network I/O never blocks dispatch.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request and return the full response body.
    ///
    /// Retries internally per the policy; the error is terminal for this
    /// request once returned.
    async fn send(&self, request: &WireRequest) -> ClientResult<String>;

    /// Open a long-poll request.
    ///
    /// The stream yields [`PollEvent::Body`] snapshots while the response
    /// is being received and ends when the server closes it; the caller
    /// re-issues by calling `poll` again. Each call gets a fresh attempt
    /// budget.
    fn poll(&self, request: WireRequest) -> PollEventStream;
}

/// [`Transport`] implementation over a shared [`reqwest::Client`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    /// Create a transport with the given retry policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            policy,
        }
    }

    /// The policy this transport retries with.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

/// Issue one attempt and fail non-success statuses.
async fn issue(
    client: &reqwest::Client,
    request: &WireRequest,
) -> ClientResult<reqwest::Response> {
    let response = client
        .post(&request.url)
        .header(SYNX_CAT_HEADER, request.category.header_value())
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(request.body.clone())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            retryable: status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error(),
        });
    }
    Ok(response)
}

/// Sleep until the attempt window that started at `started` has elapsed.
async fn wait_out_window(started: Instant, window: Duration) {
    let elapsed = started.elapsed();
    if elapsed < window {
        tokio::time::sleep(window - elapsed).await;
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &WireRequest) -> ClientResult<String> {
        let window = self.policy.attempt_timeout();
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let started = Instant::now();
            match tokio::time::timeout(window, issue(&self.client, request)).await {
                Ok(Ok(response)) => match tokio::time::timeout_at(started + window, response.text())
                    .await
                {
                    Ok(Ok(body)) => return Ok(body),
                    Ok(Err(err)) => {
                        warn!(attempt, error = %err, url = %request.url, "response body failed");
                        wait_out_window(started, window).await;
                    }
                    Err(_) => {
                        warn!(attempt, url = %request.url, "response body timed out");
                    }
                },
                Ok(Err(err)) if !err.is_retryable() => return Err(err),
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, url = %request.url, "request attempt failed");
                    wait_out_window(started, window).await;
                }
                Err(_) => {
                    warn!(attempt, url = %request.url, "request attempt timed out");
                }
            }
        }
        Err(ClientError::Timeout {
            attempts: max_attempts,
        })
    }

    fn poll(&self, request: WireRequest) -> PollEventStream {
        let client = self.client.clone();
        let policy = self.policy.clone();

        Box::pin(async_stream::stream! {
            let window = policy.attempt_timeout();
            let max_attempts = policy.max_attempts.max(1);

            for attempt in 1..=max_attempts {
                let started = Instant::now();
                match tokio::time::timeout(window, issue(&client, &request)).await {
                    Ok(Ok(response)) => {
                        debug!(url = %request.url, attempt, "long-poll headers received");
                        let mut chunks = response.bytes_stream();
                        let mut received = BytesMut::with_capacity(8192);
                        loop {
                            match chunks.next().await {
                                Some(Ok(chunk)) => {
                                    received.extend_from_slice(&chunk);
                                    yield Ok(PollEvent::Body(valid_prefix(&received)));
                                }
                                Some(Err(err)) => {
                                    // Body interrupted mid-stream; the response is
                                    // over and the caller re-issues the long poll.
                                    warn!(error = %err, url = %request.url, "long-poll body interrupted");
                                    return;
                                }
                                None => return,
                            }
                        }
                    }
                    Ok(Err(err)) if !err.is_retryable() => {
                        yield Err(err);
                        return;
                    }
                    Ok(Err(err)) => {
                        if attempt >= max_attempts {
                            break;
                        }
                        warn!(attempt, error = %err, url = %request.url, "long-poll attempt failed");
                        yield Ok(PollEvent::Retrying { attempt, max_attempts });
                        wait_out_window(started, window).await;
                    }
                    Err(_) => {
                        if attempt >= max_attempts {
                            break;
                        }
                        warn!(attempt, url = %request.url, "long-poll attempt timed out");
                        yield Ok(PollEvent::Retrying { attempt, max_attempts });
                    }
                }
            }
            yield Err(ClientError::Timeout { attempts: max_attempts });
        })
    }
}

/// Decode the longest valid UTF-8 prefix of the received bytes.
///
/// A chunk boundary can split a multi-byte character; the partial tail is
/// withheld until the next chunk completes it, so consecutive snapshots
/// stay literal prefixes of one another.
fn valid_prefix(received: &[u8]) -> String {
    match std::str::from_utf8(received) {
        Ok(text) => text.to_owned(),
        Err(err) => String::from_utf8_lossy(&received[..err.valid_up_to()]).into_owned(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Category;
    use wiremock::matchers::{body_string, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_policy(max_attempts: u32, timeout_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            attempt_timeout_ms: timeout_ms,
        }
    }

    fn request_for(server: &MockServer, category: Category) -> WireRequest {
        WireRequest {
            url: server.uri(),
            body: "objectID=1&username=u&password=p".into(),
            category,
        }
    }

    #[test]
    fn valid_prefix_full_utf8() {
        assert_eq!(valid_prefix("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn valid_prefix_withholds_split_character() {
        let bytes = "hé".as_bytes();
        // Cut inside the two-byte 'é'
        assert_eq!(valid_prefix(&bytes[..2]), "h");
        assert_eq!(valid_prefix(bytes), "hé");
    }

    #[tokio::test]
    async fn send_returns_body_and_forwards_category() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(SYNX_CAT_HEADER, "20"))
            .and(body_string("objectID=1&username=u&password=p"))
            .respond_with(ResponseTemplate::new(200).set_body_string("dom;svc;4"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(quick_policy(2, 1_000));
        let body = transport
            .send(&request_for(&server, Category::Resolve))
            .await
            .unwrap();
        assert_eq!(body, "dom;svc;4");
    }

    #[tokio::test]
    async fn send_retries_transient_status_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(quick_policy(3, 50));
        let body = transport
            .send(&request_for(&server, Category::Update))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn send_does_not_retry_terminal_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(quick_policy(4, 50));
        let err = transport
            .send(&request_for(&server, Category::Update))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn send_exhausts_budget_on_slow_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(quick_policy(2, 30));
        let err = transport
            .send(&request_for(&server, Category::Update))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { attempts: 2 }));
        assert_eq!(err.code(), "Timedout");
    }

    #[tokio::test]
    async fn poll_yields_cumulative_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(SYNX_CAT_HEADER, "4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<start><RTW/></start>"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(quick_policy(2, 1_000));
        let events: Vec<_> = transport
            .poll(request_for(&server, Category::Connect))
            .collect()
            .await;

        let last = events.last().unwrap().as_ref().unwrap();
        assert_eq!(last, &PollEvent::Body("<start><RTW/></start>".into()));
    }

    #[tokio::test]
    async fn poll_emits_retrying_then_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(quick_policy(3, 50));
        let events: Vec<_> = transport
            .poll(request_for(&server, Category::Connect))
            .collect()
            .await;

        assert!(matches!(
            events[0],
            Ok(PollEvent::Retrying {
                attempt: 1,
                max_attempts: 3
            })
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, Ok(PollEvent::Body(body)) if body == "data")));
    }

    #[tokio::test]
    async fn poll_times_out_after_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(quick_policy(3, 30));
        let events: Vec<_> = transport
            .poll(request_for(&server, Category::Connect))
            .collect()
            .await;

        let retry_count = events
            .iter()
            .filter(|e| matches!(e, Ok(PollEvent::Retrying { .. })))
            .count();
        assert_eq!(retry_count, 2);
        assert!(matches!(
            events.last(),
            Some(Err(ClientError::Timeout { attempts: 3 }))
        ));
    }

    #[tokio::test]
    async fn poll_terminal_status_ends_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(quick_policy(5, 50));
        let events: Vec<_> = transport
            .poll(request_for(&server, Category::Connect))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Err(ClientError::Status { status: 401, .. })
        ));
    }
}
