//! Connection configuration.
//!
//! A [`ConnectionConfig`] is created once per session and never mutated
//! afterwards. All fields carry compiled defaults so a config can be built
//! from a partial JSON document, mirroring the defaults the hosted service
//! advertises for its public endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Default wire protocol prefix.
pub const DEFAULT_PROTOCOL: &str = "http://";
/// Default server host.
pub const DEFAULT_SERVER: &str = "realtimeweb.synxbios.com";
/// Default request path.
pub const DEFAULT_PATH: &str = "/";
/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default target kind used to address a sensor object.
pub const DEFAULT_TARGET_KIND: &str = "objectID";

/// Opaque credentials carried in each request body.
///
/// The client makes no assumptions about the authentication scheme; the
/// strings are forwarded verbatim (urlencoded) on every request that
/// requires them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User name associated with the service.
    #[serde(default)]
    pub username: String,
    /// Password for the user.
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Create credentials from username/password strings.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether both the username and the password are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// The object a polling session is addressed to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Addressing kind, `"objectID"` unless the server defines others.
    #[serde(default = "default_target_kind")]
    pub kind: String,
    /// Identifier of the sensor object.
    #[serde(default = "default_target_id")]
    pub id: String,
}

fn default_target_kind() -> String {
    DEFAULT_TARGET_KIND.to_string()
}
fn default_target_id() -> String {
    "1".to_string()
}

impl Default for Target {
    fn default() -> Self {
        Self {
            kind: default_target_kind(),
            id: default_target_id(),
        }
    }
}

impl Target {
    /// Address a specific object id with the default kind.
    pub fn object(id: impl Into<String>) -> Self {
        Self {
            kind: default_target_kind(),
            id: id.into(),
        }
    }
}

/// Immutable per-session connection parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Wire protocol prefix, e.g. `"http://"`.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Server host name.
    #[serde(default = "default_server")]
    pub server: String,
    /// Request path on the server.
    #[serde(default = "default_path")]
    pub path: String,
    /// Domain owned by the user of the service.
    #[serde(default)]
    pub domain: String,
    /// Service to connect to within the domain.
    #[serde(default)]
    pub service: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Explicit endpoint override; when set, used verbatim instead of the
    /// protocol/server/path/domain/service parts.
    #[serde(default)]
    pub url: Option<String>,
    /// Credentials forwarded on each request.
    #[serde(default)]
    pub credentials: Credentials,
    /// Object addressed by the session.
    #[serde(default)]
    pub target: Target,
    /// Declared sensor fields the session listens to.
    #[serde(default)]
    pub expected_fields: Vec<String>,
    /// Retry policy applied to every wire request.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}
fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}
fn default_path() -> String {
    DEFAULT_PATH.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            server: default_server(),
            path: default_path(),
            domain: String::new(),
            service: String::new(),
            port: default_port(),
            url: None,
            credentials: Credentials::default(),
            target: Target::default(),
            expected_fields: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    /// The base URL (protocol, server, port, path) without domain/service.
    ///
    /// One-shot operations that address a different domain/service than the
    /// session (object-id resolution) build on this.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!(
            "{}{}:{}{}",
            self.protocol,
            self.server,
            self.port,
            append_slash(&self.path)
        )
    }

    /// The full session endpoint URL.
    ///
    /// The explicit `url` override wins when set; otherwise the parts are
    /// joined with single-slash normalization.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        if let Some(url) = &self.url {
            if !url.is_empty() {
                return url.clone();
            }
        }
        let mut out = self.base_url();
        if !self.domain.is_empty() {
            out.push_str(&append_slash(&self.domain));
        }
        if !self.service.is_empty() {
            out.push_str(&self.service);
        }
        out
    }
}

/// Append a trailing slash unless the segment already ends with one.
fn append_slash(segment: &str) -> String {
    if segment.is_empty() || segment.ends_with('/') {
        segment.to_string()
    } else {
        format!("{segment}/")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
