//! Wire-level request shapes.
//!
//! Every RTW operation is a `POST` of an urlencoded body with the protocol
//! discriminator carried in the `Synx-Cat` header. This module owns the
//! discriminator values and the body builders; issuing the requests is the
//! transport's job.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rtw_core::config::{ConnectionConfig, Credentials};

/// Header carrying the protocol discriminator.
pub const SYNX_CAT_HEADER: &str = "Synx-Cat";

/// Characters escaped in urlencoded components.
///
/// Matches the unreserved set of `encodeURIComponent`: alphanumerics plus
/// `- _ . ! ~ * ' ( )` pass through.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode one urlencoded component.
#[must_use]
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Protocol discriminator for a wire request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// Field-value push to an object.
    Update,
    /// Bind a map-ID alias to an object id.
    Map,
    /// Open the long-poll stream for a session.
    Connect,
    /// Full-text unit search.
    Search,
    /// Resolve object ids for a domain/service set.
    Resolve,
}

impl Category {
    /// The `Synx-Cat` header value for this category.
    #[must_use]
    pub fn header_value(self) -> &'static str {
        match self {
            Self::Update => "1",
            Self::Map => "3",
            Self::Connect => "4",
            Self::Search => "12",
            Self::Resolve => "20",
        }
    }
}

/// One fully-built wire request, ready for the transport.
#[derive(Clone, Debug)]
pub struct WireRequest {
    /// Absolute request URL.
    pub url: String,
    /// Urlencoded POST body.
    pub body: String,
    /// Protocol discriminator.
    pub category: Category,
}

impl WireRequest {
    /// Build a request against the session endpoint of `config`.
    #[must_use]
    pub fn to_endpoint(config: &ConnectionConfig, body: String, category: Category) -> Self {
        Self {
            url: config.endpoint_url(),
            body,
            category,
        }
    }
}

/// Body for opening the long-poll stream: target identifier plus credentials.
#[must_use]
pub fn connect_body(config: &ConnectionConfig) -> String {
    format!(
        "{}={}&{}",
        encode(&config.target.kind),
        encode(&config.target.id),
        credentials_body(&config.credentials)
    )
}

/// Credentials-only body used by resolution requests.
#[must_use]
pub fn credentials_body(credentials: &Credentials) -> String {
    format!(
        "username={}&password={}",
        encode(&credentials.username),
        encode(&credentials.password)
    )
}

/// Body for a field-value push.
///
/// Addressed pushes (`map_id` present) go to `objectID=*&mapID={map_id}`;
/// direct pushes go to `objectID={object_id}`. Field pairs follow in order;
/// empty values encode as `name=`.
#[must_use]
pub fn update_body(object_id: &str, map_id: Option<&str>, fields: &[(&str, &str)]) -> String {
    let mut body = match map_id {
        Some(map_id) => format!("objectID=*&mapID={}", encode(map_id)),
        None => format!("objectID={}", encode(object_id)),
    };
    for (name, value) in fields {
        body.push('&');
        body.push_str(&encode(name));
        body.push('=');
        body.push_str(&encode(value));
    }
    body
}

/// Body for binding a map-ID alias. The alias is lower-cased on the wire.
#[must_use]
pub fn map_body(object_id: &str, map_id: &str, credentials: &Credentials) -> String {
    format!(
        "objectID={}&mapID={}&{}",
        encode(object_id),
        encode(&map_id.to_lowercase()),
        credentials_body(credentials)
    )
}

/// Body for a unit search.
#[must_use]
pub fn search_body(text: &str) -> String {
    format!("searchText={}", encode(text))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
