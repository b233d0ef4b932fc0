//! One-shot command operations.
//!
//! These reuse the retrying transport but not the diff/parse/dispatch
//! loop: field-value pushes, object-id resolution, map-ID assignment, and
//! unit search are each a single request/response exchange. Pre-flight
//! validation failures surface synchronously, before any network call.

use std::sync::Arc;

use rtw_core::config::ConnectionConfig;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::search::{self, SearchUnit};
use crate::transport::{HttpTransport, Transport};
use crate::wire::{self, Category, WireRequest};

/// One resolved `(domain, service, id)` triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedObject {
    /// Domain the object lives in, lower-cased.
    pub domain: String,
    /// Service within the domain, lower-cased.
    pub service: String,
    /// The object id.
    pub id: String,
}

/// Parameters for a unit search.
///
/// The search endpoint lives outside the session's domain/service, so the
/// full location is supplied per call.
#[derive(Clone, Debug, Default)]
pub struct SearchQuery {
    /// Free-text search string; must be at least three characters.
    pub text: String,
    /// Search server host.
    pub server: String,
    /// Search server port.
    pub port: u16,
    /// First path segment on the search server.
    pub app_path: String,
    /// Second path segment on the search server.
    pub search_path: String,
}

/// Client for the one-shot RTW operations.
pub struct CommandClient {
    config: Arc<ConnectionConfig>,
    transport: Arc<dyn Transport>,
}

impl CommandClient {
    /// Create a command client over the default HTTP transport.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.retry.clone()));
        Self::with_transport(config, transport)
    }

    /// Create a command client over a caller-supplied transport.
    pub fn with_transport(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    /// Push field values to the configured object.
    ///
    /// With `map_id` set, the push is addressed through the alias
    /// (`objectID=*&mapID=…`) instead of the configured object id. Values
    /// are sent in order; empty values are sent as empty, not dropped.
    /// Fire-and-forget: the response body is not interpreted.
    pub async fn send(
        &self,
        fields: &[(&str, &str)],
        map_id: Option<&str>,
    ) -> ClientResult<()> {
        let body = wire::update_body(&self.config.target.id, map_id, fields);
        let request = WireRequest::to_endpoint(&self.config, body, Category::Update);
        let _ = self.transport.send(&request).await?;
        Ok(())
    }

    /// Resolve object ids for a set of domains and/or services.
    ///
    /// Fails with [`ClientError::MissingDomainOrService`] when both sets
    /// are empty and [`ClientError::MissingCredentials`] when credentials
    /// are incomplete — in both cases before any network call. Matching
    /// against the response is case-insensitive; a triple is kept when its
    /// domain or its service is among the requested ones.
    pub async fn resolve(
        &self,
        domains: &[&str],
        services: &[&str],
    ) -> ClientResult<Vec<ResolvedObject>> {
        if domains.is_empty() && services.is_empty() {
            return Err(ClientError::MissingDomainOrService);
        }
        if !self.config.credentials.is_complete() {
            return Err(ClientError::MissingCredentials);
        }

        let domains: Vec<String> = domains.iter().map(|d| d.to_lowercase()).collect();
        let services: Vec<String> = services.iter().map(|s| s.to_lowercase()).collect();

        let mut url = self.config.base_url();
        if let Some(domain) = domains.first() {
            url.push_str(domain);
        }
        url.push('/');
        if let Some(service) = services.first() {
            url.push_str(service);
        }

        let request = WireRequest {
            url,
            body: wire::credentials_body(&self.config.credentials),
            category: Category::Resolve,
        };
        let response = self.transport.send(&request).await?;
        Ok(parse_resolution(&response, &domains, &services))
    }

    /// Bind a map-ID alias to an object id. The alias is lower-cased.
    pub async fn assign_map_id(&self, object_id: &str, map_id: &str) -> ClientResult<()> {
        let body = wire::map_body(object_id, map_id, &self.config.credentials);
        let request = WireRequest::to_endpoint(&self.config, body, Category::Map);
        let _ = self.transport.send(&request).await?;
        Ok(())
    }

    /// Search for units matching `query.text`.
    ///
    /// Returns `Ok(None)` — silently skipped, no network call — when the
    /// text is shorter than three characters or any part of the search
    /// location is missing.
    pub async fn search(&self, query: &SearchQuery) -> ClientResult<Option<Vec<SearchUnit>>> {
        if query.text.chars().count() < 3
            || query.server.is_empty()
            || query.port == 0
            || query.app_path.is_empty()
            || query.search_path.is_empty()
        {
            debug!(text = %query.text, "search skipped: incomplete query");
            return Ok(None);
        }

        let url = format!(
            "{}{}:{}/{}/{}/",
            self.config.protocol,
            wire::encode(&query.server),
            query.port,
            wire::encode(&query.app_path),
            wire::encode(&query.search_path),
        );
        let request = WireRequest {
            url,
            body: wire::search_body(&query.text),
            category: Category::Search,
        };
        let response = self.transport.send(&request).await?;
        Ok(Some(search::parse_units(&response)))
    }
}

/// Walk the `;`-delimited response as `(domain, service, id)` triples and
/// keep the ones matching the requested sets.
fn parse_resolution(
    response: &str,
    domains: &[String],
    services: &[String],
) -> Vec<ResolvedObject> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let parts: Vec<&str> = trimmed.split(';').map(str::trim).collect();
    parts
        .chunks_exact(3)
        .filter_map(|triple| {
            let domain = triple[0].to_lowercase();
            let service = triple[1].to_lowercase();
            let matched = domains.contains(&domain) || services.contains(&service);
            matched.then(|| ResolvedObject {
                domain,
                service,
                id: triple[2].to_string(),
            })
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
