//! Search response parsing.
//!
//! A search answers with a document of `<RTWUnit>` elements, each
//! describing one discoverable unit: its `URL` (a `domain/service` pair),
//! a human-readable `ServiceDescription`, and a sample `<RTW>` record
//! whose child element names form the unit's field schema.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

/// Domain/service location of a discovered unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceUrl {
    /// Domain segment of the unit's URL.
    pub domain: String,
    /// Service segment of the unit's URL.
    pub service: String,
}

/// One discovered unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchUnit {
    /// Where the unit lives.
    pub url: ServiceUrl,
    /// Human-readable description.
    pub description: String,
    /// Field names of the unit's record schema.
    pub schema: Vec<String>,
}

/// Element capture state while walking one `<RTWUnit>`.
enum Capture {
    None,
    Url,
    Description,
}

/// Parse a search response into units.
///
/// Best-effort: malformed markup ends the walk with a warning and the
/// units collected so far are returned.
#[must_use]
pub fn parse_units(xml: &str) -> Vec<SearchUnit> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = true;
    let mut units = Vec::new();

    let mut unit: Option<SearchUnit> = None;
    let mut capture = Capture::None;
    let mut in_schema = false;
    let mut schema_depth = 0usize;
    let mut url_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                if unit.is_none() {
                    if name == "RTWUnit" {
                        unit = Some(SearchUnit::default());
                    }
                } else if in_schema {
                    schema_depth += 1;
                    if schema_depth == 1 {
                        if let Some(unit) = unit.as_mut() {
                            unit.schema.push(name);
                        }
                    }
                } else {
                    match name.as_str() {
                        "URL" => {
                            capture = Capture::Url;
                            url_text.clear();
                        }
                        "ServiceDescription" => capture = Capture::Description,
                        "RTW" => {
                            in_schema = true;
                            schema_depth = 0;
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Empty(start)) => {
                if in_schema && schema_depth == 0 {
                    if let Some(unit) = unit.as_mut() {
                        unit.schema
                            .push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                    }
                }
            }
            Ok(Event::End(end)) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                if in_schema {
                    if schema_depth == 0 && name == "RTW" {
                        in_schema = false;
                    } else {
                        schema_depth = schema_depth.saturating_sub(1);
                    }
                } else {
                    match name.as_str() {
                        "URL" => {
                            if let Some(unit) = unit.as_mut() {
                                unit.url = split_url(&url_text);
                            }
                            capture = Capture::None;
                        }
                        "ServiceDescription" => capture = Capture::None,
                        "RTWUnit" => {
                            if let Some(unit) = unit.take() {
                                units.push(unit);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(text)) => {
                let decoded = match text.decode() {
                    Ok(decoded) => decoded.into_owned(),
                    Err(err) => {
                        warn!(error = %err, "undecodable text in search response");
                        continue;
                    }
                };
                match capture {
                    Capture::Url => url_text.push_str(&decoded),
                    Capture::Description => {
                        if let Some(unit) = unit.as_mut() {
                            unit.description.push_str(&decoded);
                        }
                    }
                    Capture::None => {}
                }
            }
            Ok(Event::GeneralRef(reference)) => {
                let Some(decoded) = crate::fragment::resolve_reference(&reference.into_inner())
                else {
                    warn!("unresolvable entity reference in search response");
                    continue;
                };
                match capture {
                    Capture::Url => url_text.push_str(&decoded),
                    Capture::Description => {
                        if let Some(unit) = unit.as_mut() {
                            unit.description.push_str(&decoded);
                        }
                    }
                    Capture::None => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "malformed search response, dropping remainder");
                break;
            }
        }
    }
    units
}

/// Split a `domain/service` URL value.
fn split_url(text: &str) -> ServiceUrl {
    let mut parts = text.splitn(2, '/');
    ServiceUrl {
        domain: parts.next().unwrap_or_default().to_string(),
        service: parts.next().unwrap_or_default().to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
