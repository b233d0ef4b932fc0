//! Fragment parsing.
//!
//! A decoded suffix is a run of sibling XML documents with no common root,
//! so it is wrapped in a synthetic `<start>…</start>` element before being
//! pull-parsed. Every `<RTW>` element found (at any depth) yields one
//! [`Record`] holding the declared fields present among its direct
//! children, in document order, with escaped content decoded back to text.
//!
//! Parsing is best-effort: a malformed fragment ends the iteration with a
//! warning, records already yielded stand, and the session keeps
//! streaming.

use std::io::Cursor;

use quick_xml::events::Event;
use quick_xml::Reader;
use rtw_core::record::Record;
use tracing::warn;

/// Element name marking one wire record.
const RECORD_TAG: &str = "RTW";

/// Lazily parse a decoded suffix into records.
///
/// `expected` is the session's declared field list; elements with other
/// names are ignored. Field name matching is case-sensitive. The iterator
/// is finite and not restartable — each suffix is parsed once.
pub fn records<'e>(suffix: &str, expected: &'e [String]) -> FragmentRecords<'e> {
    let wrapped = format!("<start>{suffix}</start>");
    let mut reader = Reader::from_reader(Cursor::new(wrapped.into_bytes()));
    // Mismatched closing tags must surface as errors, not silently close
    // whatever element happens to be open.
    reader.config_mut().check_end_names = true;
    FragmentRecords {
        reader,
        expected,
        buf: Vec::new(),
        finished: false,
    }
}

/// Iterator over the records of one suffix. See [`records`].
pub struct FragmentRecords<'e> {
    reader: Reader<Cursor<Vec<u8>>>,
    expected: &'e [String],
    buf: Vec<u8>,
    finished: bool,
}

impl Iterator for FragmentRecords<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.finished {
            return None;
        }

        // Inside an <RTW> element once `record` is Some; `depth` counts
        // open child elements below it, `field` accumulates the text of
        // the declared child currently open.
        let mut record: Option<Record> = None;
        let mut depth = 0usize;
        let mut field: Option<(String, String)> = None;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(start)) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    if let Some(rec) = record.as_ref() {
                        depth += 1;
                        if depth == 1
                            && field.is_none()
                            && self.expected.iter().any(|f| f == &name)
                            && !rec.contains(&name)
                        {
                            field = Some((name, String::new()));
                        }
                    } else if name == RECORD_TAG {
                        record = Some(Record::new());
                        depth = 0;
                    }
                }
                Ok(Event::Empty(start)) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    if let Some(rec) = record.as_mut() {
                        if depth == 0 && self.expected.iter().any(|f| f == &name) {
                            let _ = rec.insert(name, String::new());
                        }
                    } else if name == RECORD_TAG {
                        return Some(Record::new());
                    }
                }
                Ok(Event::End(_)) => {
                    if record.is_some() {
                        if depth == 0 {
                            return record.take();
                        }
                        if depth == 1 {
                            if let Some((name, value)) = field.take() {
                                if let Some(rec) = record.as_mut() {
                                    let _ = rec.insert(name, value);
                                }
                            }
                        }
                        depth -= 1;
                    }
                }
                Ok(Event::Text(text)) => {
                    if let Some((_, value)) = field.as_mut() {
                        match text.decode() {
                            Ok(decoded) => value.push_str(&decoded),
                            Err(err) => {
                                warn!(error = %err, "undecodable text in fragment");
                            }
                        }
                    }
                }
                Ok(Event::GeneralRef(reference)) => {
                    if let Some((_, value)) = field.as_mut() {
                        match resolve_reference(&reference.into_inner()) {
                            Some(decoded) => value.push_str(&decoded),
                            None => {
                                warn!("unresolvable entity reference in fragment");
                            }
                        }
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some((_, value)) = field.as_mut() {
                        value.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "malformed fragment, dropping remainder");
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

/// Resolve a predefined or numeric character reference to its text.
pub(crate) fn resolve_reference(name: &[u8]) -> Option<String> {
    match name {
        b"amp" => Some("&".into()),
        b"lt" => Some("<".into()),
        b"gt" => Some(">".into()),
        b"quot" => Some("\"".into()),
        b"apos" => Some("'".into()),
        _ => {
            let text = std::str::from_utf8(name).ok()?;
            let digits = text.strip_prefix('#')?;
            let code = if let Some(hex) =
                digits.strip_prefix('x').or_else(|| digits.strip_prefix('X'))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                digits.parse().ok()?
            };
            char::from_u32(code).map(|c| c.to_string())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| (*f).to_string()).collect()
    }

    #[test]
    fn single_record_with_declared_fields() {
        let fields = expected(&["TEMP", "HUM"]);
        let parsed: Vec<Record> =
            records("<RTW><TEMP>20</TEMP><HUM>55</HUM></RTW>", &fields).collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("TEMP"), Some("20"));
        assert_eq!(parsed[0].get("HUM"), Some("55"));
    }

    #[test]
    fn undeclared_children_are_ignored() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> =
            records("<RTW><TEMP>20</TEMP><NOISE>99</NOISE></RTW>", &fields).collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].len(), 1);
        assert_eq!(parsed[0].get("NOISE"), None);
    }

    #[test]
    fn absent_fields_are_omitted_not_empty() {
        let fields = expected(&["TEMP", "HUM"]);
        let parsed: Vec<Record> = records("<RTW><TEMP>20</TEMP></RTW>", &fields).collect();
        assert!(!parsed[0].contains("HUM"));
    }

    #[test]
    fn multiple_records_in_document_order() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> = records(
            "<RTW><TEMP>20</TEMP></RTW><RTW><TEMP>21</TEMP></RTW>",
            &fields,
        )
        .collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].get("TEMP"), Some("20"));
        assert_eq!(parsed[1].get("TEMP"), Some("21"));
    }

    #[test]
    fn records_nested_under_other_roots_are_found() {
        // Each long-poll response is itself a wrapped document
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> =
            records("<start><RTW><TEMP>20</TEMP></RTW></start>", &fields).collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("TEMP"), Some("20"));
    }

    #[test]
    fn field_matching_is_case_sensitive() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> = records("<RTW><temp>20</temp></RTW>", &fields).collect();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].is_empty());
    }

    #[test]
    fn escaped_content_is_decoded() {
        let fields = expected(&["MSG"]);
        let parsed: Vec<Record> =
            records("<RTW><MSG>a &amp; b &lt;c&gt; &#33;</MSG></RTW>", &fields).collect();
        assert_eq!(parsed[0].get("MSG"), Some("a & b <c> !"));
    }

    #[test]
    fn empty_element_yields_empty_value() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> = records("<RTW><TEMP/></RTW>", &fields).collect();
        assert_eq!(parsed[0].get("TEMP"), Some(""));
    }

    #[test]
    fn empty_record_element_yields_empty_record() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> = records("<RTW></RTW><RTW/>", &fields).collect();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.iter().all(Record::is_empty));
    }

    #[test]
    fn duplicate_field_keeps_first_occurrence() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> =
            records("<RTW><TEMP>20</TEMP><TEMP>99</TEMP></RTW>", &fields).collect();
        assert_eq!(parsed[0].get("TEMP"), Some("20"));
    }

    #[test]
    fn nested_markup_inside_field_contributes_text_only() {
        let fields = expected(&["MSG"]);
        let parsed: Vec<Record> =
            records("<RTW><MSG>hello <b>world</b></MSG></RTW>", &fields).collect();
        assert_eq!(parsed[0].get("MSG"), Some("hello world"));
    }

    #[test]
    fn malformed_suffix_yields_no_records() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> = records("<RTW><TEMP>20</TEMP>", &fields).collect();
        // The record element never closes before the wrapper does
        assert!(parsed.is_empty());
    }

    #[test]
    fn malformed_tail_keeps_earlier_records() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> = records(
            "<RTW><TEMP>20</TEMP></RTW><RTW><TEMP>21</BROKEN>",
            &fields,
        )
        .collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].get("TEMP"), Some("20"));
    }

    #[test]
    fn empty_suffix_yields_nothing() {
        let fields = expected(&["TEMP"]);
        let parsed: Vec<Record> = records("", &fields).collect();
        assert!(parsed.is_empty());
    }

    #[test]
    fn cdata_content_is_taken_verbatim() {
        let fields = expected(&["MSG"]);
        let parsed: Vec<Record> =
            records("<RTW><MSG><![CDATA[a < b & c]]></MSG></RTW>", &fields).collect();
        assert_eq!(parsed[0].get("MSG"), Some("a < b & c"));
    }

    #[test]
    fn resolve_named_and_numeric_references() {
        assert_eq!(resolve_reference(b"amp").as_deref(), Some("&"));
        assert_eq!(resolve_reference(b"apos").as_deref(), Some("'"));
        assert_eq!(resolve_reference(b"#65").as_deref(), Some("A"));
        assert_eq!(resolve_reference(b"#x41").as_deref(), Some("A"));
        assert_eq!(resolve_reference(b"unknown"), None);
    }
}
