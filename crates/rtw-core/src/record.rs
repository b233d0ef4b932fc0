//! One parsed unit of the wire format.

use std::collections::HashMap;

/// A single snapshot of sensor fields, in document order.
///
/// Records are ephemeral: they are produced by the fragment parser, handed
/// to the listener registry for dispatch, and dropped. Fields absent from
/// the wire unit are absent here, never empty-filled. Insertion is
/// first-occurrence-wins, matching how duplicate elements are read off the
/// wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field unless one with the same name is already present.
    ///
    /// Returns `true` when the field was inserted.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.fields.push((name, value.into()));
        true
    }

    /// Value of a field, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether a field is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    /// Iterate fields in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record carries no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The record as a field → value map.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.fields.iter().cloned().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut record = Record::new();
        assert!(record.insert("TEMP", "20"));
        assert!(record.insert("HUM", "55"));
        assert_eq!(record.get("TEMP"), Some("20"));
        assert_eq!(record.get("HUM"), Some("55"));
        assert_eq!(record.get("PRESS"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn first_occurrence_wins() {
        let mut record = Record::new();
        assert!(record.insert("TEMP", "20"));
        assert!(!record.insert("TEMP", "21"));
        assert_eq!(record.get("TEMP"), Some("20"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn iteration_preserves_document_order() {
        let mut record = Record::new();
        let _ = record.insert("B", "2");
        let _ = record.insert("A", "1");
        let _ = record.insert("C", "3");
        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn empty_record() {
        let record = Record::new();
        assert!(record.is_empty());
        assert_eq!(record.len(), 0);
        assert!(record.to_map().is_empty());
    }

    #[test]
    fn to_map_contains_all_fields() {
        let mut record = Record::new();
        let _ = record.insert("TEMP", "20");
        let _ = record.insert("HUM", "");
        let map = record.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("TEMP").map(String::as_str), Some("20"));
        assert_eq!(map.get("HUM").map(String::as_str), Some(""));
    }

    #[test]
    fn field_names_are_case_sensitive() {
        let mut record = Record::new();
        let _ = record.insert("Temp", "20");
        assert!(!record.contains("TEMP"));
        assert_eq!(record.get("TEMP"), None);
    }
}
