//! Incremental diff over cumulative response bodies.
//!
//! The server answers every long poll with the full history of the stream
//! so far, not just new data. The decoder anchors on the previously
//! processed body as a literal substring of the new one and returns only
//! the unseen suffix. The **last** occurrence is used: the prior body may
//! also appear earlier as coincidental content, but the server only ever
//! appends, so the newest occurrence is the true anchor. When the prior
//! body is not found at all the server has rolled over or reset its
//! buffer, and the whole new body is treated as fresh content.

/// Stateful suffix decoder for one polling session.
#[derive(Clone, Debug, Default)]
pub struct DiffDecoder {
    last_seen: String,
}

impl DiffDecoder {
    /// Create a decoder with no prior body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently processed body.
    #[must_use]
    pub fn last_seen(&self) -> &str {
        &self.last_seen
    }

    /// Return the unseen suffix of `new_body` and remember it as the new
    /// anchor.
    ///
    /// The anchor is updated unconditionally, exactly once per call, even
    /// when the suffix is empty.
    pub fn decode(&mut self, new_body: &str) -> String {
        let suffix = if self.last_seen.is_empty() {
            new_body.to_owned()
        } else if let Some(index) = new_body.rfind(&self.last_seen) {
            new_body[index + self.last_seen.len()..].to_owned()
        } else {
            new_body.to_owned()
        };
        self.last_seen.clear();
        self.last_seen.push_str(new_body);
        suffix
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_body_is_fully_unseen() {
        let mut decoder = DiffDecoder::new();
        assert_eq!(decoder.decode("abc"), "abc");
        assert_eq!(decoder.last_seen(), "abc");
    }

    #[test]
    fn appended_content_is_the_suffix() {
        let mut decoder = DiffDecoder::new();
        let _ = decoder.decode("<a>1</a>");
        assert_eq!(decoder.decode("<a>1</a><a>2</a>"), "<a>2</a>");
    }

    #[test]
    fn equal_consecutive_bodies_yield_empty_suffix() {
        let mut decoder = DiffDecoder::new();
        let _ = decoder.decode("same");
        assert_eq!(decoder.decode("same"), "");
        assert_eq!(decoder.decode("same"), "");
    }

    #[test]
    fn missing_anchor_treats_body_as_fresh() {
        let mut decoder = DiffDecoder::new();
        let _ = decoder.decode("old stream");
        // Server reset: prior body no longer present
        assert_eq!(decoder.decode("new stream"), "new stream");
        assert_eq!(decoder.last_seen(), "new stream");
    }

    #[test]
    fn last_occurrence_wins_over_earlier_duplicates() {
        let mut decoder = DiffDecoder::new();
        let _ = decoder.decode("ab");
        // "ab" appears twice; the anchor is the later one
        assert_eq!(decoder.decode("ab-ab-tail"), "-tail");
    }

    #[test]
    fn anchor_advances_even_on_empty_suffix() {
        let mut decoder = DiffDecoder::new();
        let _ = decoder.decode("x");
        let _ = decoder.decode("x");
        // A later grown body still diffs against the newest anchor
        assert_eq!(decoder.decode("xy"), "y");
    }

    #[test]
    fn empty_first_body_keeps_decoder_fresh() {
        let mut decoder = DiffDecoder::new();
        assert_eq!(decoder.decode(""), "");
        // No anchor was established, so the next body is fully unseen
        assert_eq!(decoder.decode("abc"), "abc");
    }

    proptest! {
        #[test]
        fn growing_body_yields_exactly_the_new_content(
            base in "[a-z<>/]{1,40}",
            added in "[a-z<>/]{0,40}",
        ) {
            let mut decoder = DiffDecoder::new();
            prop_assert_eq!(decoder.decode(&base), base.clone());
            let grown = format!("{base}{added}");
            prop_assert_eq!(decoder.decode(&grown), added);
        }

        #[test]
        fn non_substring_prior_yields_whole_body(
            prior in "[a-c]{5,20}",
            fresh in "[x-z]{1,20}",
        ) {
            let mut decoder = DiffDecoder::new();
            let _ = decoder.decode(&prior);
            prop_assert_eq!(decoder.decode(&fresh), fresh.clone());
        }

        #[test]
        fn decode_is_empty_when_nothing_new(body in "[a-z]{1,40}") {
            let mut decoder = DiffDecoder::new();
            let _ = decoder.decode(&body);
            prop_assert_eq!(decoder.decode(&body), "");
        }
    }
}
