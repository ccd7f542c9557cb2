use regex::bytes::{Regex, RegexBuilder};

use crate::errors::{SearchError, SearchResult};

/// Case-insensitive literal matcher for one search term.
///
/// Lines are matched as raw bytes, so invalid UTF-8 elsewhere in a line never
/// prevents a match and only matching lines have to be decoded. The term is
/// escaped, so regex metacharacters match themselves.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    term: String,
    regex: Regex,
}

impl TermMatcher {
    pub fn new(term: &str) -> SearchResult<Self> {
        if term.is_empty() {
            return Err(SearchError::EmptyTerm);
        }

        // Some non-ASCII characters fold to ASCII letters (the Kelvin sign to
        // 'k'), so only a term without foldable letters gets ASCII-only folding.
        let unicode = !term.is_ascii() || has_unicode_fold_partners(term);
        let regex = RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .unicode(unicode)
            .build()
            .map_err(|e| SearchError::invalid_pattern(e.to_string()))?;

        Ok(Self {
            term: term.to_string(),
            regex,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// True if `line` contains the term, ignoring case
    pub fn is_match(&self, line: &[u8]) -> bool {
        self.regex.is_match(line)
    }
}

/// 'k' and 's' have non-ASCII case partners (U+212A KELVIN SIGN, U+017F LONG S)
fn has_unicode_fold_partners(term: &str) -> bool {
    term.bytes()
        .any(|b| matches!(b.to_ascii_lowercase(), b'k' | b's'))
}
