//! Cursor-driven regex scanning.

use regex::Regex;

use super::ScanMatch;

/// Walks a text with one pattern, yielding non-overlapping matches in order.
///
/// The cursor lives in the scanner itself, so every scanner is an
/// independent, finite pass. Scanning the same text again means creating a
/// new scanner.
#[derive(Debug, Clone)]
pub struct PatternScanner<'r, 't> {
    regex: &'r Regex,
    text: &'t str,
    cursor: usize,
}

impl<'r, 't> PatternScanner<'r, 't> {
    pub fn new(regex: &'r Regex, text: &'t str) -> Self {
        Self {
            regex,
            text,
            cursor: 0,
        }
    }
}

impl Iterator for PatternScanner<'_, '_> {
    type Item = ScanMatch;

    fn next(&mut self) -> Option<ScanMatch> {
        if self.cursor > self.text.len() {
            return None;
        }

        // captures_at keeps the text before the cursor visible to \b
        let caps = self.regex.captures_at(self.text, self.cursor)?;
        let whole = caps.get(0)?;

        self.cursor = if whole.end() > whole.start() {
            whole.end()
        } else {
            // Step over one character so an empty match cannot stall the scan
            whole.end()
                + self.text[whole.end()..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8)
        };

        let captures = caps
            .iter()
            .skip(1)
            .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();

        Some(ScanMatch {
            offset: whole.start(),
            length: whole.len(),
            captures,
        })
    }
}
