//! Detection of bare all-uppercase words.
//!
//! Any standalone run of two or more ASCII capitals is flagged, e.g. `HELLO`
//! or `OK`. Word boundaries are ASCII boundaries, so `ABc`, `A1B` and `_AB`
//! are not flagged while `éAB` is.

use lazy_static::lazy_static;
use regex::Regex;

use super::scan::PatternScanner;
use super::ScanMatch;

lazy_static! {
    static ref UPPERCASE_PATTERN: Regex = Regex::new(r"(?-u:\b)[A-Z]{2,}(?-u:\b)").unwrap();
}

/// Finds all-uppercase words in a text, in document order.
#[derive(Debug, Clone)]
pub struct UppercaseScanner<'t> {
    inner: PatternScanner<'static, 't>,
}

impl<'t> UppercaseScanner<'t> {
    pub fn new(text: &'t str) -> Self {
        Self {
            inner: PatternScanner::new(&UPPERCASE_PATTERN, text),
        }
    }
}

impl Iterator for UppercaseScanner<'_> {
    type Item = ScanMatch;

    fn next(&mut self) -> Option<ScanMatch> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<(usize, usize)> {
        UppercaseScanner::new(text)
            .map(|m| (m.offset, m.length))
            .collect()
    }

    #[test]
    fn test_flags_uppercase_words() {
        assert_eq!(words("say HELLO to OK"), vec![(4, 5), (13, 2)]);
    }

    #[test]
    fn test_ignores_single_letters_and_mixed_case() {
        assert!(words("A b C Hello hELLO").is_empty());
        assert!(words("ABc A1B _AB AB_").is_empty());
    }

    #[test]
    fn test_punctuation_is_a_boundary() {
        assert_eq!(words("(NOTE): x"), vec![(1, 4)]);
        assert_eq!(words("$ draw (RED)"), vec![(8, 3)]);
    }

    #[test]
    fn test_non_ascii_neighbours_are_boundaries() {
        // "é" is two bytes
        assert_eq!(words("éAB"), vec![(2, 2)]);
    }
}
