//! Detection of mded function-call expressions.
//!
//! A call expression looks like `$ name (arg, arg, ...)`:
//!
//! - `$`, optionally followed by whitespace
//! - an identifier (ASCII letters, digits, underscore)
//! - at least one whitespace character
//! - a parenthesised argument group that runs to the last `)` on the line,
//!   so one level of nested parentheses stays inside the group
//!
//! The argument text is then scanned again for parameter tokens: a
//! double-quoted string or a bare word. Separators are not validated, so
//! `$ f (a b)` simply counts two parameters.

use lazy_static::lazy_static;
use regex::Regex;

use super::scan::PatternScanner;
use super::ScanMatch;

lazy_static! {
    /// `$ name (args)`. Group 1 is the name, group 2 the arguments including
    /// the closing parenthesis.
    static ref CALL_PATTERN: Regex =
        Regex::new(r"\$\s*([A-Za-z0-9_]+)\s+\(([^\r\n]+\))").unwrap();

    /// A quoted string (greedy up to the last quote) or a bare word.
    static ref PARAMETER_PATTERN: Regex =
        Regex::new(r#""[^\r\n]+"|[A-Za-z0-9_]+"#).unwrap();
}

/// One call expression found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMatch {
    /// The whole `$ name (args)` expression.
    pub span: ScanMatch,
    /// Number of parameter tokens recognised in the argument group.
    pub parameter_count: usize,
}

impl CallMatch {
    /// The called function's name.
    pub fn name(&self) -> &str {
        self.span.capture(0).unwrap_or_default()
    }

    /// Argument text between the opening and the final closing parenthesis.
    pub fn arguments(&self) -> &str {
        let raw = self.raw_arguments();
        raw.strip_suffix(')').unwrap_or(raw)
    }

    /// A fresh scan over the individual parameter tokens.
    pub fn parameters(&self) -> ParameterScanner<'_> {
        ParameterScanner::new(self.arguments())
    }

    fn raw_arguments(&self) -> &str {
        self.span.capture(1).unwrap_or_default()
    }
}

/// Finds call expressions in a text, in document order.
#[derive(Debug, Clone)]
pub struct CallScanner<'t> {
    inner: PatternScanner<'static, 't>,
}

impl<'t> CallScanner<'t> {
    pub fn new(text: &'t str) -> Self {
        Self {
            inner: PatternScanner::new(&CALL_PATTERN, text),
        }
    }
}

impl Iterator for CallScanner<'_> {
    type Item = CallMatch;

    fn next(&mut self) -> Option<CallMatch> {
        let mut call = CallMatch {
            span: self.inner.next()?,
            parameter_count: 0,
        };
        call.parameter_count = call.parameters().count();
        Some(call)
    }
}

/// Finds parameter tokens in an argument list.
///
/// Offsets are relative to the argument text, not the document.
#[derive(Debug, Clone)]
pub struct ParameterScanner<'t> {
    inner: PatternScanner<'static, 't>,
}

impl<'t> ParameterScanner<'t> {
    pub fn new(arguments: &'t str) -> Self {
        Self {
            inner: PatternScanner::new(&PARAMETER_PATTERN, arguments),
        }
    }
}

impl Iterator for ParameterScanner<'_> {
    type Item = ScanMatch;

    fn next(&mut self) -> Option<ScanMatch> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Vec<CallMatch> {
        CallScanner::new(text).collect()
    }

    #[test]
    fn test_basic_call() {
        let calls = scan(r#"$ draw (10, 20, "red")"#);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name(), "draw");
        assert_eq!(calls[0].arguments(), r#"10, 20, "red""#);
        assert_eq!(calls[0].parameter_count, 3);
        assert_eq!(calls[0].span.offset, 0);
        assert_eq!(calls[0].span.length, 22);
    }

    #[test]
    fn test_offsets_are_absolute() {
        let text = "intro text\n  $wobble (1)";
        let calls = scan(text);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name(), "wobble");
        assert_eq!(calls[0].span.offset, 13);
        assert_eq!(&text[calls[0].span.offset..calls[0].span.end()], "$wobble (1)");
        assert_eq!(calls[0].arguments(), "1");
    }

    #[test]
    fn test_requires_space_before_arguments() {
        assert!(scan("$ draw(1)").is_empty());
        assert!(scan("draw (1)").is_empty());
        assert!(scan("$ draw ()").is_empty());
    }

    #[test]
    fn test_nested_parentheses_stay_in_group() {
        let calls = scan("$ plot (a, (b, c))");
        assert_eq!(calls[0].arguments(), "a, (b, c)");
        assert_eq!(calls[0].parameter_count, 3);
    }

    #[test]
    fn test_group_runs_to_last_paren_on_line() {
        let calls = scan("$ f (a) and (b)\n$ g (c)");

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments(), "a) and (b");
        assert_eq!(calls[0].parameter_count, 3);
        assert_eq!(calls[1].name(), "g");
        assert_eq!(calls[1].parameter_count, 1);
    }

    #[test]
    fn test_missing_separators_only_change_count() {
        assert_eq!(scan(r#"$ f (a b "c")"#)[0].parameter_count, 3);
        assert_eq!(scan("$ f (,,)")[0].parameter_count, 0);
    }

    #[test]
    fn test_quoted_string_is_greedy() {
        // Two strings on one line collapse into a single token
        assert_eq!(ParameterScanner::new(r#""a", "b""#).count(), 1);
        assert_eq!(ParameterScanner::new(r#""hello world", 3"#).count(), 2);
    }

    #[test]
    fn test_parameter_tokens() {
        let calls = scan(r#"$ draw (x, "two words")"#);
        let tokens: Vec<_> = calls[0].parameters().collect();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].offset, 0);
        assert_eq!(tokens[0].length, 1);
        assert_eq!(tokens[1].offset, 3);
        assert_eq!(tokens[1].length, 11);
    }

    #[test]
    fn test_rescanning_is_identical() {
        let text = "$ a (1)\n$ b (2, 3)\n";
        assert_eq!(scan(text), scan(text));
    }

    #[test]
    fn test_windows_line_endings() {
        let calls = scan("$ a (1)\r\n$ b (2)\r\n");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments(), "1");
    }
}
