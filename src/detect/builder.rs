//! Turns scanner matches into positioned diagnostics.
//!
//! Every pass has a problem budget (`maxNumberOfProblems`) shared by all
//! scanners. Once it is spent the builder stops pulling matches, so the rest
//! of the document is never scanned in that pass.

use crate::document::TextDocument;
use crate::registry::{FunctionRegistry, DICTIONARY_FILE_NAME};
use crate::settings::ValidationSettings;

use super::{
    CallMatch, CallScanner, DiagnosticRecord, DiagnosticRule, RelatedInformation, ScanMatch,
    Severity, UppercaseScanner,
};

/// Accumulates diagnostics for one document within a problem budget.
pub struct DiagnosticBuilder<'a> {
    document: &'a TextDocument,
    registry: &'a FunctionRegistry,
    budget: usize,
    related_information: bool,
    dictionary_name: &'a str,
    diagnostics: Vec<DiagnosticRecord>,
}

impl<'a> DiagnosticBuilder<'a> {
    pub fn new(
        document: &'a TextDocument,
        registry: &'a FunctionRegistry,
        settings: &ValidationSettings,
    ) -> Self {
        Self {
            document,
            registry,
            budget: settings.max_number_of_problems,
            related_information: false,
            dictionary_name: DICTIONARY_FILE_NAME,
            diagnostics: Vec::new(),
        }
    }

    /// Attach related-information entries (client must support them).
    pub fn related_information(mut self, enabled: bool) -> Self {
        self.related_information = enabled;
        self
    }

    /// Dictionary file name quoted in unknown-function hints.
    pub fn dictionary_name(mut self, name: &'a str) -> Self {
        self.dictionary_name = name;
        self
    }

    /// Diagnostics that can still be emitted in this pass.
    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.diagnostics.len())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Emit one diagnostic per call expression, in scan order.
    pub fn push_calls<I>(&mut self, calls: I)
    where
        I: IntoIterator<Item = CallMatch>,
    {
        let remaining = self.remaining();
        for call in calls.into_iter().take(remaining) {
            let diagnostic = self.call_diagnostic(&call);
            self.diagnostics.push(diagnostic);
        }
    }

    /// Emit one warning per all-uppercase word, in scan order.
    pub fn push_uppercase<I>(&mut self, words: I)
    where
        I: IntoIterator<Item = ScanMatch>,
    {
        let remaining = self.remaining();
        for word in words.into_iter().take(remaining) {
            let diagnostic = self.uppercase_diagnostic(&word);
            self.diagnostics.push(diagnostic);
        }
    }

    pub fn finish(self) -> Vec<DiagnosticRecord> {
        self.diagnostics
    }

    fn call_diagnostic(&self, call: &CallMatch) -> DiagnosticRecord {
        let range = self.document.range(call.span.offset, call.span.length);
        let name = call.name();

        if !self.registry.exists(name) {
            let related_information = self.related_information.then(|| {
                vec![RelatedInformation {
                    uri: self.document.uri().clone(),
                    range,
                    message: format!("no function named '{}' in {}", name, self.dictionary_name),
                }]
            });
            return DiagnosticRecord {
                rule: DiagnosticRule::InvalidFunction,
                severity: Severity::Error,
                range,
                message: format!("{} is an invalid function name.", name),
                related_information,
            };
        }

        // Informational only: the count is not compared with the signature
        DiagnosticRecord {
            rule: DiagnosticRule::ParameterCount,
            severity: Severity::Error,
            range,
            message: format!("{} has {} parameters", name, call.parameter_count),
            related_information: None,
        }
    }

    fn uppercase_diagnostic(&self, word: &ScanMatch) -> DiagnosticRecord {
        let range = self.document.range(word.offset, word.length);
        let text = &self.document.text()[word.offset..word.end()];

        let related_information = self.related_information.then(|| {
            ["Spelling matters", "Particularly for names"]
                .into_iter()
                .map(|message| RelatedInformation {
                    uri: self.document.uri().clone(),
                    range,
                    message: message.to_string(),
                })
                .collect()
        });

        DiagnosticRecord {
            rule: DiagnosticRule::AllUppercase,
            severity: Severity::Warning,
            range,
            message: format!("{} is all uppercase. {}", text, self.document.uri()),
            related_information,
        }
    }
}

/// Run both scanners over a document: call expressions first, then
/// all-uppercase words, within one shared budget.
pub fn diagnose(
    document: &TextDocument,
    registry: &FunctionRegistry,
    settings: &ValidationSettings,
    related_information: bool,
    dictionary_name: &str,
) -> Vec<DiagnosticRecord> {
    let mut builder = DiagnosticBuilder::new(document, registry, settings)
        .related_information(related_information)
        .dictionary_name(dictionary_name);

    builder.push_calls(CallScanner::new(document.text()));
    if !builder.is_exhausted() {
        builder.push_uppercase(UppercaseScanner::new(document.text()));
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DictionaryData, FunctionSignature};
    use std::collections::BTreeMap;
    use tower_lsp::lsp_types::{Position, Url};

    fn document(text: &str) -> TextDocument {
        TextDocument::new(Url::parse("file:///notes/page.mded").unwrap(), 1, text)
    }

    fn registry_with(names: &[&str]) -> FunctionRegistry {
        let functions: BTreeMap<_, _> = names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    FunctionSignature {
                        location: "lib.mded".to_string(),
                        parameters: vec!["x".to_string(), "y".to_string(), "color".to_string()],
                    },
                )
            })
            .collect();
        let mut data = DictionaryData::new();
        data.insert("lib".to_string(), functions);
        FunctionRegistry::from_data(data)
    }

    fn settings(max: usize) -> ValidationSettings {
        ValidationSettings {
            max_number_of_problems: max,
        }
    }

    fn run(
        doc: &TextDocument,
        registry: &FunctionRegistry,
        max: usize,
        related_information: bool,
    ) -> Vec<DiagnosticRecord> {
        diagnose(
            doc,
            registry,
            &settings(max),
            related_information,
            DICTIONARY_FILE_NAME,
        )
    }

    #[test]
    fn test_known_function_reports_parameter_count() {
        let doc = document(r#"$ draw (10, 20, "red")"#);
        let diagnostics = run(&doc, &registry_with(&["draw"]), 1000, false);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule, DiagnosticRule::ParameterCount);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].message, "draw has 3 parameters");
        assert_eq!(diagnostics[0].range.start, Position { line: 0, character: 0 });
        assert_eq!(diagnostics[0].range.end, Position { line: 0, character: 22 });
    }

    #[test]
    fn test_unknown_function() {
        let doc = document("$ wobble (1)");
        let diagnostics = run(&doc, &registry_with(&["draw"]), 1000, false);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule, DiagnosticRule::InvalidFunction);
        assert_eq!(diagnostics[0].message, "wobble is an invalid function name.");
        assert!(diagnostics[0].related_information.is_none());
    }

    #[test]
    fn test_arity_is_not_checked() {
        let doc = document("$ draw (1)");
        let diagnostics = run(&doc, &registry_with(&["draw"]), 1000, false);
        assert_eq!(diagnostics[0].message, "draw has 1 parameters");
    }

    #[test]
    fn test_uppercase_warning_mentions_uri() {
        let doc = document("say HELLO");
        let diagnostics = run(&doc, &FunctionRegistry::empty(), 1000, false);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(
            diagnostics[0].message,
            "HELLO is all uppercase. file:///notes/page.mded"
        );
        assert_eq!(diagnostics[0].range.start.character, 4);
        assert_eq!(diagnostics[0].range.end.character, 9);
    }

    #[test]
    fn test_calls_come_before_uppercase_words() {
        let doc = document("TOP line\n$ draw (1)\n$ nope (2)\nEND");
        let diagnostics = run(&doc, &registry_with(&["draw"]), 1000, false);

        let rules: Vec<_> = diagnostics.iter().map(|d| d.rule).collect();
        assert_eq!(
            rules,
            vec![
                DiagnosticRule::ParameterCount,
                DiagnosticRule::InvalidFunction,
                DiagnosticRule::AllUppercase,
                DiagnosticRule::AllUppercase,
            ]
        );
        assert_eq!(diagnostics[2].range.start.line, 0);
        assert_eq!(diagnostics[3].range.start.line, 3);
    }

    #[test]
    fn test_budget_is_shared_across_scanners() {
        let doc = document("$ a (1)\n$ b (2)\nONE TWO THREE");

        let diagnostics = run(&doc, &FunctionRegistry::empty(), 3, false);
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[2].message, "ONE is all uppercase. file:///notes/page.mded");

        let diagnostics = run(&doc, &FunctionRegistry::empty(), 1, false);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule, DiagnosticRule::InvalidFunction);
    }

    #[test]
    fn test_budget_stops_pulling_matches() {
        let doc = document("$ a (1)\n$ b (2)\n$ c (3)");
        let registry = FunctionRegistry::empty();
        let mut builder = DiagnosticBuilder::new(&doc, &registry, &settings(2));

        let mut scanner = CallScanner::new(doc.text());
        builder.push_calls(scanner.by_ref());

        assert!(builder.is_exhausted());
        // The third call is still unscanned
        assert_eq!(scanner.next().map(|c| c.name().to_string()), Some("c".to_string()));
        assert_eq!(builder.finish().len(), 2);
    }

    #[test]
    fn test_related_information() {
        let doc = document("$ wobble (1) LOUD");
        let diagnostics = run(&doc, &FunctionRegistry::empty(), 1000, true);

        let call_related = diagnostics[0].related_information.as_ref().unwrap();
        assert_eq!(call_related.len(), 1);
        assert_eq!(
            call_related[0].message,
            "no function named 'wobble' in dictionary.mded.json"
        );
        assert_eq!(call_related[0].range, diagnostics[0].range);

        let word_related = diagnostics[1].related_information.as_ref().unwrap();
        let messages: Vec<_> = word_related.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["Spelling matters", "Particularly for names"]);
    }

    #[test]
    fn test_diagnose_is_idempotent() {
        let doc = document("$ draw (1, 2)\n$ gone (x)\nWARN here");
        let registry = registry_with(&["draw"]);
        let first = run(&doc, &registry, 1000, true);
        let second = run(&doc, &registry, 1000, true);
        assert_eq!(first, second);
    }
}
