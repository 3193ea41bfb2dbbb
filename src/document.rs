//! Text documents with offset to position mapping.

use tower_lsp::lsp_types::{Position, Range, Url};

/// A full-text snapshot of one document.
///
/// Scanners report byte offsets; [`TextDocument::position_at`] turns them into
/// LSP positions (zero-based line, UTF-16 code unit column). `\n`, `\r\n` and a
/// lone `\r` all end a line.
#[derive(Debug, Clone)]
pub struct TextDocument {
    uri: Url,
    version: i32,
    text: String,
    /// Byte offset where each line starts. Always begins with 0.
    line_starts: Vec<usize>,
}

impl TextDocument {
    pub fn new(uri: Url, version: i32, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = compute_line_starts(&text);
        Self {
            uri,
            version,
            text,
            line_starts,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Position of a byte offset.
    ///
    /// Offsets past the end clamp to the end of the text; offsets inside a
    /// multi-byte character resolve to the start of that character.
    pub fn position_at(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }

        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let line_start = self.line_starts[line];
        let character: usize = self.text[line_start..offset]
            .chars()
            .map(char::len_utf16)
            .sum();

        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    /// Range covering `length` bytes starting at `offset`.
    pub fn range(&self, offset: usize, length: usize) -> Range {
        Range {
            start: self.position_at(offset),
            end: self.position_at(offset + length),
        }
    }
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut starts = vec![0];
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                starts.push(i + 2);
                i += 2;
                continue;
            }
            b'\r' | b'\n' => starts.push(i + 1),
            _ => {}
        }
        i += 1;
    }
    starts
}
