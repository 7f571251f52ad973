//! Line-oriented document model.
//!
//! A [`Document`] is the file split into [`Line`]s, each keeping its exact text
//! and terminator so that rendering reproduces untouched lines byte-for-byte.
//! Structure is never stored here; it is computed on demand by [`classify`].

mod classify;

pub use classify::{classify, LineKind, INDENT_WIDTH};

use std::fs;
use std::io;
use std::path::Path;

/// Line terminator as found in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// Final line without a newline.
    None,
}

impl Terminator {
    /// The terminator's bytes as text.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Terminator::Lf => "\n",
            Terminator::CrLf => "\r\n",
            Terminator::None => "",
        }
    }
}

/// One physical line: text without its terminator, plus the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub terminator: Terminator,
}

impl Line {
    /// Create a line from text and terminator.
    pub fn new(text: impl Into<String>, terminator: Terminator) -> Self {
        Self {
            text: text.into(),
            terminator,
        }
    }

    /// Number of leading spaces.
    #[inline]
    pub fn indent(&self) -> usize {
        self.text.bytes().take_while(|&b| b == b' ').count()
    }

    /// True if the line holds nothing but whitespace.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An ordered sequence of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    lines: Vec<Line>,
}

impl Document {
    /// Split text into lines, keeping each line's terminator.
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut rest = text;

        while let Some(nl) = rest.find('\n') {
            let raw = &rest[..nl];
            let line = match raw.strip_suffix('\r') {
                Some(text) => Line::new(text, Terminator::CrLf),
                None => Line::new(raw, Terminator::Lf),
            };
            lines.push(line);
            rest = &rest[nl + 1..];
        }
        if !rest.is_empty() {
            lines.push(Line::new(rest, Terminator::None));
        }

        Self { lines }
    }

    /// Build a document from raw bytes. Invalid UTF-8 is replaced, not rejected.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(bytes))
    }

    /// Build a document from already-split lines.
    pub fn from_lines(lines: Vec<Line>) -> Self {
        Self { lines }
    }

    /// Load a document from disk. Returns `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> io::Result<Option<Self>> {
        Ok(read_source(path)?.map(|bytes| Self::from_bytes(&bytes)))
    }

    /// All lines in order.
    #[inline]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Number of lines.
    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if the document has no lines at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True if every line is blank or a comment.
    pub fn is_empty_content(&self) -> bool {
        self.lines
            .iter()
            .all(|line| line.is_blank() || line.text.trim_start().starts_with('#'))
    }

    /// Dominant newline style, taken from the first terminated line.
    ///
    /// Defaults to `\n` for documents without any terminated line.
    pub fn newline(&self) -> Terminator {
        self.lines
            .iter()
            .map(|line| line.terminator)
            .find(|t| *t != Terminator::None)
            .unwrap_or(Terminator::Lf)
    }

    /// Concatenate all lines with their terminators.
    pub fn render(&self) -> String {
        let capacity = self
            .lines
            .iter()
            .map(|l| l.text.len() + l.terminator.as_str().len())
            .sum();
        let mut out = String::with_capacity(capacity);
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(line.terminator.as_str());
        }
        out
    }
}

/// Read a file's bytes, mapping "not found" to `Ok(None)`.
pub fn read_source(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
