//! Line classification for the supported compose subset.
//!
//! Every line gets exactly one [`LineKind`]. Structure outside the subset
//! (tabs, odd indentation, flow collections, anchors, tags, block scalars,
//! document markers) is rejected here, before anything tries to edit it.

use std::sync::OnceLock;

use regex::Regex;

use super::Document;
use crate::error::{PatchError, PatchResult};

/// Spaces per nesting level.
pub const INDENT_WIDTH: usize = 2;

/// Structural role of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Empty or whitespace-only.
    Blank,
    /// Comment-only line, at any indentation.
    Comment,
    /// `key:` at depth 0.
    SectionHeader { key: String, value: Option<String> },
    /// `key:` at depth 1.
    EntryHeader { key: String, value: Option<String> },
    /// `key:` at depth 2.
    DeclarationKey { key: String, value: Option<String> },
    /// `- value` at any depth below the top level.
    ListItem { depth: usize, value: String },
    /// Anything else: deeper keys, continuation scalars.
    Opaque { depth: usize },
}

impl LineKind {
    /// Nesting depth, or `None` for blank and comment lines.
    pub fn depth(&self) -> Option<usize> {
        match self {
            LineKind::Blank | LineKind::Comment => None,
            LineKind::SectionHeader { .. } => Some(0),
            LineKind::EntryHeader { .. } => Some(1),
            LineKind::DeclarationKey { .. } => Some(2),
            LineKind::ListItem { depth, .. } | LineKind::Opaque { depth } => Some(*depth),
        }
    }

    /// True for lines that carry structure (not blank, not comment).
    #[inline]
    pub fn is_content(&self) -> bool {
        self.depth().is_some()
    }

    /// Key and inline value of a header or declaration line.
    pub fn key(&self) -> Option<(&str, Option<&str>)> {
        match self {
            LineKind::SectionHeader { key, value }
            | LineKind::EntryHeader { key, value }
            | LineKind::DeclarationKey { key, value } => Some((key, value.as_deref())),
            _ => None,
        }
    }

    /// Key of a mapping line at exactly `depth`.
    pub fn key_at(&self, depth: usize) -> Option<(&str, Option<&str>)> {
        if self.depth() == Some(depth) {
            self.key()
        } else {
            None
        }
    }
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"^(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<plain>[^\s#'"?:,\[\]{}&*!|>%@`-][^:#]*?))[ ]*:(?:[ ]+(?P<rest>.*))?$"#,
        )
        .expect("key pattern is valid")
    })
}

/// Classify every line of `doc`.
///
/// Fails with [`PatchError::MalformedDocument`] on the first line that falls
/// outside the supported subset. Line numbers in errors are 1-based.
pub fn classify(doc: &Document) -> PatchResult<Vec<LineKind>> {
    doc.lines()
        .iter()
        .enumerate()
        .map(|(i, line)| classify_line(&line.text, i + 1))
        .collect()
}

fn classify_line(text: &str, line: usize) -> PatchResult<LineKind> {
    if text.trim().is_empty() {
        return Ok(LineKind::Blank);
    }

    let indent = text.len() - text.trim_start_matches([' ', '\t']).len();
    let content = text[indent..].trim_end();

    // Comment indentation is never checked, tabs included.
    if content.starts_with('#') {
        return Ok(LineKind::Comment);
    }
    if text[..indent].contains('\t') {
        return Err(PatchError::malformed(line, "tab in indentation"));
    }
    if indent % INDENT_WIDTH != 0 {
        return Err(PatchError::malformed(
            line,
            format!("indentation of {} spaces is not a multiple of {}", indent, INDENT_WIDTH),
        ));
    }
    let depth = indent / INDENT_WIDTH;

    if depth == 0 && is_document_marker(content) {
        return Err(PatchError::malformed(line, "document markers are not supported"));
    }
    if content == "?" || content.starts_with("? ") {
        return Err(PatchError::malformed(line, "explicit keys are not supported"));
    }

    if content == "-" || content.starts_with("- ") {
        if depth == 0 {
            return Err(PatchError::malformed(line, "top-level sequences are not supported"));
        }
        let value = check_value(content[1..].trim(), line)?.unwrap_or_default();
        return Ok(LineKind::ListItem {
            depth,
            value: value.to_string(),
        });
    }

    if let Some(caps) = key_pattern().captures(content) {
        let key = caps
            .name("dq")
            .or_else(|| caps.name("sq"))
            .or_else(|| caps.name("plain"))
            .map(|m| m.as_str().trim_end().to_string())
            .unwrap_or_default();
        let value = match caps.name("rest") {
            Some(rest) => check_value(rest.as_str().trim(), line)?.map(str::to_string),
            None => None,
        };
        return Ok(match depth {
            0 => LineKind::SectionHeader { key, value },
            1 => LineKind::EntryHeader { key, value },
            2 => LineKind::DeclarationKey { key, value },
            _ => LineKind::Opaque { depth },
        });
    }

    if depth == 0 {
        return Err(PatchError::malformed(line, "unrecognised top-level line"));
    }
    Ok(LineKind::Opaque { depth })
}

fn is_document_marker(content: &str) -> bool {
    ["---", "..."].iter().any(|marker| {
        content
            .strip_prefix(marker)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with(' '))
    })
}

/// Reject value forms that need a full parser. Returns `None` for an empty
/// value or a value that is only a comment.
fn check_value(value: &str, line: usize) -> PatchResult<Option<&str>> {
    let Some(first) = value.chars().next() else {
        return Ok(None);
    };
    let reason = match first {
        '#' => return Ok(None),
        '{' | '[' => "flow collections are not supported",
        '&' | '*' => "anchors and aliases are not supported",
        '!' => "tags are not supported",
        '|' | '>' => "block scalars are not supported",
        _ => return Ok(Some(value)),
    };
    Err(PatchError::malformed(line, reason))
}
