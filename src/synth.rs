//! Minimal documents and entries built from configuration alone.

use crate::config::{Declaration, PatchConfig};
use crate::insert::{container_lines, group_by_key, indent};

/// How much had to be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Synthesis {
    /// No file, or a file without content: a whole new document.
    Document,
    /// The section was appended to an existing document.
    Section,
    /// The entry was appended to an existing section.
    Entry,
}

/// Lines of the entry: header at `depth`, template fields, then declarations.
///
/// Template fields whose key is also declared are left out.
pub fn entry_lines(config: &PatchConfig, depth: usize) -> Vec<String> {
    let declared = |key: &str| config.declarations.iter().any(|d| d.key == key);
    let fields: Vec<&Declaration> = config
        .template
        .iter()
        .filter(|t| !declared(&t.key))
        .chain(&config.declarations)
        .collect();

    let mut lines = vec![format!("{}{}:", indent(depth), config.entry)];
    for (key, group) in group_by_key(&fields) {
        lines.extend(container_lines(key, &group, depth + 1));
    }
    lines
}

/// Section header followed by the entry.
pub fn section_lines(config: &PatchConfig) -> Vec<String> {
    let mut lines = vec![format!("{}:", config.section)];
    lines.extend(entry_lines(config, 1));
    lines
}

/// A complete document holding only the configured entry.
pub fn synthesize_document(config: &PatchConfig) -> String {
    let mut out = String::new();
    for line in section_lines(config) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_document() {
        let doc = synthesize_document(&PatchConfig::compose_defaults("app"));
        insta::assert_snapshot!(doc, @r###"
        services:
          app:
            build: .
            restart: unless-stopped
            env_file:
              - .env
            volumes:
              - ./config:/app/config:ro
              - ./data:/app/data
        "###);
    }

    #[test]
    fn test_declared_keys_override_template() {
        let config = PatchConfig::new("bot")
            .with_template(Declaration::scalar("restart", "always"))
            .with_declaration(Declaration::scalar("restart", "no"));
        assert_eq!(entry_lines(&config, 1), vec!["  bot:", "    restart: no"]);
    }

    #[test]
    fn test_entry_without_declarations() {
        assert_eq!(entry_lines(&PatchConfig::new("bot"), 1), vec!["  bot:"]);
    }

    #[test]
    fn test_custom_section() {
        let config = PatchConfig::new("worker").with_section("x-services");
        assert_eq!(section_lines(&config), vec!["x-services:", "  worker:"]);
    }
}
