//! Line-preserving insertion of missing declarations.
//!
//! Insertion is split in two steps. [`plan`] reads the classified block and
//! returns [`Insertion`]s, or fails without touching anything. [`apply`] builds
//! a new document with the planned lines spliced in. Existing lines are cloned
//! unchanged, so a failed plan can never leave a partial edit behind.

use tracing::debug;

use crate::config::{Declaration, DeclarationKind};
use crate::document::{Document, Line, LineKind, Terminator, INDENT_WIDTH};
use crate::error::{PatchError, PatchResult};
use crate::locate::{extent, Block};
use crate::probe::{list_items, normalize};

/// Lines to splice in before line index `at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub at: usize,
    /// Line texts without terminators.
    pub lines: Vec<String>,
    /// Declarations these lines write. Container headers and values dropped
    /// as normalized duplicates do not count.
    pub added: usize,
}

/// Leading spaces for `depth`.
#[inline]
pub fn indent(depth: usize) -> String {
    " ".repeat(depth * INDENT_WIDTH)
}

/// Group declarations by key, keeping first-appearance order.
pub(crate) fn group_by_key<'d>(decls: &[&'d Declaration]) -> Vec<(&'d str, Vec<&'d Declaration>)> {
    let mut groups: Vec<(&str, Vec<&Declaration>)> = Vec::new();
    for &decl in decls {
        match groups.iter_mut().find(|(key, _)| *key == decl.key) {
            Some((_, members)) => members.push(decl),
            None => groups.push((decl.key.as_str(), vec![decl])),
        }
    }
    groups
}

/// `- value` lines at `depth`, skipping values normalized-equal to `existing`
/// or to an earlier value in `decls`.
fn item_lines(decls: &[&Declaration], depth: usize, existing: &[&str]) -> Vec<String> {
    let pad = indent(depth);
    let mut seen: Vec<&str> = existing.to_vec();
    let mut lines = Vec::new();
    for decl in decls {
        let value = normalize(decl.value());
        if seen.contains(&value) {
            continue;
        }
        seen.push(value);
        lines.push(format!("{}- {}", pad, decl.value()));
    }
    lines
}

/// A new key at `depth` holding `decls`. All members share one form.
pub(crate) fn container_lines(key: &str, decls: &[&Declaration], depth: usize) -> Vec<String> {
    let pad = indent(depth);
    match decls.first().map(|d| &d.kind) {
        Some(DeclarationKind::Scalar(value)) => vec![format!("{}{}: {}", pad, key, value)],
        _ => {
            let mut lines = vec![format!("{}{}:", pad, key)];
            lines.extend(item_lines(decls, depth + 1, &[]));
            lines
        }
    }
}

/// Plan the insertion of `missing` declarations into `block`.
///
/// New keys go before the first existing sibling that follows them in
/// `key_order`, otherwise at the end of the block's content. New items go after
/// the last existing item of their list. Anything the classification cannot
/// place with certainty fails with [`PatchError::AmbiguousBlock`].
pub fn plan(
    kinds: &[LineKind],
    block: &Block,
    missing: &[&Declaration],
    key_order: &[String],
) -> PatchResult<Vec<Insertion>> {
    let child = block.depth + 1;

    if let Some((name, Some(value))) = kinds[block.start].key() {
        return Err(PatchError::ambiguous(
            block.start + 1,
            format!("entry `{}` has inline value {:?}", name, value),
        ));
    }

    let siblings = sibling_keys(kinds, block)?;

    // (at, order among lines landing at `at`, lines, declarations written)
    let mut planned: Vec<(usize, usize, Vec<String>, usize)> = Vec::new();
    for (key, decls) in group_by_key(missing) {
        if let Some(decl) = decls.iter().find(|d| d.depth != child) {
            return Err(PatchError::ambiguous(
                block.start + 1,
                format!(
                    "declaration `{}` expects depth {} but entry keys sit at depth {}",
                    decl.key, decl.depth, child
                ),
            ));
        }

        match siblings.iter().find(|(_, k)| *k == key) {
            Some(&(index, _)) => {
                let lines = extend_container(kinds, block, index, &decls)?;
                if !lines.is_empty() {
                    let container = extent(kinds, index, child, block.end);
                    let added = lines.len();
                    planned.push((container.content_end, 0, lines, added));
                }
            }
            None => {
                let at = placement(kinds, block, &siblings, key, key_order);
                let lines = container_lines(key, &decls, child);
                let added = match decls[0].kind {
                    DeclarationKind::Scalar(_) => 1,
                    DeclarationKind::ListItem(_) => lines.len() - 1,
                };
                let order = key_order.iter().position(|k| k == key).map_or(usize::MAX, |r| r + 1);
                planned.push((at, order, lines, added));
            }
        }
    }

    // Items for an existing list land before new keys sharing the index, and
    // new keys sharing an index follow the canonical order.
    planned.sort_by_key(|(at, order, _, _)| (*at, *order));

    let insertions: Vec<Insertion> = planned
        .into_iter()
        .map(|(at, _, lines, added)| Insertion { at, lines, added })
        .collect();
    debug!(
        count = insertions.len(),
        lines = insertions.iter().map(|i| i.lines.len()).sum::<usize>(),
        "insertions planned"
    );
    Ok(insertions)
}

/// Keys directly under the entry, in document order.
fn sibling_keys<'k>(kinds: &'k [LineKind], block: &Block) -> PatchResult<Vec<(usize, &'k str)>> {
    let child = block.depth + 1;
    let mut siblings: Vec<(usize, &str)> = Vec::new();

    for i in block.body() {
        let kind = &kinds[i];
        if kind.depth() != Some(child) {
            continue;
        }
        let Some((key, _)) = kind.key_at(child) else {
            let reason = match kind {
                LineKind::ListItem { .. } => "list item at the depth of entry keys".to_string(),
                _ => "unrecognised line at the depth of entry keys".to_string(),
            };
            return Err(PatchError::ambiguous(i + 1, reason));
        };
        if siblings.iter().any(|(_, k)| *k == key) {
            return Err(PatchError::ambiguous(
                i + 1,
                format!("key `{}` appears twice", key),
            ));
        }
        siblings.push((i, key));
    }
    Ok(siblings)
}

/// Item lines to append to the existing list at `index`.
fn extend_container(
    kinds: &[LineKind],
    block: &Block,
    index: usize,
    decls: &[&Declaration],
) -> PatchResult<Vec<String>> {
    let child = block.depth + 1;
    let (key, inline) = kinds[index].key().unwrap_or_default();

    if let Some(value) = inline {
        return Err(PatchError::ambiguous(
            index + 1,
            format!("`{}` has inline value {:?}, cannot add list items", key, value),
        ));
    }

    let container = extent(kinds, index, child, block.end);
    let mut seen_item = false;
    for i in container.body() {
        match &kinds[i] {
            LineKind::ListItem { depth, .. } if *depth == child + 1 => seen_item = true,
            kind => match kind.depth() {
                Some(d) if d == child + 1 => {
                    return Err(PatchError::ambiguous(
                        i + 1,
                        format!("`{}` holds a mapping, not a list", key),
                    ));
                }
                Some(_) if !seen_item => {
                    return Err(PatchError::ambiguous(
                        i + 1,
                        format!("unexpected indentation under `{}`", key),
                    ));
                }
                _ => {}
            },
        }
    }

    let items: Vec<&Declaration> = decls.iter().copied().filter(|d| d.is_list_item()).collect();
    let existing = list_items(kinds, container);
    Ok(item_lines(&items, child + 1, &existing))
}

/// Index for a new key: before the first canonical follower (and the comments
/// directly above it), else at the end of the block's content.
fn placement(
    kinds: &[LineKind],
    block: &Block,
    siblings: &[(usize, &str)],
    key: &str,
    key_order: &[String],
) -> usize {
    let rank = |k: &str| key_order.iter().position(|o| o == k);
    let Some(own) = rank(key) else {
        return block.content_end;
    };

    let follower = siblings
        .iter()
        .find(|(_, k)| rank(*k).map_or(false, |r| r > own));
    match follower {
        Some(&(mut at, _)) => {
            while at > block.start + 1 && kinds[at - 1] == LineKind::Comment {
                at -= 1;
            }
            at
        }
        None => block.content_end,
    }
}

/// Build a new document with `insertions` spliced in.
///
/// `insertions` must be sorted by index. New lines use the document's newline
/// style; a final unterminated line gains a terminator when lines follow it.
pub fn apply(doc: &Document, insertions: &[Insertion]) -> Document {
    let newline = doc.newline();
    let added: usize = insertions.iter().map(|i| i.lines.len()).sum();
    let mut lines: Vec<Line> = Vec::with_capacity(doc.len() + added);
    let mut pending = insertions.iter().peekable();

    for (i, line) in doc.lines().iter().enumerate() {
        while let Some(insertion) = pending.next_if(|ins| ins.at <= i) {
            push_lines(&mut lines, insertion, newline);
        }
        lines.push(line.clone());
    }
    for insertion in pending {
        push_lines(&mut lines, insertion, newline);
    }

    Document::from_lines(lines)
}

fn push_lines(lines: &mut Vec<Line>, insertion: &Insertion, newline: Terminator) {
    if let Some(last) = lines.last_mut() {
        if last.terminator == Terminator::None {
            last.terminator = newline;
        }
    }
    lines.extend(insertion.lines.iter().map(|text| Line::new(text.as_str(), newline)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PatchConfig, COMPOSE_KEY_ORDER};
    use crate::document::classify;
    use crate::locate::{locate, Location};
    use crate::probe::probe;

    fn patch_text(text: &str, config: &PatchConfig) -> PatchResult<String> {
        let doc = Document::parse(text);
        let kinds = classify(&doc)?;
        let Location::Found(block) = locate(&kinds, &config.section, &config.entry)? else {
            panic!("entry not found");
        };
        let missing = probe(&kinds, &block, &config.declarations);
        let insertions = plan(&kinds, &block, &missing, &config.key_order)?;
        Ok(apply(&doc, &insertions).render())
    }

    fn defaults() -> PatchConfig {
        PatchConfig::compose_defaults("app")
    }

    #[test]
    fn test_adds_containers_at_block_end() {
        let out = patch_text("services:\n  app:\n    build: .\n", &defaults()).unwrap();
        assert_eq!(
            out,
            "services:\n  app:\n    build: .\n    env_file:\n      - .env\n    volumes:\n      - ./config:/app/config:ro\n      - ./data:/app/data\n"
        );
    }

    #[test]
    fn test_new_key_goes_before_canonical_follower() {
        let text = "services:\n  app:\n    build: .\n    # published ports\n    ports:\n      - \"8080:80\"\n";
        let out = patch_text(text, &defaults()).unwrap();
        insta::assert_snapshot!(out, @r###"
        services:
          app:
            build: .
            env_file:
              - .env
            volumes:
              - ./config:/app/config:ro
              - ./data:/app/data
            # published ports
            ports:
              - "8080:80"
        "###);
    }

    #[test]
    fn test_appends_after_existing_items() {
        let text = "services:\n  app:\n    env_file:\n      - .env\n    volumes:\n      - ./logs:/app/logs\n      - ./data:/app/data\n\n  db:\n    image: postgres\n";
        let out = patch_text(text, &defaults()).unwrap();
        assert_eq!(
            out,
            "services:\n  app:\n    env_file:\n      - .env\n    volumes:\n      - ./logs:/app/logs\n      - ./data:/app/data\n      - ./config:/app/config:ro\n\n  db:\n    image: postgres\n"
        );
    }

    #[test]
    fn test_list_of_maps_is_extended_after_last_item() {
        let config = PatchConfig::new("app").with_declaration(Declaration::list_item("volumes", "./data:/app/data"));
        let text = "services:\n  app:\n    volumes:\n      - type: bind\n        source: ./cfg\n        target: /cfg\n";
        let out = patch_text(text, &config).unwrap();
        assert!(out.ends_with("        target: /cfg\n      - ./data:/app/data\n"));
    }

    #[test]
    fn test_unterminated_last_line_gains_newline() {
        let out = patch_text("services:\n  app:\n    build: .", &defaults()).unwrap();
        assert!(out.starts_with("services:\n  app:\n    build: .\n    env_file:\n"));
        assert!(out.ends_with("- ./data:/app/data\n"));
    }

    #[test]
    fn test_crlf_documents_stay_crlf() {
        let out = patch_text("services:\r\n  app:\r\n    build: .\r\n", &defaults()).unwrap();
        assert!(out.contains("    env_file:\r\n      - .env\r\n"));
        assert!(!out.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_scalar_declaration_inserted_in_order() {
        let config = PatchConfig::new("app").with_declaration(Declaration::scalar("restart", "unless-stopped"));
        let text = "services:\n  app:\n    image: nginx\n    volumes:\n      - ./a:/a\n";
        let out = patch_text(text, &config).unwrap();
        assert_eq!(
            out,
            "services:\n  app:\n    image: nginx\n    restart: unless-stopped\n    volumes:\n      - ./a:/a\n"
        );
    }

    #[test]
    fn test_extension_precedes_new_key_at_same_index() {
        let config = PatchConfig::new("app")
            .with_declaration(Declaration::list_item("labels", "patched=true"))
            .with_declaration(Declaration::list_item("volumes", "./b:/b"));
        let text = "services:\n  app:\n    volumes:\n      - ./a:/a\n";
        let out = patch_text(text, &config).unwrap();
        assert_eq!(
            out,
            "services:\n  app:\n    volumes:\n      - ./a:/a\n      - ./b:/b\n    labels:\n      - patched=true\n"
        );
    }

    #[test]
    fn test_normalized_duplicates_not_added() {
        let config = PatchConfig::new("app")
            .with_declaration(Declaration::env_file(".env"))
            .with_declaration(Declaration::env_file("'.env'"));
        let out = patch_text("services:\n  app:\n    build: .\n", &config).unwrap();
        assert_eq!(out.matches(".env").count(), 1);
    }

    #[test]
    fn test_added_counts_written_values_only() {
        let config = PatchConfig::new("app")
            .with_declaration(Declaration::env_file(".env"))
            .with_declaration(Declaration::env_file("\".env\""))
            .with_declaration(Declaration::scalar("restart", "always"))
            .with_declaration(Declaration::list_item("volumes", "./b:/b"))
            .with_declaration(Declaration::list_item("volumes", "./b:/b # same"));
        let doc = Document::parse("services:\n  app:\n    volumes:\n      - ./a:/a\n");
        let kinds = classify(&doc).unwrap();
        let Location::Found(block) = locate(&kinds, "services", "app").unwrap() else {
            panic!("app not found");
        };
        let missing = probe(&kinds, &block, &config.declarations);
        assert_eq!(missing.len(), 5);

        let insertions = plan(&kinds, &block, &missing, &config.key_order).unwrap();
        let added: Vec<usize> = insertions.iter().map(|i| i.added).collect();
        assert_eq!(added, vec![1, 1, 1]);
        assert_eq!(
            apply(&doc, &insertions).render(),
            "services:\n  app:\n    restart: always\n    env_file:\n      - .env\n    volumes:\n      - ./a:/a\n      - ./b:/b\n"
        );
    }

    #[test]
    fn test_inline_container_value_is_ambiguous() {
        let text = "services:\n  app:\n    env_file: other.env\n";
        assert!(matches!(
            patch_text(text, &defaults()),
            Err(PatchError::AmbiguousBlock { line: 3, .. })
        ));
    }

    #[test]
    fn test_indentless_sequence_is_ambiguous() {
        let text = "services:\n  app:\n    volumes:\n    - ./data:/app/data\n";
        assert!(matches!(
            patch_text(text, &defaults()),
            Err(PatchError::AmbiguousBlock { line: 4, .. })
        ));
    }

    #[test]
    fn test_mapping_container_is_ambiguous() {
        let config = PatchConfig::new("app").with_declaration(Declaration::list_item("environment", "A=1"));
        let text = "services:\n  app:\n    environment:\n      B: 2\n";
        assert!(matches!(
            patch_text(text, &config),
            Err(PatchError::AmbiguousBlock { line: 4, .. })
        ));
    }

    #[test]
    fn test_duplicate_key_is_ambiguous() {
        let text = "services:\n  app:\n    volumes:\n      - ./a:/a\n    volumes:\n      - ./b:/b\n";
        assert!(matches!(
            patch_text(text, &defaults()),
            Err(PatchError::AmbiguousBlock { line: 5, .. })
        ));
    }

    #[test]
    fn test_inline_entry_value_is_ambiguous() {
        assert!(matches!(
            patch_text("services:\n  app: nginx\n", &defaults()),
            Err(PatchError::AmbiguousBlock { line: 2, .. })
        ));
    }

    #[test]
    fn test_placement_without_known_key() {
        let kinds = classify(&Document::parse("services:\n  app:\n    build: .\n    ports:\n      - 80:80\n")).unwrap();
        let Location::Found(block) = locate(&kinds, "services", "app").unwrap() else {
            panic!("app not found");
        };
        let order: Vec<String> = COMPOSE_KEY_ORDER.iter().map(|k| k.to_string()).collect();
        let siblings = sibling_keys(&kinds, &block).unwrap();
        assert_eq!(placement(&kinds, &block, &siblings, "x-custom", &order), 5);
        assert_eq!(placement(&kinds, &block, &siblings, "volumes", &order), 3);
        assert_eq!(placement(&kinds, &block, &siblings, "labels", &order), 5);
    }

    #[test]
    fn test_apply_without_insertions_is_identity() {
        let doc = Document::parse("a:\n  b: 1\n");
        assert_eq!(apply(&doc, &[]), doc);
    }
}
