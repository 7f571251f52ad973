//! Presence tests for required declarations inside an entry block.

use crate::config::{Declaration, DeclarationKind};
use crate::document::LineKind;
use crate::locate::{extent, Block};

/// Normalize a scalar for comparison.
///
/// Strips surrounding whitespace, one pair of matching quotes, and a trailing
/// ` #` comment on unquoted values.
pub fn normalize(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return &rest[..end];
            }
        }
    }
    match value.find(" #") {
        Some(i) => value[..i].trim_end(),
        None => value,
    }
}

/// First line in `block` holding `key` at exactly `depth`.
pub fn find_key<'k>(
    kinds: &'k [LineKind],
    block: &Block,
    key: &str,
    depth: usize,
) -> Option<(usize, Option<&'k str>)> {
    block.body().find_map(|i| match kinds[i].key_at(depth) {
        Some((k, value)) if k == key => Some((i, value)),
        _ => None,
    })
}

/// Normalized values of the list items directly under the key line at `container`.
pub fn list_items<'k>(kinds: &'k [LineKind], container: Block) -> Vec<&'k str> {
    kinds[container.body()]
        .iter()
        .filter_map(|kind| match kind {
            LineKind::ListItem { depth, value } if *depth == container.depth + 1 => {
                Some(normalize(value))
            }
            _ => None,
        })
        .collect()
}

/// True if `decl` is present in `block` at its expected depth.
pub fn is_satisfied(kinds: &[LineKind], block: &Block, decl: &Declaration) -> bool {
    let Some((index, inline)) = find_key(kinds, block, &decl.key, decl.depth) else {
        return false;
    };
    match &decl.kind {
        DeclarationKind::Scalar(_) => true,
        DeclarationKind::ListItem(item) => {
            let wanted = normalize(item);
            if inline.map(normalize) == Some(wanted) {
                return true;
            }
            let container = extent(kinds, index, decl.depth, block.end);
            list_items(kinds, container).contains(&wanted)
        }
    }
}

/// The declarations from `required` that `block` lacks, in the caller's order.
pub fn probe<'d>(kinds: &[LineKind], block: &Block, required: &'d [Declaration]) -> Vec<&'d Declaration> {
    required
        .iter()
        .filter(|decl| !is_satisfied(kinds, block, decl))
        .collect()
}
