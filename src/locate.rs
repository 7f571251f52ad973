//! Locating a named entry inside a keyed section.

use std::ops::Range;

use tracing::debug;

use crate::document::LineKind;
use crate::error::{PatchError, PatchResult};

/// Half-open line range `[start, end)` owned by one key at a fixed depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Index of the key line.
    pub start: usize,
    /// Index of the next line at the same or a lower depth, or document length.
    pub end: usize,
    /// Index after the last content line of the block. Trailing blank and
    /// comment lines belong to whatever follows.
    pub content_end: usize,
    /// Depth of the key line.
    pub depth: usize,
}

impl Block {
    /// Full line range of the block.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Lines after the key line.
    #[inline]
    pub fn body(&self) -> Range<usize> {
        self.start + 1..self.end
    }

    /// True if `index` falls inside the block.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }
}

/// Result of looking for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The entry exists.
    Found(Block),
    /// The section exists but has no entry with that name.
    EntryMissing { section: Block },
    /// No top-level key with the section name.
    SectionMissing,
}

/// Compute the block of the key line at `start`, which sits at `depth`.
///
/// Scanning stops at `limit`, which must not exceed `kinds.len()`.
pub fn extent(kinds: &[LineKind], start: usize, depth: usize, limit: usize) -> Block {
    let mut end = limit;
    let mut content_end = start + 1;
    for (i, kind) in kinds.iter().enumerate().take(limit).skip(start + 1) {
        match kind.depth() {
            Some(d) if d <= depth => {
                end = i;
                break;
            }
            Some(_) => content_end = i + 1,
            None => {}
        }
    }
    Block {
        start,
        end,
        content_end,
        depth,
    }
}

/// Find entry `name` under top-level `section`.
///
/// A missing section or entry is not an error: deciding whether to synthesize
/// belongs to the caller. A section that is not a plain mapping of entries,
/// has no entries at all, or repeats a key is [`PatchError::MalformedDocument`].
pub fn locate(kinds: &[LineKind], section: &str, name: &str) -> PatchResult<Location> {
    let mut header = None;
    for (i, kind) in kinds.iter().enumerate() {
        let Some((key, value)) = kind.key_at(0) else {
            continue;
        };
        if key != section {
            continue;
        }
        if header.is_some() {
            return Err(PatchError::malformed(
                i + 1,
                format!("section `{}` appears twice", section),
            ));
        }
        if value.is_some() {
            return Err(PatchError::malformed(
                i + 1,
                format!("section `{}` has an inline value", section),
            ));
        }
        header = Some(i);
    }

    let Some(header) = header else {
        debug!(section, "section not found");
        return Ok(Location::SectionMissing);
    };
    let section_block = extent(kinds, header, 0, kinds.len());

    let mut entries = 0usize;
    let mut found = None;
    for i in section_block.body() {
        match &kinds[i] {
            LineKind::EntryHeader { key, .. } => {
                entries += 1;
                if key == name {
                    if found.is_some() {
                        return Err(PatchError::malformed(
                            i + 1,
                            format!("entry `{}` appears twice", name),
                        ));
                    }
                    found = Some(i);
                }
            }
            kind if kind.depth() == Some(1) => {
                return Err(PatchError::malformed(
                    i + 1,
                    format!("section `{}` is not a mapping of entries", section),
                ));
            }
            kind if kind.is_content() && entries == 0 => {
                return Err(PatchError::malformed(
                    i + 1,
                    format!("line is nested under `{}` but belongs to no entry", section),
                ));
            }
            _ => {}
        }
    }

    if entries == 0 {
        return Err(PatchError::malformed(
            header + 1,
            format!("section `{}` has no entries", section),
        ));
    }

    match found {
        Some(start) => {
            let block = extent(kinds, start, 1, section_block.end);
            debug!(entry = name, start = block.start, end = block.end, "entry located");
            Ok(Location::Found(block))
        }
        None => {
            debug!(entry = name, "entry not found in section");
            Ok(Location::EntryMissing {
                section: section_block,
            })
        }
    }
}
