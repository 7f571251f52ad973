//! The patch invocation: load, locate, probe, insert or synthesize, commit.
//!
//! ```text
//! Start -> Loaded -> Found   -> Probed -> Inserted    -> Committed
//!                 -> Missing -> Synthesized            -> Committed
//!                 -> Malformed                         -> Unchanged
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::commit::{commit, Commit};
use crate::config::PatchConfig;
use crate::document::{classify, read_source, Document, LineKind};
use crate::error::{PatchError, PatchResult};
use crate::insert::{self, Insertion};
use crate::locate::{locate, Location};
use crate::probe::probe;
use crate::synth::{self, Synthesis};

/// What a plan will do to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Every declaration is already present.
    Unchanged,
    /// Declarations were added to an existing entry.
    Patch { added: usize },
    /// Some or all of the document was generated.
    Synthesize(Synthesis),
}

/// A computed but not yet persisted patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub action: Action,
    /// The document as it will be written. For [`Action::Unchanged`] this is
    /// the loaded document, which may differ from the file's bytes only where
    /// invalid UTF-8 was substituted.
    pub rendered: String,
    /// The source held invalid UTF-8, replaced by U+FFFD in `rendered`.
    pub lossy: bool,
}

/// Final state of one [`patch`] call.
#[derive(Debug)]
pub enum PatchOutcome {
    /// Missing declarations were inserted into the existing entry.
    Patched {
        backup: Option<PathBuf>,
        added: usize,
    },
    /// The file already satisfied every declaration; nothing was written.
    NoChange,
    /// A document, section or entry was generated.
    Synthesized {
        synthesis: Synthesis,
        backup: Option<PathBuf>,
    },
    /// Nothing was written.
    Aborted(PatchError),
}

impl PatchOutcome {
    /// Short machine-friendly name of the outcome.
    pub fn name(&self) -> &'static str {
        match self {
            PatchOutcome::Patched { .. } => "patched",
            PatchOutcome::NoChange => "no-change",
            PatchOutcome::Synthesized { .. } => "synthesized",
            PatchOutcome::Aborted(_) => "aborted",
        }
    }

    /// True unless the run aborted.
    pub fn is_success(&self) -> bool {
        !matches!(self, PatchOutcome::Aborted(_))
    }

    /// Backup taken by this run, if any.
    pub fn backup(&self) -> Option<&Path> {
        match self {
            PatchOutcome::Patched { backup, .. } | PatchOutcome::Synthesized { backup, .. } => {
                backup.as_deref()
            }
            _ => None,
        }
    }
}

/// Plan a patch of `source`, the document's bytes or `None` if it is absent.
pub fn plan_text(source: Option<&[u8]>, config: &PatchConfig) -> PatchResult<Plan> {
    config.validate()?;

    let Some(bytes) = source else {
        debug!("document absent, synthesizing");
        return Ok(synthesized(Synthesis::Document, synth::synthesize_document(config)));
    };

    let doc = Document::from_bytes(bytes);
    let lossy = std::str::from_utf8(bytes).is_err();
    let kinds = classify(&doc)?;
    if doc.is_empty_content() {
        debug!("document has no content, synthesizing");
        return Ok(synthesized(Synthesis::Document, synth::synthesize_document(config)));
    }

    let (action, insertions) = match locate(&kinds, &config.section, &config.entry)? {
        Location::SectionMissing => {
            let mut lines = Vec::new();
            if kinds.last().map_or(false, |k| *k != LineKind::Blank) {
                lines.push(String::new());
            }
            lines.extend(synth::section_lines(config));
            let insertion = Insertion {
                at: doc.len(),
                lines,
                added: config.declarations.len(),
            };
            (Action::Synthesize(Synthesis::Section), vec![insertion])
        }
        Location::EntryMissing { section } => {
            let insertion = Insertion {
                at: section.content_end,
                lines: synth::entry_lines(config, section.depth + 1),
                added: config.declarations.len(),
            };
            (Action::Synthesize(Synthesis::Entry), vec![insertion])
        }
        Location::Found(block) => {
            let missing = probe(&kinds, &block, &config.declarations);
            if missing.is_empty() {
                debug!(entry = %config.entry, "all declarations present");
                return Ok(Plan {
                    action: Action::Unchanged,
                    rendered: doc.render(),
                    lossy,
                });
            }
            debug!(entry = %config.entry, missing = missing.len(), "declarations missing");
            let insertions = insert::plan(&kinds, &block, &missing, &config.key_order)?;
            let added = insertions.iter().map(|i| i.added).sum();
            (Action::Patch { added }, insertions)
        }
    };

    let patched = insert::apply(&doc, &insertions);
    verify(&patched, config)?;
    Ok(Plan {
        action,
        rendered: patched.render(),
        lossy,
    })
}

fn synthesized(synthesis: Synthesis, rendered: String) -> Plan {
    Plan {
        action: Action::Synthesize(synthesis),
        rendered,
        lossy: false,
    }
}

/// Re-read an edited document and confirm the entry is now complete.
fn verify(doc: &Document, config: &PatchConfig) -> PatchResult<()> {
    let kinds = classify(doc)?;
    let incomplete = match locate(&kinds, &config.section, &config.entry)? {
        Location::Found(block) => {
            if probe(&kinds, &block, &config.declarations).is_empty() {
                return Ok(());
            }
            block.start + 1
        }
        _ => 0,
    };
    Err(PatchError::ambiguous(
        incomplete,
        format!("entry `{}` is still incomplete after editing", config.entry),
    ))
}

/// Plan a patch of the file at `path` without writing anything.
pub fn plan(path: &Path, config: &PatchConfig) -> PatchResult<Plan> {
    plan_text(read(path)?.as_deref(), config)
}

fn read(path: &Path) -> PatchResult<Option<Vec<u8>>> {
    read_source(path).map_err(|source| PatchError::ReadFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Make sure entry `config.entry` in the file at `path` carries every
/// configured declaration.
///
/// The file is either left untouched or replaced atomically after a backup.
pub fn patch(path: &Path, config: &PatchConfig) -> PatchOutcome {
    match try_patch(path, config) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "patch aborted, file left untouched");
            PatchOutcome::Aborted(err)
        }
    }
}

fn try_patch(path: &Path, config: &PatchConfig) -> PatchResult<PatchOutcome> {
    let source = read(path)?;
    let plan = plan_text(source.as_deref(), config)?;

    if plan.action == Action::Unchanged {
        info!(path = %path.display(), "no change needed");
        return Ok(PatchOutcome::NoChange);
    }

    let outcome = match commit(path, source.as_deref(), plan.rendered.as_bytes())? {
        Commit::Unchanged => PatchOutcome::NoChange,
        Commit::Written { backup } => {
            if plan.lossy {
                warn!(
                    path = %path.display(),
                    backup = ?backup,
                    "invalid UTF-8 was written back as U+FFFD; the backup holds the original bytes"
                );
            }
            match plan.action {
                Action::Synthesize(synthesis) => PatchOutcome::Synthesized { synthesis, backup },
                Action::Patch { added } => PatchOutcome::Patched { backup, added },
                Action::Unchanged => PatchOutcome::NoChange,
            }
        }
    };
    info!(path = %path.display(), outcome = outcome.name(), "patch finished");
    Ok(outcome)
}
