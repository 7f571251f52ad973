//! Human and JSON reporting for the CLI.

use std::path::Path;

use compose_patch::{Action, PatchError, PatchOutcome, Plan, Synthesis};
use serde_json::json;

/// Exit codes for the patch command.
pub mod exit_codes {
    /// Patched, synthesized or already complete.
    pub const SUCCESS: i32 = 0;
    /// The document could not be edited safely; file untouched.
    pub const ABORTED: i32 = 1;
    /// I/O error (permission denied, rename failed, etc.).
    pub const IO_ERROR: i32 = 2;
}

/// Exit code for an aborted run.
pub fn exit_code(err: &PatchError) -> i32 {
    match err {
        PatchError::ReadFailure { .. } | PatchError::WriteFailure { .. } => exit_codes::IO_ERROR,
        _ => exit_codes::ABORTED,
    }
}

/// ANSI color codes for status output.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const OK: &str = "\x1b[1;32m"; // Bold green
    pub const ERROR: &str = "\x1b[1;31m"; // Bold red
    pub const PATH: &str = "\x1b[1;34m"; // Bold blue
}

/// Writes one status line (or one JSON object) per run.
pub struct Printer {
    ok: &'static str,
    error: &'static str,
    path: &'static str,
    reset: &'static str,
    quiet: bool,
    json: bool,
}

impl Printer {
    pub fn new(use_color: bool, quiet: bool, json: bool) -> Self {
        let (ok, error, path, reset) = if use_color && !json {
            (colors::OK, colors::ERROR, colors::PATH, colors::RESET)
        } else {
            ("", "", "", "")
        };
        Self {
            ok,
            error,
            path,
            reset,
            quiet,
            json,
        }
    }

    /// Report the final outcome of a patch run.
    pub fn outcome(&self, file: &Path, outcome: &PatchOutcome) {
        if self.quiet {
            return;
        }
        if let PatchOutcome::Aborted(err) = outcome {
            self.aborted(file, err);
            return;
        }

        if self.json {
            let mut report = json!({
                "file": file.display().to_string(),
                "outcome": outcome.name(),
                "backup": outcome.backup().map(|b| b.display().to_string()),
            });
            match outcome {
                PatchOutcome::Patched { added, .. } => report["added"] = json!(added),
                PatchOutcome::Synthesized { synthesis, .. } => {
                    report["synthesized"] = json!(synthesis_name(*synthesis))
                }
                _ => {}
            }
            println!("{}", report);
            return;
        }

        let detail = match outcome {
            PatchOutcome::Patched { added, .. } => format!("added {} declaration(s)", added),
            PatchOutcome::NoChange => "already complete".to_string(),
            PatchOutcome::Synthesized { synthesis, .. } => {
                format!("synthesized {}", synthesis_name(*synthesis))
            }
            PatchOutcome::Aborted(_) => return,
        };
        eprintln!(
            "{}{}{}: {}{}{} ({})",
            self.path,
            file.display(),
            self.reset,
            self.ok,
            outcome.name(),
            self.reset,
            detail
        );
        if let Some(backup) = outcome.backup() {
            eprintln!("  backup: {}", backup.display());
        }
    }

    /// Report a dry run. Stdout carries the document, so this goes to stderr.
    pub fn planned(&self, file: &Path, plan: &Plan) {
        if self.quiet {
            return;
        }
        let action = match plan.action {
            Action::Unchanged => "no-change".to_string(),
            Action::Patch { added } => format!("would add {} declaration(s)", added),
            Action::Synthesize(synthesis) => format!("would synthesize {}", synthesis_name(synthesis)),
        };
        if self.json {
            eprintln!(
                "{}",
                json!({ "file": file.display().to_string(), "dry_run": true, "plan": action })
            );
        } else {
            eprintln!("{}{}{}: {}", self.path, file.display(), self.reset, action);
        }
    }

    /// Report an abort. The file was not modified.
    pub fn aborted(&self, file: &Path, err: &PatchError) {
        if self.quiet {
            return;
        }
        if self.json {
            println!(
                "{}",
                json!({
                    "file": file.display().to_string(),
                    "outcome": "aborted",
                    "error": err.kind(),
                    "message": err.to_string(),
                })
            );
        } else {
            eprintln!(
                "{}{}{}: {}aborted{}: {} (file left untouched)",
                self.path,
                file.display(),
                self.reset,
                self.error,
                self.reset,
                err
            );
        }
    }
}

fn synthesis_name(synthesis: Synthesis) -> &'static str {
    match synthesis {
        Synthesis::Document => "document",
        Synthesis::Section => "section",
        Synthesis::Entry => "entry",
    }
}
