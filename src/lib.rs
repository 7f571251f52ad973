//! # compose-patch
//!
//! Line-preserving patcher for docker-compose service declarations.
//!
//! Given a compose file and a service name, this crate makes sure the service
//! carries its mandatory declarations (an `env_file` reference and bind mounts)
//! without reformatting anything else in the file. Hand-written comments,
//! ordering and spacing survive; only the missing lines are spliced in.
//!
//! ## Module Organization
//!
//! - [`document`] - Line model and structural classification
//! - [`locate`] - Finding an entry's line range inside a section
//! - [`probe`] - Testing which declarations an entry lacks
//! - [`insert`] - Planning and splicing the missing lines
//! - [`synth`] - Generating documents and entries from configuration
//! - [`commit`] - Backups and atomic replacement
//! - [`patch`](mod@patch) - The full invocation
//!
//! ## Quick Start
//!
//! ```
//! use compose_patch::{plan_text, Action, PatchConfig};
//!
//! let config = PatchConfig::compose_defaults("app");
//! let source = b"services:\n  app:\n    build: .\n";
//!
//! let plan = plan_text(Some(source.as_slice()), &config).unwrap();
//! assert_eq!(plan.action, Action::Patch { added: 3 });
//! assert!(plan.rendered.contains("    env_file:\n      - .env\n"));
//!
//! // Planning the result again finds nothing to do.
//! let again = plan_text(Some(plan.rendered.as_bytes()), &config).unwrap();
//! assert_eq!(again.action, Action::Unchanged);
//! ```
//!
//! ## Supported subset
//!
//! Two-space indentation, top-level section keys, entries at depth 1,
//! declarations at depth 2 and list items at depth 3. Tabs, odd indentation,
//! flow collections, anchors, tags, block scalars and multi-document streams
//! are rejected with [`PatchError::MalformedDocument`] and the file is left
//! untouched.
//!
//! ## Features
//!
//! - `serde` - Serialization/deserialization of [`PatchConfig`]
//! - `cli` - The `compose-patch` binary

// =============================================================================
// Core modules
// =============================================================================

/// Line-oriented document model.
pub mod document;

/// Error types.
pub mod error;

/// Patch configuration and declarations.
pub mod config;

// =============================================================================
// Pipeline stages
// =============================================================================

/// Locating entries.
pub mod locate;

/// Declaration presence tests.
pub mod probe;

/// Line-preserving insertion.
pub mod insert;

/// Fallback synthesis.
pub mod synth;

/// Backup and atomic commit.
pub mod commit;

/// The patch invocation.
pub mod patch;

// =============================================================================
// Public re-exports
// =============================================================================

pub use config::{Declaration, DeclarationKind, PatchConfig, COMPOSE_KEY_ORDER, DEFAULT_ENV_FILE};
pub use document::{Document, Line, LineKind, Terminator};
pub use error::{PatchError, PatchResult};
pub use locate::{locate, Block, Location};
pub use patch::{patch, plan, plan_text, Action, PatchOutcome, Plan};
pub use probe::probe;
pub use synth::Synthesis;
