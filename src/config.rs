//! Configuration for a patch run.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PatchError, PatchResult};

/// Depth of declarations inside an entry (`services` > `app` > `volumes`).
pub const DECLARATION_DEPTH: usize = 2;

/// Relative path of the secrets file referenced by `env_file`.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Canonical ordering of compose service keys.
///
/// A new key is placed before the first existing sibling that comes after it
/// in this list. Keys not listed are never used as anchors.
pub const COMPOSE_KEY_ORDER: &[&str] = &[
    "image",
    "build",
    "container_name",
    "hostname",
    "restart",
    "user",
    "working_dir",
    "depends_on",
    "env_file",
    "environment",
    "volumes",
    "ports",
    "expose",
    "networks",
    "extra_hosts",
    "command",
    "entrypoint",
    "healthcheck",
    "logging",
    "labels",
];

/// What a declaration requires under its key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeclarationKind {
    /// `- value` listed under `key:`.
    ListItem(String),
    /// `key: value`. Any existing value for the key satisfies it.
    Scalar(String),
}

/// A required sub-entry of a service: `(key, depth, kind)`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Declaration {
    pub key: String,
    #[cfg_attr(feature = "serde", serde(default = "default_depth"))]
    pub depth: usize,
    pub kind: DeclarationKind,
}

#[cfg(feature = "serde")]
fn default_depth() -> usize {
    DECLARATION_DEPTH
}

impl Declaration {
    /// A `- value` item under `key:`.
    pub fn list_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            depth: DECLARATION_DEPTH,
            kind: DeclarationKind::ListItem(value.into()),
        }
    }

    /// A `key: value` scalar.
    pub fn scalar(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            depth: DECLARATION_DEPTH,
            kind: DeclarationKind::Scalar(value.into()),
        }
    }

    /// `env_file` reference to `path`.
    pub fn env_file(path: impl Into<String>) -> Self {
        Self::list_item("env_file", path)
    }

    /// `volumes` bind-mount of `host` at `container`.
    pub fn bind_mount(host: &str, container: &str, read_only: bool) -> Self {
        let mut mount = format!("{}:{}", host, container);
        if read_only {
            mount.push_str(":ro");
        }
        Self::list_item("volumes", mount)
    }

    /// The required value, item or scalar.
    pub fn value(&self) -> &str {
        match &self.kind {
            DeclarationKind::ListItem(v) | DeclarationKind::Scalar(v) => v,
        }
    }

    /// True for list-item declarations.
    #[inline]
    pub fn is_list_item(&self) -> bool {
        matches!(self.kind, DeclarationKind::ListItem(_))
    }
}

/// Everything one invocation of [`patch`](crate::patch) needs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PatchConfig {
    /// Top-level section holding the entries (default: `services`).
    pub section: String,
    /// Name of the entry to patch.
    pub entry: String,
    /// Required declarations, in the order they should be added.
    pub declarations: Vec<Declaration>,
    /// Canonical key order used to place new keys.
    pub key_order: Vec<String>,
    /// Scalar fields written only when an entry is synthesized.
    pub template: Vec<Declaration>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self::compose_defaults("app")
    }
}

impl PatchConfig {
    /// A config for `entry` with no declarations and no template.
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            section: "services".to_string(),
            entry: entry.into(),
            declarations: Vec::new(),
            key_order: COMPOSE_KEY_ORDER.iter().map(|k| k.to_string()).collect(),
            template: Vec::new(),
        }
    }

    /// The installer's standard declarations: the secrets env-file, a read-only
    /// config mount and a read-write data mount. Synthesized entries also get
    /// `build: .` and `restart: unless-stopped`.
    pub fn compose_defaults(entry: impl Into<String>) -> Self {
        Self::new(entry)
            .with_declaration(Declaration::env_file(DEFAULT_ENV_FILE))
            .with_declaration(Declaration::bind_mount("./config", "/app/config", true))
            .with_declaration(Declaration::bind_mount("./data", "/app/data", false))
            .with_template(Declaration::scalar("build", "."))
            .with_template(Declaration::scalar("restart", "unless-stopped"))
    }

    /// Set the section key.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Set the entry name.
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Append a declaration unless an equal one is already present.
    pub fn with_declaration(mut self, declaration: Declaration) -> Self {
        if !self.declarations.contains(&declaration) {
            self.declarations.push(declaration);
        }
        self
    }

    /// Append a synthesis-only template field.
    pub fn with_template(mut self, field: Declaration) -> Self {
        if !self.template.contains(&field) {
            self.template.push(field);
        }
        self
    }

    /// Replace the canonical key order.
    pub fn with_key_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Check the config before touching any file.
    pub fn validate(&self) -> PatchResult<()> {
        check_name("section", &self.section)?;
        check_name("entry", &self.entry)?;

        for decl in self.declarations.iter().chain(&self.template) {
            check_name("declaration key", &decl.key)?;
            if decl.depth != DECLARATION_DEPTH {
                return Err(invalid(format!(
                    "declaration `{}` has depth {}, only {} is supported",
                    decl.key, decl.depth, DECLARATION_DEPTH
                )));
            }
            let value = decl.value();
            if value.trim().is_empty() || value.trim() != value || value.contains('\n') {
                return Err(invalid(format!(
                    "declaration `{}` has an unusable value {:?}",
                    decl.key, value
                )));
            }
        }

        for decl in &self.declarations {
            let mixed = self
                .declarations
                .iter()
                .any(|other| other.key == decl.key && other.is_list_item() != decl.is_list_item());
            if mixed {
                return Err(invalid(format!(
                    "declarations for `{}` mix list and scalar forms",
                    decl.key
                )));
            }
        }

        if self.template.iter().any(Declaration::is_list_item) {
            return Err(invalid("template fields must be scalars"));
        }
        Ok(())
    }
}

fn check_name(what: &str, name: &str) -> PatchResult<()> {
    let bad = name.is_empty()
        || name.starts_with(['-', '#', '?', '&', '*', '!', '|', '>', '[', '{'])
        || name.chars().any(|c| c.is_whitespace() || c == ':' || c == '#');
    if bad {
        return Err(invalid(format!("invalid {} name {:?}", what, name)));
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> PatchError {
    PatchError::InvalidConfig(reason.into())
}
