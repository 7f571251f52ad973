//! compose-patch CLI: ensure a compose service carries its required declarations.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use compose_patch::{Declaration, PatchConfig};

mod report;

/// Ensure a docker-compose service carries its env-file and bind mounts
#[derive(Debug, Parser)]
#[command(name = "compose-patch")]
#[command(about = "Line-preserving patcher for docker-compose services", long_about = None)]
#[command(version)]
struct Cli {
    /// Compose file to patch (created if missing)
    #[arg(default_value = "docker-compose.yml")]
    file: PathBuf,

    /// Service entry to patch (overrides the config file)
    #[arg(short, long)]
    entry: Option<String>,

    /// Top-level section holding the entries
    #[arg(long)]
    section: Option<String>,

    /// JSON file with a full PatchConfig
    #[arg(long)]
    config: Option<PathBuf>,

    /// Additional env-file reference
    #[arg(long)]
    env_file: Option<String>,

    /// Additional bind mount, e.g. ./logs:/app/logs
    #[arg(short, long = "mount")]
    mounts: Vec<String>,

    /// Start without the standard env-file and mount declarations
    #[arg(long)]
    no_defaults: bool,

    /// Print the resulting document instead of writing it
    #[arg(long)]
    dry_run: bool,

    /// Print a JSON report
    #[arg(long)]
    json: bool,

    /// Quiet mode: exit code only, no output
    #[arg(short, long)]
    quiet: bool,

    /// Force color output even when not a TTY
    #[arg(short = 'C', long = "color")]
    color: bool,

    /// Disable color output
    #[arg(short = 'M', long = "no-color")]
    no_color: bool,
}

/// Build the effective config: file or defaults first, then flag overrides.
fn resolve_config(cli: &Cli) -> Result<PatchConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<PatchConfig>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => {
            let Some(entry) = &cli.entry else {
                bail!("no entry given: pass --entry or --config");
            };
            if cli.no_defaults {
                PatchConfig::new(entry.as_str())
            } else {
                PatchConfig::compose_defaults(entry.as_str())
            }
        }
    };

    if let Some(entry) = &cli.entry {
        config = config.with_entry(entry.as_str());
    }
    if let Some(section) = &cli.section {
        config = config.with_section(section.as_str());
    }
    if let Some(env_file) = &cli.env_file {
        config = config.with_declaration(Declaration::env_file(env_file.as_str()));
    }
    for mount in &cli.mounts {
        config = config.with_declaration(Declaration::list_item("volumes", mount.as_str()));
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    let config = resolve_config(&cli)?;
    let use_color = if cli.no_color {
        false
    } else if cli.color {
        true
    } else {
        atty::is(atty::Stream::Stderr)
    };
    let printer = report::Printer::new(use_color, cli.quiet, cli.json);

    if cli.dry_run {
        return match compose_patch::plan(&cli.file, &config) {
            Ok(plan) => {
                print!("{}", plan.rendered);
                printer.planned(&cli.file, &plan);
                Ok(report::exit_codes::SUCCESS)
            }
            Err(err) => {
                printer.aborted(&cli.file, &err);
                Ok(report::exit_code(&err))
            }
        };
    }

    let outcome = compose_patch::patch(&cli.file, &config);
    printer.outcome(&cli.file, &outcome);
    Ok(match &outcome {
        compose_patch::PatchOutcome::Aborted(err) => report::exit_code(err),
        _ => report::exit_codes::SUCCESS,
    })
}

fn main() -> Result<()> {
    // RUST_LOG=compose_patch=debug shows located blocks and planned insertions.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = run(cli)?;
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("compose-patch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_with_entry() {
        let config = resolve_config(&parse(&["--entry", "bot"])).unwrap();
        assert_eq!(config, PatchConfig::compose_defaults("bot"));
    }

    #[test]
    fn test_entry_is_required() {
        assert!(resolve_config(&parse(&["compose.yml"])).is_err());
    }

    #[test]
    fn test_extra_mounts_and_env_file() {
        let cli = parse(&[
            "--entry",
            "bot",
            "--no-defaults",
            "--env-file",
            ".env.local",
            "-m",
            "./logs:/app/logs",
            "--mount",
            "./cache:/app/cache",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(
            config.declarations,
            vec![
                Declaration::env_file(".env.local"),
                Declaration::list_item("volumes", "./logs:/app/logs"),
                Declaration::list_item("volumes", "./cache:/app/cache"),
            ]
        );
        assert!(config.template.is_empty());
    }

    #[test]
    fn test_config_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.json");
        fs::write(
            &path,
            r#"{
                "section": "services",
                "entry": "bot",
                "declarations": [
                    { "key": "env_file", "kind": { "list_item": ".env" } },
                    { "key": "restart", "kind": { "scalar": "always" } }
                ]
            }"#,
        )
        .unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "--entry", "worker"]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.entry, "worker");
        assert_eq!(
            config.declarations,
            vec![
                Declaration::env_file(".env"),
                Declaration::scalar("restart", "always"),
            ]
        );
        // Fields missing from the file fall back to the defaults.
        assert_eq!(config.key_order, PatchConfig::default().key_order);
    }

    #[test]
    fn test_invalid_mount_rejected() {
        let cli = parse(&["--entry", "bot", "--mount", " "]);
        assert!(resolve_config(&cli).is_err());
    }
}
