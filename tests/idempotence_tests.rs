//! Property tests: patching generated service blocks.

use compose_patch::{plan_text, Action, PatchConfig};
use proptest::prelude::*;
use proptest::sample::subsequence;

/// One key of the `app` entry, as lines at depth 2 and below.
fn entry_keys() -> impl Strategy<Value = Vec<Vec<String>>> {
    let env = subsequence(vec![".env", "common.env"], 1..=2);
    let volumes = subsequence(
        vec!["./config:/app/config:ro", "./data:/app/data", "./logs:/app/logs"],
        1..=3,
    );
    let ports = subsequence(vec!["\"8080:80\"", "\"443:443\""], 1..=2);

    (env, volumes, ports, any::<[bool; 8]>()).prop_flat_map(|(env, volumes, ports, flags)| {
        let list = |key: &str, items: &[&str]| {
            let mut lines = vec![format!("    {}:", key)];
            lines.extend(items.iter().map(|item| format!("      - {}", item)));
            lines
        };

        let mut keys: Vec<Vec<String>> = Vec::new();
        if flags[0] {
            keys.push(vec!["    image: ghcr.io/acme/app:1.4".to_string()]);
        }
        if flags[1] {
            keys.push(vec!["    build: .".to_string()]);
        }
        if flags[2] {
            keys.push(vec!["    restart: always   # keep running".to_string()]);
        }
        if flags[3] {
            keys.push(list("env_file", env.as_slice()));
        }
        if flags[4] {
            keys.push(list("volumes", volumes.as_slice()));
        }
        if flags[5] {
            keys.push(list("ports", ports.as_slice()));
        }
        if flags[6] {
            keys.push(vec![
                "    environment:".to_string(),
                "      TZ: UTC".to_string(),
                "      LOG_LEVEL: info".to_string(),
            ]);
        }
        if flags[7] {
            if let Some(first) = keys.first_mut() {
                first.insert(0, "    # hand-maintained".to_string());
            }
        }
        Just(keys).prop_shuffle()
    })
}

fn compose_document() -> impl Strategy<Value = String> {
    (entry_keys(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(keys, db_first, spaced, trailing_section)| {
            let mut lines = vec!["services:".to_string()];
            let db = ["  db:", "    image: postgres:16"];
            if db_first {
                lines.extend(db.iter().map(|l| l.to_string()));
            }
            lines.push("  app:".to_string());
            for key in keys {
                lines.extend(key);
                if spaced {
                    lines.push(String::new());
                }
            }
            if !db_first {
                lines.extend(db.iter().map(|l| l.to_string()));
            }
            if trailing_section {
                lines.push(String::new());
                lines.push("volumes:".to_string());
                lines.push("  pgdata:".to_string());
            }
            let mut text = lines.join("\n");
            text.push('\n');
            text
        },
    )
}

/// True if `needle` lines appear in `haystack` in the same order.
fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut rest = haystack.lines();
    needle.lines().all(|line| rest.any(|candidate| candidate == line))
}

proptest! {
    #[test]
    fn patch_is_idempotent(source in compose_document()) {
        let config = PatchConfig::compose_defaults("app");

        let first = plan_text(Some(source.as_bytes()), &config).unwrap();
        prop_assert!(matches!(first.action, Action::Patch { .. } | Action::Unchanged), "unexpected first action: {:?}", first.action);

        let second = plan_text(Some(first.rendered.as_bytes()), &config).unwrap();
        prop_assert_eq!(second.action, Action::Unchanged);
        prop_assert_eq!(&second.rendered, &first.rendered);
    }

    #[test]
    fn patch_preserves_existing_lines(source in compose_document()) {
        let config = PatchConfig::compose_defaults("app");
        let plan = plan_text(Some(source.as_bytes()), &config).unwrap();

        prop_assert!(is_subsequence(&source, &plan.rendered));
        prop_assert!(plan.rendered.lines().count() >= source.lines().count());
    }

    #[test]
    fn patch_adds_only_what_is_missing(source in compose_document()) {
        let config = PatchConfig::compose_defaults("app");
        let plan = plan_text(Some(source.as_bytes()), &config).unwrap();

        for item in ["- .env", "- ./config:/app/config:ro", "- ./data:/app/data"] {
            prop_assert_eq!(plan.rendered.matches(item).count(), 1, "{}", item);
        }
    }
}
