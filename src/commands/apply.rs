// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use {chrono::Local, clap::Args, log::warn};

use crate::{
    commands::*,
    config::{Config, DesiredState},
    reconciler::Reconciler,
};

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Only apply the rules with these names.
    #[arg(short, long)]
    rule: Vec<String>,
}

/// Reconcile every rule in the config file, one after another. A failing or invalid rule does
/// not stop the rest from being applied, but makes the whole command fail.
pub fn apply(reconciler: &Reconciler, config: &Config, args: &ApplyArgs) -> HandledResult<()> {
    for name in args.rule.iter() {
        if !config.rules.iter().any(|r| &r.name == name) {
            warn!("rule {name} was requested but is not in the config file");
        }
    }

    let mut error_seen = false;

    for rule in config.rules.iter() {
        if !args.rule.is_empty() && !args.rule.contains(&rule.name) {
            continue;
        }

        let start = Local::now();
        let result = match rule.desired_state() {
            Ok(DesiredState::Present(desired)) => reconciler.ensure_present(&desired),
            Ok(DesiredState::Absent(name)) => reconciler.ensure_absent(&name),
            Err(e) => {
                eprintln!("Invalid config: {e}");
                error_seen = true;
                continue;
            }
        };

        if report_outcome(&rule.name, result, start).is_err() {
            error_seen = true;
        }
    }

    if error_seen {
        return handled_error();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::ExecutionContext,
        exec::{FakeExecutor, Output},
    };

    const CONFIG: &str = r#"
[[rules]]
name = "broken"
rule_type = "replicated"

[[rules]]
name = "old"
state = "absent"
"#;

    #[test]
    fn invalid_rule_does_not_stop_the_others() {
        let fake = FakeExecutor::new();
        fake.set_handler(Box::new(|_args: &[String]| Output::failure(2, "ENOENT")));
        let reconciler = Reconciler::new(
            std::sync::Arc::clone(&fake).as_executor(),
            ExecutionContext::direct(),
        );
        let config = Config::from_toml(CONFIG).unwrap();

        let result = apply(&reconciler, &config, &ApplyArgs { rule: Vec::new() });

        assert_eq!(result, handled_error());
        let calls = fake.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].join(" "), "ceph osd crush rule dump old --format=json");
    }
}
