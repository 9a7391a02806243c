// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::{
    commands::{Handle, HandledResult},
    config::{Config, DesiredState},
    rule::RuleKind,
};

pub fn validate(config: &Config) -> HandledResult<()> {
    config
        .validate()
        .handle_err(|e| eprintln!("Invalid config: {e}"))?;

    print_summary(config);
    Ok(())
}

fn print_summary(config: &Config) {
    println!("Commands run as: {}", config.context.base_command().join(" "));
    println!("{} rule(s):", config.rules.len());

    for rule in config.rules.iter() {
        match rule.desired_state() {
            Ok(DesiredState::Absent(name)) => println!("  {name}: absent"),
            Ok(DesiredState::Present(desired)) => match &desired.kind {
                RuleKind::Replicated(spec) => println!("  {}: replicated {spec}", desired.name),
                RuleKind::Erasure { profile } => println!(
                    "  {}: erasure profile={}",
                    desired.name,
                    profile.as_deref().unwrap_or("<default>")
                ),
            },
            Err(e) => println!("  {}: invalid: {e}", rule.name),
        }
    }
}
