// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use crushrule_lib::commands::{self, Cli};

/// The crush_rule binary creates, updates, removes and inspects CRUSH rules.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("CRUSH_RULE_LOG", "warn"))
        .init();

    let args = Cli::parse();

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
