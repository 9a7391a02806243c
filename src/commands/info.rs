// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use {chrono::Local, clap::Args};

use crate::{commands::*, reconciler::Reconciler, report::RunReport};

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// The name of the CRUSH rule. If no value is provided, all rules are returned.
    #[arg()]
    name: Option<String>,
}

pub fn info(reconciler: &Reconciler, args: &InfoArgs) -> HandledResult<()> {
    let start = Local::now();

    let record = reconciler
        .info(args.name.as_deref())
        .handle_err(|e| eprintln!("Could not get crush rule information: {e}"))?;

    RunReport::finish(args.name.as_deref(), false, record, None, start).emit();
    Ok(())
}
