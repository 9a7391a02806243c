// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod apply;
pub mod info;
pub mod present;
pub mod validate;

use {
    apply::ApplyArgs,
    info::InfoArgs,
    present::{AbsentArgs, PresentArgs},
};

use std::path::Path;

use {
    chrono::{DateTime, Local},
    clap::{Parser, Subcommand},
    log::debug,
};

use crate::{
    config::Config,
    context::{ExecutionContext, Launcher},
    exec::HostExecutor,
    reconciler::{Outcome, ReconcileError, Reconciler},
    report::RunReport,
};

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must return a nonzero exit status when it gets a `HandledError`.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to stderr.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub fn handled_error() -> HandledResult<()> {
    HandledResult::Err(HandledError {})
}

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult`, so that transitive callers of this function know that they
    /// do not need to do anything further to handle the error.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file holding the execution context and the rules for `apply`.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Identifier (FSID) of the Ceph cluster to interact with.
    #[arg(long, global = true)]
    pub fsid: Option<String>,

    /// The Ceph container image to use.
    #[arg(long, global = true)]
    pub image: Option<String>,

    /// Path to the cephadm binary.
    #[arg(long, global = true)]
    pub cephadm: Option<String>,

    /// Run ceph and crushtool from the host instead of inside `cephadm shell`.
    #[arg(long, global = true)]
    pub direct: bool,

    /// Only report what would change; run no command that modifies the cluster.
    #[arg(long, global = true)]
    pub check: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a rule, or update a replicated rule's root, device class and failure domain.
    Present(PresentArgs),
    /// Remove a rule.
    Absent(AbsentArgs),
    /// Dump one rule, or all of them.
    Info(InfoArgs),
    /// Enforce every rule listed in the config file.
    Apply(ApplyArgs),
    /// Check the config file and print a summary.
    Validate,
}

/// Load the config file. An explicit `--config` must exist; the default location is optional
/// unless `required` is set.
pub fn load_config(cli: &Cli, required: bool) -> HandledResult<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            let path = crate::default_config_path();
            if !required && !Path::new(&path).exists() {
                debug!("no config file at '{path}'; using defaults");
                return Ok(Config::default());
            }
            path
        }
    };

    Config::from_file(&path).handle_err(|e| eprintln!("{e}"))
}

/// Combine the config file's context with command line overrides.
pub fn execution_context(cli: &Cli, config: &Config) -> ExecutionContext {
    let mut context = config.context.clone();
    if cli.direct {
        context.launcher = Launcher::Direct;
    }
    if let Some(path) = &cli.cephadm {
        context.cephadm = path.clone();
    } else if context.cephadm == ExecutionContext::default().cephadm {
        context.cephadm = crate::default_cephadm();
    }
    if let Some(fsid) = &cli.fsid {
        context.fsid = Some(fsid.clone());
    }
    if let Some(image) = &cli.image {
        context.image = Some(image.clone());
    }
    context
}

fn reconciler(cli: &Cli, config: &Config) -> Reconciler {
    let context = execution_context(cli, config);
    if cli.verbose {
        eprintln!("Launching commands as: {:?}", context.base_command());
    }
    Reconciler::new(HostExecutor::new().as_executor(), context).with_check_mode(cli.check)
}

/// Print the result of reconciling `name` and turn a failure into a `HandledError`.
pub fn report_outcome(
    name: &str,
    result: Result<Outcome, ReconcileError>,
    start: DateTime<Local>,
) -> HandledResult<()> {
    match result {
        Ok(outcome) => {
            let changed = outcome.changed();
            RunReport::finish(Some(name), changed, outcome.record, outcome.message, start).emit();
            Ok(())
        }
        Err(e) => {
            eprintln!("crush rule {name}: {e}");
            let record = e.record().unwrap_or_default();
            let mut report = RunReport::finish(Some(name), false, record, Some(e.to_string()), start);
            if report.rc == 0 {
                report.rc = 1;
            }
            report.emit();
            handled_error()
        }
    }
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    let Some(command) = &cli.command else {
        eprintln!("No command given; see --help.");
        return handled_error();
    };

    match command {
        Commands::Present(args) => {
            let config = load_config(cli, false)?;
            present::present(&reconciler(cli, &config), args)
        }
        Commands::Absent(args) => {
            let config = load_config(cli, false)?;
            present::absent(&reconciler(cli, &config), args)
        }
        Commands::Info(args) => {
            let config = load_config(cli, false)?;
            info::info(&reconciler(cli, &config), args)
        }
        Commands::Apply(args) => {
            let config = load_config(cli, true)?;
            apply::apply(&reconciler(cli, &config), &config, args)
        }
        Commands::Validate => validate::validate(&load_config(cli, true)?),
    }
}
