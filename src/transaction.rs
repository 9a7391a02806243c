// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! transaction.rs
//!
//! Round-trips the cluster's CRUSH map through its text form in order to change a replicated
//! rule: dump the binary map, decompile it, patch the text, compile it again and install it. Each
//! step has to succeed before the next one runs.

use std::{fmt, fs, path::Path};

use log::{info, warn};

use crate::{
    context::ExecutionContext,
    crushmap,
    exec::{command_to_string, CommandRecord, Executor},
    rule::DesiredRuleSpec,
};

/// The stages of a map transaction, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dump,
    Decompile,
    Edit,
    Write,
    Compile,
    Install,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Stage::Dump => "dump",
                Stage::Decompile => "decompile",
                Stage::Edit => "edit",
                Stage::Write => "write",
                Stage::Compile => "compile",
                Stage::Install => "install",
            }
        )
    }
}

/// Why a map transaction stopped. `cmd`, `stdout` and `stderr` belong to the last command that
/// was run. For stages that do not run an external command (`edit`, `write`) that is the
/// decompile, and `stderr` carries the local error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage} of the CRUSH map failed with output: {stderr}")]
pub struct StepFailure {
    pub stage: Stage,
    pub cmd: Vec<String>,
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}

impl StepFailure {
    fn local(stage: Stage, cmd: Vec<String>, err: impl fmt::Display) -> Self {
        StepFailure {
            stage,
            cmd,
            rc: 1,
            stdout: String::new(),
            stderr: err.to_string(),
        }
    }

    /// A local failure in `stage` after `last` was the most recent command run.
    fn after(stage: Stage, last: &CommandRecord, err: impl fmt::Display) -> Self {
        StepFailure {
            stage,
            cmd: last.cmd.clone(),
            rc: 1,
            stdout: last.output.stdout.clone(),
            stderr: err.to_string(),
        }
    }

    pub fn command_line(&self) -> String {
        command_to_string(&self.cmd)
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Drives one reconciliation of a rule through the CRUSH map text.
pub struct MapTransaction<'a> {
    executor: &'a dyn Executor,
    context: &'a ExecutionContext,
}

impl<'a> MapTransaction<'a> {
    pub fn new(executor: &'a dyn Executor, context: &'a ExecutionContext) -> Self {
        MapTransaction { executor, context }
    }

    /// Run one external step, turning a launch failure or nonzero exit into a [StepFailure].
    fn run(&self, stage: Stage, cmd: Vec<String>) -> Result<CommandRecord, StepFailure> {
        let output = match self.executor.execute(&cmd) {
            Ok(output) => output,
            Err(e) => return Err(StepFailure::local(stage, cmd, e)),
        };

        if !output.is_success() {
            return Err(StepFailure {
                stage,
                cmd,
                rc: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        Ok(CommandRecord { cmd, output })
    }

    /// Rewrite `rule_name` in the installed CRUSH map so that it matches `desired`.
    ///
    /// All intermediate files live in a temporary directory that is removed when this returns,
    /// whichever way it returns. On success the record of the install command is returned.
    pub fn reconcile(
        &self,
        rule_name: &str,
        desired: &DesiredRuleSpec,
    ) -> Result<CommandRecord, StepFailure> {
        let workdir = tempfile::Builder::new()
            .prefix("crush_rule.")
            .tempdir()
            .map_err(|e| StepFailure::local(Stage::Dump, Vec::new(), e))?;
        let dir = workdir.path();

        let binary_map = path_arg(&dir.join("_raw_crushmap.bin"));
        let decompiled_map = path_arg(&dir.join("_crushmap.txt"));
        let patched_map = path_arg(&dir.join("_patched_crushmap.txt"));
        let patched_binary_map = path_arg(&dir.join("_raw_patched_crushmap.bin"));

        info!("updating rule {rule_name} to {desired} through the CRUSH map");

        self.run(
            Stage::Dump,
            self.context.command_with_mount(
                dir,
                ["ceph", "osd", "getcrushmap", "-o", binary_map.as_str()],
            ),
        )?;

        let decompile = self.run(
            Stage::Decompile,
            self.context.command_with_mount(
                dir,
                [
                    "crushtool",
                    "-d",
                    binary_map.as_str(),
                    "-o",
                    decompiled_map.as_str(),
                ],
            ),
        )?;
        let map_text = fs::read_to_string(&decompiled_map)
            .map_err(|e| StepFailure::after(Stage::Decompile, &decompile, e))?;

        let patched = crushmap::patch(&map_text, rule_name, desired)
            .map_err(|e| StepFailure::after(Stage::Edit, &decompile, e))?;
        if patched.changed_lines == 0 {
            // The dump differs but none of the rule's step lines can be rewritten.
            warn!("no step line of rule {rule_name} could be rewritten to {desired}");
            return Err(StepFailure::after(
                Stage::Edit,
                &decompile,
                format!(
                    "rule '{rule_name}' differs from {desired} in a step the CRUSH map editor does \
                     not rewrite"
                ),
            ));
        }

        fs::write(&patched_map, &patched.text)
            .map_err(|e| StepFailure::after(Stage::Write, &decompile, e))?;

        self.run(
            Stage::Compile,
            self.context.command_with_mount(
                dir,
                [
                    "crushtool",
                    "-c",
                    patched_map.as_str(),
                    "-o",
                    patched_binary_map.as_str(),
                ],
            ),
        )?;

        self.run(
            Stage::Install,
            self.context.command_with_mount(
                dir,
                ["ceph", "osd", "setcrushmap", "-i", patched_binary_map.as_str()],
            ),
        )
    }
}
