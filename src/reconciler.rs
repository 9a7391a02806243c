// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! reconciler.rs
//!
//! Brings a single CRUSH rule to its desired state: create it when it is missing, remove it when
//! it should be absent, and push a replicated rule's root, device class and failure domain back
//! through the CRUSH map when they have drifted.

use std::fmt;

use log::{debug, info};

use crate::{
    context::ExecutionContext,
    exec::{BoxedExecutor, CommandRecord, ExecutionError, Output},
    rule::{needs_change, CrushRule, DesiredRule, RuleKind, RuleType},
    transaction::{MapTransaction, StepFailure},
};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// `dump` is the rule dump whose stdout could not be decoded.
    #[error("could not decode the dump of crush rule {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
        dump: CommandRecord,
    },

    /// A rule's type is fixed once it has been created.
    #[error("Can not convert crush rule {name} to {desired}")]
    TypeChange {
        name: String,
        current: RuleType,
        desired: RuleType,
        dump: CommandRecord,
    },

    #[error(transparent)]
    Step(#[from] StepFailure),

    /// A command that has no map transaction stage (create, remove, dump) exited nonzero.
    #[error("command '{}' failed with rc {}: {}", .0.command_line(), .0.output.status, .0.output.stderr)]
    Command(CommandRecord),
}

impl ReconcileError {
    /// The command and output to report for this error, when one was run.
    pub fn record(&self) -> Option<CommandRecord> {
        match self {
            ReconcileError::Step(failure) => Some(CommandRecord {
                cmd: failure.cmd.clone(),
                output: Output {
                    status: failure.rc,
                    stdout: failure.stdout.clone(),
                    stderr: failure.stderr.clone(),
                },
            }),
            ReconcileError::Command(record)
            | ReconcileError::Decode { dump: record, .. }
            | ReconcileError::TypeChange { dump: record, .. } => Some(record.clone()),
            ReconcileError::Execution(_) => None,
        }
    }
}

/// What a reconciliation did (or, in check mode, would have done).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Created,
    Updated,
    Removed,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Change::Unchanged => "unchanged",
                Change::Created => "created",
                Change::Updated => "updated",
                Change::Removed => "removed",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub change: Change,
    /// True if no mutating command was run because the reconciler is in check mode.
    pub checked_only: bool,
    /// The last command that was run.
    pub record: CommandRecord,
    pub message: Option<String>,
}

impl Outcome {
    pub fn changed(&self) -> bool {
        self.change != Change::Unchanged
    }
}

pub struct Reconciler {
    executor: BoxedExecutor,
    context: ExecutionContext,
    check_mode: bool,
}

impl Reconciler {
    pub fn new(executor: BoxedExecutor, context: ExecutionContext) -> Self {
        Reconciler {
            executor,
            context,
            check_mode: false,
        }
    }

    /// In check mode only read-only commands are run, and outcomes report the change that would
    /// have been made.
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn run(&self, args: Vec<String>) -> Result<CommandRecord, ReconcileError> {
        let output = self.executor.execute(&args)?;
        Ok(CommandRecord { cmd: args, output })
    }

    fn run_checked(&self, args: Vec<String>) -> Result<CommandRecord, ReconcileError> {
        let record = self.run(args)?;
        if !record.output.is_success() {
            return Err(ReconcileError::Command(record));
        }
        Ok(record)
    }

    /// Dump a rule. A failing dump means the rule does not exist, which is reported as `None`
    /// alongside the dump command's record.
    pub fn fetch_rule(
        &self,
        name: &str,
    ) -> Result<(Option<CrushRule>, CommandRecord), ReconcileError> {
        let record = self.run(self.context.command([
            "ceph",
            "osd",
            "crush",
            "rule",
            "dump",
            name,
            "--format=json",
        ]))?;

        if !record.output.is_success() {
            debug!("crush rule {name} does not exist");
            return Ok((None, record));
        }

        match CrushRule::from_json(&record.output.stdout) {
            Ok(rule) => Ok((Some(rule), record)),
            Err(source) => Err(ReconcileError::Decode {
                name: name.to_string(),
                source,
                dump: record,
            }),
        }
    }

    fn create_command(&self, desired: &DesiredRule) -> Vec<String> {
        let mut args = vec!["ceph", "osd", "crush", "rule"];
        match &desired.kind {
            RuleKind::Replicated(spec) => {
                args.extend([
                    "create-replicated",
                    desired.name.as_str(),
                    spec.bucket_root.as_str(),
                    spec.bucket_type.as_str(),
                ]);
                if let Some(class) = &spec.device_class {
                    args.push(class);
                }
            }
            RuleKind::Erasure { profile } => {
                args.extend(["create-erasure", desired.name.as_str()]);
                if let Some(profile) = profile {
                    args.push(profile);
                }
            }
        }
        self.context.command(args)
    }

    /// Make sure the rule exists with the desired type and, for replicated rules, the desired
    /// root, device class and failure domain.
    pub fn ensure_present(&self, desired: &DesiredRule) -> Result<Outcome, ReconcileError> {
        let name = desired.name.as_str();
        let (current, dump) = self.fetch_rule(name)?;

        let Some(current) = current else {
            if self.check_mode {
                return Ok(self.checked(Change::Created, dump));
            }
            info!("creating {} crush rule {name}", desired.rule_type());
            let record = self.run_checked(self.create_command(desired))?;
            return Ok(Outcome {
                change: Change::Created,
                checked_only: false,
                record,
                message: None,
            });
        };

        if current.rule_type != desired.rule_type() {
            return Err(ReconcileError::TypeChange {
                name: name.to_string(),
                current: current.rule_type,
                desired: desired.rule_type(),
                dump,
            });
        }

        let spec = match &desired.kind {
            RuleKind::Replicated(spec) if needs_change(spec, &current) => spec,
            _ => {
                debug!("crush rule {name} is up to date");
                return Ok(Outcome {
                    change: Change::Unchanged,
                    checked_only: false,
                    record: dump,
                    message: None,
                });
            }
        };

        if self.check_mode {
            return Ok(self.checked(Change::Updated, dump));
        }

        let record = MapTransaction::new(self.executor.as_ref(), &self.context)
            .reconcile(name, spec)?;
        Ok(Outcome {
            change: Change::Updated,
            checked_only: false,
            record,
            message: None,
        })
    }

    /// Make sure the rule does not exist.
    pub fn ensure_absent(&self, name: &str) -> Result<Outcome, ReconcileError> {
        let (current, dump) = self.fetch_rule(name)?;

        if current.is_none() {
            let record = CommandRecord {
                cmd: dump.cmd,
                output: Output::success(&format!("Crush Rule {name} doesn't exist")),
            };
            return Ok(Outcome {
                change: Change::Unchanged,
                checked_only: false,
                record,
                message: None,
            });
        }

        if self.check_mode {
            return Ok(self.checked(Change::Removed, dump));
        }

        info!("removing crush rule {name}");
        let record = self.run_checked(self.context.command([
            "ceph", "osd", "crush", "rule", "rm", name,
        ]))?;
        Ok(Outcome {
            change: Change::Removed,
            checked_only: false,
            record,
            message: None,
        })
    }

    /// Dump one rule, or every rule when `name` is `None`. The raw JSON is in the record's
    /// stdout.
    pub fn info(&self, name: Option<&str>) -> Result<CommandRecord, ReconcileError> {
        let mut args = vec!["ceph", "osd", "crush", "rule", "dump"];
        args.extend(name);
        args.push("--format=json");
        self.run_checked(self.context.command(args))
    }

    /// The rule dump is the only command run in check mode; a failed dump of a missing rule is
    /// the expected answer, so the reported status is zero.
    fn checked(&self, change: Change, mut record: CommandRecord) -> Outcome {
        record.output.status = 0;
        Outcome {
            change,
            checked_only: true,
            record,
            message: Some(format!("check mode: crush rule would be {change}")),
        }
    }
}
