// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! exec.rs
//!
//! Runs the external `ceph`/`crushtool` commands. Everything that talks to the cluster goes
//! through the `Executor` trait so that the reconciliation logic can be driven by a scripted
//! `FakeExecutor` under test.

use std::{
    process::Command,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use log::{debug, info};

/// Join an argument list into the single command line that gets logged and reported.
pub fn command_to_string(args: &[String]) -> String {
    args.join(" ")
}

/// The result of running an external command to completion. A nonzero `status` is not an error
/// at this level: callers decide what a failing exit code means for them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Output {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    pub fn success(stdout: &str) -> Self {
        Output {
            status: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: &str) -> Self {
        Output {
            status,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// A command together with the output it produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandRecord {
    pub cmd: Vec<String>,
    pub output: Output,
}

impl CommandRecord {
    pub fn command_line(&self) -> String {
        command_to_string(&self.cmd)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("refusing to run an empty command")]
    EmptyCommand,

    #[error("could not run command '{command}': {err}")]
    Launch {
        command: String,
        #[source]
        err: std::io::Error,
    },

    #[error("command '{command}' was terminated by a signal")]
    Signaled { command: String },
}

/// Describes the commonly-used "safe-to-reference" type describing the Executor as a trait
/// object.
pub type BoxedExecutor = Arc<dyn Executor>;

/// Describes an "executor", which runs an argument list synchronously and returns its exit
/// status and captured output.
///
/// - In production, this is a [HostExecutor].
/// - Under test, a [FakeExecutor] answers with scripted output.
pub trait Executor: Send + Sync {
    fn execute(&self, args: &[String]) -> Result<Output, ExecutionError>;
}

fn log_input(id: u64, args: &[String]) {
    info!("running command {id}: {}", command_to_string(args));
}

fn log_output(id: u64, output: &Output) {
    info!(
        "finished command {id}: {} (status {})",
        if output.is_success() { "OK" } else { "ERROR" },
        output.status
    );
    if !output.stdout.is_empty() {
        debug!("command {id} stdout: {}", output.stdout);
    }
    if !output.stderr.is_empty() {
        debug!("command {id} stderr: {}", output.stderr);
    }
}

/// Runs commands on the local host with `std::process::Command`, blocking until they exit.
#[derive(Debug, Default)]
pub struct HostExecutor {
    counter: AtomicU64,
}

impl HostExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }
}

impl Executor for HostExecutor {
    fn execute(&self, args: &[String]) -> Result<Output, ExecutionError> {
        let (program, rest) = args.split_first().ok_or(ExecutionError::EmptyCommand)?;

        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        log_input(id, args);

        let output = Command::new(program)
            .args(rest)
            .output()
            .map_err(|err| ExecutionError::Launch {
                command: command_to_string(args),
                err,
            })?;

        let Some(status) = output.status.code() else {
            return Err(ExecutionError::Signaled {
                command: command_to_string(args),
            });
        };

        let output = Output {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        log_output(id, &output);
        Ok(output)
    }
}

/// Handler called for every command a [FakeExecutor] is asked to run.
pub type Handler = dyn FnMut(&[String]) -> Output + Send;
pub type BoxedHandler = Box<Handler>;

/// An executor which records every command it is given and responds with whatever the installed
/// handler returns. The default handler succeeds with empty output.
pub struct FakeExecutor {
    handler: Mutex<BoxedHandler>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeExecutor {
    pub fn new() -> Arc<FakeExecutor> {
        Arc::new(Self {
            handler: Mutex::new(Box::new(|_args: &[String]| Output::success(""))),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Set the handler to an arbitrary function.
    pub fn set_handler(&self, f: BoxedHandler) {
        *self.handler.lock().unwrap() = f;
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }
}

impl Executor for FakeExecutor {
    fn execute(&self, args: &[String]) -> Result<Output, ExecutionError> {
        if args.is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }
        let id = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(args.to_vec());
            calls.len() as u64 - 1
        };
        log_input(id, args);

        let output = self.handler.lock().unwrap()(args);
        log_output(id, &output);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fake_records_calls_in_order() {
        let fake = FakeExecutor::new();
        fake.set_handler(Box::new(|args: &[String]| {
            if args[0] == "false" {
                Output::failure(1, "nope")
            } else {
                Output::success("yes")
            }
        }));

        let first = fake.execute(&args(&["true", "a"])).unwrap();
        let second = fake.execute(&args(&["false"])).unwrap();

        assert!(first.is_success());
        assert_eq!(first.stdout, "yes");
        assert_eq!(second, Output::failure(1, "nope"));
        assert_eq!(fake.calls(), vec![args(&["true", "a"]), args(&["false"])]);
    }

    #[test]
    fn empty_command_is_rejected() {
        let host = HostExecutor::new();
        assert!(matches!(
            host.execute(&[]),
            Err(ExecutionError::EmptyCommand)
        ));
    }
}
