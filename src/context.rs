// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How cluster commands are launched.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Launcher {
    /// Wrap every command in `cephadm shell`, which runs it inside the cluster's container image.
    #[default]
    Cephadm,
    /// Run `ceph` and `crushtool` straight from the host's PATH.
    Direct,
}

/// Everything needed to decide how a `ceph`/`crushtool` invocation is turned into a process
/// command line. Command construction only ever reads this struct; the CLI is responsible for
/// filling it in from the config file, flags and environment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutionContext {
    pub launcher: Launcher,
    /// Path to the cephadm binary.
    pub cephadm: String,
    /// Identifier (FSID) of the Ceph cluster to interact with.
    pub fsid: Option<String>,
    /// The Ceph container image to use.
    pub image: Option<String>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext {
            launcher: Launcher::Cephadm,
            cephadm: "cephadm".to_string(),
            fsid: None,
            image: None,
        }
    }
}

impl ExecutionContext {
    /// A context that runs the tools directly on the host.
    pub fn direct() -> Self {
        ExecutionContext {
            launcher: Launcher::Direct,
            ..Default::default()
        }
    }

    /// The wrapper that goes in front of every tool invocation: `cephadm [--image I] shell
    /// [--fsid F]`, or nothing at all for the direct launcher.
    pub fn base_command(&self) -> Vec<String> {
        match self.launcher {
            Launcher::Direct => Vec::new(),
            Launcher::Cephadm => {
                let mut cmd = vec![self.cephadm.clone()];
                if let Some(image) = &self.image {
                    cmd.extend(["--image".to_string(), image.clone()]);
                }
                cmd.push("shell".to_string());
                if let Some(fsid) = &self.fsid {
                    cmd.extend(["--fsid".to_string(), fsid.clone()]);
                }
                cmd
            }
        }
    }

    /// Build the full command line for a tool invocation.
    pub fn command<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = self.base_command();
        cmd.extend(args.into_iter().map(Into::into));
        cmd
    }

    /// Build a command line for a tool that reads or writes files under `dir`. Inside a cephadm
    /// shell the directory is bind-mounted at the same path so that host paths remain valid.
    pub fn command_with_mount<I, S>(&self, dir: &Path, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = self.base_command();
        if self.launcher == Launcher::Cephadm {
            let dir = dir.display();
            cmd.extend(["--mount".to_string(), format!("{dir}:{dir}"), "--".to_string()]);
        }
        cmd.extend(args.into_iter().map(Into::into));
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_cephadm_shell() {
        let ctx = ExecutionContext::default();
        assert_eq!(
            ctx.command(["ceph", "osd", "crush", "rule", "rm", "foo"]),
            vec!["cephadm", "shell", "ceph", "osd", "crush", "rule", "rm", "foo"]
        );
    }

    #[test]
    fn image_and_fsid_placement() {
        let ctx = ExecutionContext {
            fsid: Some("abc".to_string()),
            image: Some("quay.io/ceph/ceph:v18".to_string()),
            ..Default::default()
        };
        assert_eq!(
            ctx.base_command(),
            vec!["cephadm", "--image", "quay.io/ceph/ceph:v18", "shell", "--fsid", "abc"]
        );
    }

    #[test]
    fn mount_only_for_cephadm() {
        let dir = Path::new("/tmp/work");

        let ctx = ExecutionContext::default();
        assert_eq!(
            ctx.command_with_mount(dir, ["crushtool", "-d", "/tmp/work/a"]),
            vec![
                "cephadm",
                "shell",
                "--mount",
                "/tmp/work:/tmp/work",
                "--",
                "crushtool",
                "-d",
                "/tmp/work/a"
            ]
        );

        let ctx = ExecutionContext::direct();
        assert_eq!(
            ctx.command_with_mount(dir, ["crushtool", "-d", "/tmp/work/a"]),
            vec!["crushtool", "-d", "/tmp/work/a"]
        );
    }
}
