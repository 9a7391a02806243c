// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use {
    chrono::{DateTime, Local, TimeDelta},
    serde::Serialize,
};

use crate::exec::CommandRecord;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// The JSON object printed for every rule that is handled: whether it changed, and the command
/// line, status and raw output of the last command that ran, with timings.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunReport {
    pub name: Option<String>,
    pub changed: bool,
    pub rc: i32,
    pub cmd: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub start: String,
    pub end: String,
    pub delta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// Format a duration as `H:MM:SS.ffffff`.
pub fn format_delta(delta: TimeDelta) -> String {
    let micros = delta.num_microseconds().unwrap_or(i64::MAX).max(0);
    let secs = micros / 1_000_000;
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        micros % 1_000_000
    )
}

impl RunReport {
    /// Build a report for `record`, timed from `start` until now.
    pub fn finish(
        name: Option<&str>,
        changed: bool,
        record: CommandRecord,
        msg: Option<String>,
        start: DateTime<Local>,
    ) -> Self {
        let end = Local::now();
        RunReport {
            name: name.map(str::to_string),
            changed,
            rc: record.output.status,
            cmd: record.cmd,
            stdout: record.output.stdout,
            stderr: record.output.stderr,
            start: start.format(TIMESTAMP_FORMAT).to_string(),
            end: end.format(TIMESTAMP_FORMAT).to_string(),
            delta: format_delta(end - start),
            msg,
        }
    }

    /// Print the report as a single line of JSON on stdout.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Could not serialize result: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Output;

    #[test]
    fn delta_formatting() {
        assert_eq!(format_delta(TimeDelta::microseconds(1_500_000)), "0:00:01.500000");
        assert_eq!(
            format_delta(TimeDelta::seconds(3723) + TimeDelta::microseconds(42)),
            "1:02:03.000042"
        );
    }

    #[test]
    fn report_carries_last_command() {
        let record = CommandRecord {
            cmd: vec!["ceph".to_string(), "osd".to_string()],
            output: Output::failure(22, "EINVAL"),
        };
        let report = RunReport::finish(Some("foo"), false, record, None, Local::now());

        assert_eq!(report.rc, 22);
        assert_eq!(report.cmd, vec!["ceph", "osd"]);
        assert_eq!(report.stderr, "EINVAL");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["name"], "foo");
        assert!(json.get("msg").is_none());
    }
}
