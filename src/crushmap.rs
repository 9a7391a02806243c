// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! crushmap.rs
//!
//! Edits the text form of a CRUSH map (the output of `crushtool -d`). The format is only
//! understood as far as this module needs it: a rule block starts with a `rule <name> {` line and
//! ends at the first line starting with `}`, and within it two step shapes are rewritten:
//!
//! ```text
//!     step take <root> [class <device class>]
//!     step chooseleaf firstn 0 type <failure domain>
//! ```
//!
//! Every other byte of the map is passed through untouched.

use std::{borrow::Cow, sync::LazyLock};

use {log::debug, regex::Regex};

use crate::rule::DesiredRuleSpec;

static STEP_TAKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*step take (\S+)( class (\S+))?$").expect("step take pattern is valid")
});

static STEP_CHOOSELEAF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*step chooseleaf firstn 0 type (\S+)$")
        .expect("step chooseleaf pattern is valid")
});

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("rule '{0}' was not found in the decompiled CRUSH map")]
    RuleNotFound(String),
}

/// The rewritten map text together with the number of lines that actually changed.
#[derive(Debug, PartialEq)]
pub struct PatchedMap {
    pub text: String,
    pub changed_lines: usize,
}

/// Whether `line` opens the block for `rule_name`. The name has to match the whole token, so
/// `rule foo` does not open `rule foobar {`.
fn opens_rule_block(line: &str, rule_name: &str) -> bool {
    let Some(rest) = line.strip_prefix("rule ") else {
        return false;
    };
    rest.split_whitespace().next() == Some(rule_name)
}

/// Rewrite a `step take` line. Returns `None` if the line is not one.
fn rewrite_take(line: &str, desired: &DesiredRuleSpec) -> Option<String> {
    let caps = STEP_TAKE.captures(line)?;
    let root = caps.get(1)?;
    let after_root = &line[root.end()..];

    let tail = match (caps.get(2).zip(caps.get(3)), desired.device_class.as_deref()) {
        (None, None) => after_root.to_string(),
        (None, Some(class)) => format!("{after_root} class {class}"),
        (Some((suffix, _)), None) => format!(
            "{}{}",
            &line[root.end()..suffix.start()],
            &line[suffix.end()..]
        ),
        (Some((_, old_class)), Some(class)) => format!(
            "{}{class}{}",
            &line[root.end()..old_class.start()],
            &line[old_class.end()..]
        ),
    };

    Some(format!(
        "{}{}{tail}",
        &line[..root.start()],
        desired.bucket_root
    ))
}

/// Rewrite a `step chooseleaf firstn 0 type` line. Returns `None` if the line is not one.
fn rewrite_chooseleaf(line: &str, desired: &DesiredRuleSpec) -> Option<String> {
    let domain = STEP_CHOOSELEAF.captures(line)?.get(1)?;
    Some(format!(
        "{}{}{}",
        &line[..domain.start()],
        desired.bucket_type,
        &line[domain.end()..]
    ))
}

/// Patch the block of `rule_name` in `map_text` so that its root, device class and failure
/// domain match `desired`.
///
/// Lines are split and re-joined on `\n` only, so the line count and any trailing newline are
/// preserved. Fails with [EditError::RuleNotFound] if the map has no block for `rule_name`.
pub fn patch(
    map_text: &str,
    rule_name: &str,
    desired: &DesiredRuleSpec,
) -> Result<PatchedMap, EditError> {
    let mut lines: Vec<Cow<str>> = map_text.split('\n').map(Cow::Borrowed).collect();

    let mut found = false;
    let mut changed_lines = 0;

    for line in lines.iter_mut() {
        if !found {
            found = opens_rule_block(line, rule_name);
            continue;
        }
        if line.starts_with('}') {
            break;
        }

        let rewritten = rewrite_take(line, desired).or_else(|| rewrite_chooseleaf(line, desired));
        if let Some(new_line) = rewritten {
            if new_line != **line {
                debug!("rule {rule_name}: '{}' -> '{new_line}'", line.trim());
                changed_lines += 1;
                *line = Cow::Owned(new_line);
            }
        }
    }

    if !found {
        return Err(EditError::RuleNotFound(rule_name.to_string()));
    }

    Ok(PatchedMap {
        text: lines.join("\n"),
        changed_lines,
    })
}
