// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use {chrono::Local, clap::Args};

use crate::{
    commands::*,
    config::{RuleConfig, RuleState},
    reconciler::Reconciler,
    rule::{BucketType, RuleType},
};

#[derive(Args, Debug, Clone)]
pub struct PresentArgs {
    /// The name of the CRUSH rule.
    #[arg()]
    name: String,

    #[arg(long)]
    rule_type: RuleType,

    /// The bucket root for a replicated rule.
    #[arg(long)]
    bucket_root: Option<String>,

    /// The failure domain for a replicated rule.
    #[arg(long)]
    bucket_type: Option<BucketType>,

    /// The device class for a replicated rule.
    #[arg(long)]
    device_class: Option<String>,

    /// The erasure code profile for an erasure rule.
    #[arg(long)]
    profile: Option<String>,
}

impl PresentArgs {
    fn as_config(&self) -> RuleConfig {
        RuleConfig {
            name: self.name.clone(),
            state: RuleState::Present,
            rule_type: Some(self.rule_type),
            bucket_root: self.bucket_root.clone(),
            bucket_type: self.bucket_type,
            device_class: self.device_class.clone(),
            profile: self.profile.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AbsentArgs {
    /// The name of the CRUSH rule.
    #[arg()]
    name: String,
}

pub fn present(reconciler: &Reconciler, args: &PresentArgs) -> HandledResult<()> {
    let start = Local::now();

    let desired = args
        .as_config()
        .desired_rule()
        .handle_err(|e| eprintln!("{e}"))?;

    report_outcome(&args.name, reconciler.ensure_present(&desired), start)
}

pub fn absent(reconciler: &Reconciler, args: &AbsentArgs) -> HandledResult<()> {
    let start = Local::now();
    report_outcome(&args.name, reconciler.ensure_absent(&args.name), start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleKind;

    fn args(bucket_type: Option<BucketType>) -> PresentArgs {
        PresentArgs {
            name: "fast".to_string(),
            rule_type: RuleType::Replicated,
            bucket_root: Some("default".to_string()),
            bucket_type,
            device_class: Some(String::new()),
            profile: None,
        }
    }

    #[test]
    fn arguments_become_a_rule() {
        let desired = args(Some(BucketType::Host)).as_config().desired_rule().unwrap();
        assert_eq!(desired.name, "fast");
        let RuleKind::Replicated(spec) = desired.kind else {
            panic!("expected a replicated rule");
        };
        assert_eq!(spec.bucket_type, BucketType::Host);
        assert_eq!(spec.device_class, None);
    }

    #[test]
    fn missing_failure_domain_is_rejected() {
        assert!(args(None).as_config().desired_rule().is_err());
    }
}
