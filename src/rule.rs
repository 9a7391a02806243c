// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! rule.rs
//!
//! The model of a CRUSH rule as reported by `ceph osd crush rule dump`, the desired state a user
//! asks for, and the comparison that decides whether a live replicated rule has drifted.

use std::{fmt, str::FromStr};

use {
    clap::ValueEnum,
    serde::{Deserialize, Serialize},
};

#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Replicated,
    Erasure,
}

impl RuleType {
    /// Map the numeric type code used in rule dumps.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(RuleType::Replicated),
            3 => Some(RuleType::Erasure),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            RuleType::Replicated => 1,
            RuleType::Erasure => 3,
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RuleType::Replicated => "replicated",
                RuleType::Erasure => "erasure",
            }
        )
    }
}

/// Levels of the storage hierarchy that a replicated rule can use as its failure domain.
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BucketType {
    Osd,
    Host,
    Chassis,
    Rack,
    Row,
    Pdu,
    Pod,
    Room,
    Datacenter,
    Zone,
    Region,
    Root,
}

impl BucketType {
    pub fn as_str(self) -> &'static str {
        match self {
            BucketType::Osd => "osd",
            BucketType::Host => "host",
            BucketType::Chassis => "chassis",
            BucketType::Rack => "rack",
            BucketType::Row => "row",
            BucketType::Pdu => "pdu",
            BucketType::Pod => "pod",
            BucketType::Room => "room",
            BucketType::Datacenter => "datacenter",
            BucketType::Zone => "zone",
            BucketType::Region => "region",
            BucketType::Root => "root",
        }
    }
}

impl fmt::Display for BucketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown bucket type '{0}'")]
pub struct UnknownBucketType(pub String);

impl FromStr for BucketType {
    type Err = UnknownBucketType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <BucketType as ValueEnum>::from_str(s, false).map_err(|_| UnknownBucketType(s.to_string()))
    }
}

/// A single step of a rule. Only the steps that decide placement root and failure domain are
/// modelled; everything else (`emit`, `choose_indep`, tunables...) is kept as `Other`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuleStep {
    /// `item_name` is `<root>` or `<root>~<device class>`.
    Take { item_name: String },
    ChooseleafFirstn {
        #[serde(rename = "type")]
        domain: String,
    },
    #[serde(other)]
    Other,
}

impl RuleStep {
    /// Split a `take` item name into its root and (optional) device class.
    pub fn split_item_name(item_name: &str) -> (&str, Option<&str>) {
        match item_name.split_once('~') {
            Some((root, class)) => (root, non_empty(class)),
            None => (item_name, None),
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown CRUSH rule type code {0}")]
pub struct UnknownRuleType(pub i64);

/// The rule exactly as the JSON dump spells it, before the type code is checked.
#[derive(Deserialize, Debug, Clone)]
pub struct RuleDump {
    pub rule_id: i64,
    pub rule_name: String,
    #[serde(rename = "type")]
    pub kind: i64,
    #[serde(default)]
    pub steps: Vec<RuleStep>,
}

/// A rule as it currently exists in the cluster.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RuleDump")]
pub struct CrushRule {
    pub id: i64,
    pub name: String,
    pub rule_type: RuleType,
    pub steps: Vec<RuleStep>,
}

impl TryFrom<RuleDump> for CrushRule {
    type Error = UnknownRuleType;

    fn try_from(raw: RuleDump) -> Result<Self, Self::Error> {
        let rule_type = RuleType::from_code(raw.kind).ok_or(UnknownRuleType(raw.kind))?;
        Ok(CrushRule {
            id: raw.rule_id,
            name: raw.rule_name,
            rule_type,
            steps: raw.steps,
        })
    }
}

impl CrushRule {
    /// Decode the JSON printed by `ceph osd crush rule dump <name> --format=json`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// What a replicated rule should look like.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredRuleSpec {
    pub bucket_root: String,
    pub bucket_type: BucketType,
    /// `None` means "no device class constraint".
    pub device_class: Option<String>,
}

impl DesiredRuleSpec {
    /// An empty device class is treated the same as no device class.
    pub fn new(bucket_root: &str, bucket_type: BucketType, device_class: Option<&str>) -> Self {
        DesiredRuleSpec {
            bucket_root: bucket_root.to_string(),
            bucket_type,
            device_class: device_class.and_then(non_empty).map(str::to_string),
        }
    }
}

impl fmt::Display for DesiredRuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root={} type={}", self.bucket_root, self.bucket_type)?;
        if let Some(class) = &self.device_class {
            write!(f, " class={class}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Replicated(DesiredRuleSpec),
    Erasure { profile: Option<String> },
}

/// A named rule and the shape it should have.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredRule {
    pub name: String,
    pub kind: RuleKind,
}

impl DesiredRule {
    pub fn rule_type(&self) -> RuleType {
        match self.kind {
            RuleKind::Replicated(_) => RuleType::Replicated,
            RuleKind::Erasure { .. } => RuleType::Erasure,
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Decide whether `current` diverges from `desired` in placement root, device class, or failure
/// domain.
///
/// Only the steps present in the rule are examined: a rule with no `take` step gives no signal
/// about its root, and likewise for `chooseleaf_firstn` and the failure domain. The caller must
/// already have checked that `current` is a replicated rule.
pub fn needs_change(desired: &DesiredRuleSpec, current: &CrushRule) -> bool {
    current.steps.iter().any(|step| match step {
        RuleStep::Take { item_name } => {
            let (root, class) = RuleStep::split_item_name(item_name);
            root != desired.bucket_root || class != desired.device_class.as_deref()
        }
        RuleStep::ChooseleafFirstn { domain } => domain != desired.bucket_type.as_str(),
        RuleStep::Other => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"{
        "rule_id": 1,
        "rule_name": "fast",
        "type": 1,
        "steps": [
            {"op": "take", "item": -2, "item_name": "default~ssd"},
            {"op": "chooseleaf_firstn", "num": 0, "type": "host"},
            {"op": "emit"}
        ]
    }"#;

    fn rule() -> CrushRule {
        CrushRule::from_json(DUMP).unwrap()
    }

    #[test]
    fn decode_dump() {
        let rule = rule();
        assert_eq!(rule.name, "fast");
        assert_eq!(rule.rule_type, RuleType::Replicated);
        assert_eq!(
            rule.steps,
            vec![
                RuleStep::Take {
                    item_name: "default~ssd".to_string()
                },
                RuleStep::ChooseleafFirstn {
                    domain: "host".to_string()
                },
                RuleStep::Other,
            ]
        );
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let json = r#"{"rule_id": 4, "rule_name": "odd", "type": 7, "steps": []}"#;
        assert!(CrushRule::from_json(json).is_err());
    }

    #[test]
    fn matching_rule_needs_no_change() {
        let desired = DesiredRuleSpec::new("default", BucketType::Host, Some("ssd"));
        assert!(!needs_change(&desired, &rule()));
    }

    #[test]
    fn root_divergence() {
        let desired = DesiredRuleSpec::new("rack1", BucketType::Host, Some("ssd"));
        assert!(needs_change(&desired, &rule()));
    }

    #[test]
    fn class_divergence() {
        let desired = DesiredRuleSpec::new("default", BucketType::Host, None);
        assert!(needs_change(&desired, &rule()));

        let desired = DesiredRuleSpec::new("default", BucketType::Host, Some("hdd"));
        assert!(needs_change(&desired, &rule()));
    }

    #[test]
    fn domain_divergence() {
        let desired = DesiredRuleSpec::new("default", BucketType::Rack, Some("ssd"));
        assert!(needs_change(&desired, &rule()));
    }

    #[test]
    fn empty_class_is_absent() {
        let desired = DesiredRuleSpec::new("default", BucketType::Host, Some(""));
        assert_eq!(desired.device_class, None);

        let mut current = rule();
        current.steps[0] = RuleStep::Take {
            item_name: "default".to_string(),
        };
        assert!(!needs_change(&desired, &current));
    }

    #[test]
    fn missing_steps_give_no_signal() {
        let current = CrushRule {
            id: 0,
            name: "bare".to_string(),
            rule_type: RuleType::Replicated,
            steps: vec![RuleStep::Other],
        };
        let desired = DesiredRuleSpec::new("anything", BucketType::Datacenter, Some("nvme"));
        assert!(!needs_change(&desired, &current));
    }

    #[test]
    fn bucket_type_strings() {
        assert_eq!("datacenter".parse::<BucketType>(), Ok(BucketType::Datacenter));
        assert_eq!(BucketType::Pdu.to_string(), "pdu");
        assert!("shelf".parse::<BucketType>().is_err());
    }
}
