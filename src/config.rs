// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    context::ExecutionContext,
    rule::{BucketType, DesiredRule, DesiredRuleSpec, RuleKind, RuleType},
};

/// Config is the model of the crush_rule configuration file: how to reach the cluster, plus the
/// list of rules that `crush_rule apply` should enforce.
///
/// ```toml
/// [context]
/// launcher = "cephadm"
/// fsid = "6a3e2c1e-..."
///
/// [[rules]]
/// name = "fast"
/// rule_type = "replicated"
/// bucket_root = "default"
/// bucket_type = "host"
/// device_class = "ssd"
/// ```
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub context: ExecutionContext,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("rule '{rule}': {field} is required when {condition}")]
    MissingField {
        rule: String,
        field: &'static str,
        condition: &'static str,
    },
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Check every rule entry without touching the cluster.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in self.rules.iter() {
            rule.desired_state()?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    #[default]
    Present,
    Absent,
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RuleState::Present => "present",
                RuleState::Absent => "absent",
            }
        )
    }
}

/// One rule entry. All the fields besides `name` are optional in the file; which ones are
/// required depends on `state` and `rule_type`, and is checked by [RuleConfig::desired_state].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub state: RuleState,
    pub rule_type: Option<RuleType>,
    pub bucket_root: Option<String>,
    pub bucket_type: Option<BucketType>,
    pub device_class: Option<String>,
    pub profile: Option<String>,
}

/// The validated form of a [RuleConfig].
#[derive(Debug, Clone, PartialEq)]
pub enum DesiredState {
    Present(DesiredRule),
    Absent(String),
}

impl RuleConfig {
    fn missing(&self, field: &'static str, condition: &'static str) -> ConfigError {
        ConfigError::MissingField {
            rule: self.name.clone(),
            field,
            condition,
        }
    }

    pub fn desired_state(&self) -> Result<DesiredState, ConfigError> {
        match self.state {
            RuleState::Absent => Ok(DesiredState::Absent(self.name.clone())),
            RuleState::Present => Ok(DesiredState::Present(self.desired_rule()?)),
        }
    }

    /// The rule this entry describes, ignoring `state`.
    pub fn desired_rule(&self) -> Result<DesiredRule, ConfigError> {
        let rule_type = self
            .rule_type
            .ok_or_else(|| self.missing("rule_type", "state is present"))?;

        let kind = match rule_type {
            RuleType::Replicated => {
                let root = self
                    .bucket_root
                    .as_deref()
                    .ok_or_else(|| self.missing("bucket_root", "rule_type is replicated"))?;
                let bucket_type = self
                    .bucket_type
                    .ok_or_else(|| self.missing("bucket_type", "rule_type is replicated"))?;
                RuleKind::Replicated(DesiredRuleSpec::new(
                    root,
                    bucket_type,
                    self.device_class.as_deref(),
                ))
            }
            RuleType::Erasure => {
                let profile = self
                    .profile
                    .clone()
                    .ok_or_else(|| self.missing("profile", "rule_type is erasure"))?;
                RuleKind::Erasure {
                    profile: Some(profile),
                }
            }
        };

        Ok(DesiredRule {
            name: self.name.clone(),
            kind,
        })
    }
}
