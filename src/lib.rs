// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod commands;
pub mod config;
pub mod context;
pub mod crushmap;
pub mod exec;
pub mod reconciler;
pub mod report;
pub mod rule;
pub mod transaction;

pub fn default_config_path() -> String {
    match std::env::var("CRUSH_RULE_CONFIG") {
        Ok(conf) => conf,
        Err(_) => "/etc/ceph/crush_rules.toml".to_string(),
    }
}

/// The cephadm binary used when neither the config file nor the command line names one.
pub fn default_cephadm() -> String {
    match std::env::var("CRUSH_RULE_CEPHADM") {
        Ok(path) => path,
        Err(_) => "cephadm".to_string(),
    }
}
