// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use crushrule_lib::{
        commands::{execution_context, Cli},
        config::{Config, ConfigError, DesiredState, RuleState},
        context::Launcher,
        rule::{BucketType, RuleKind, RuleType},
    };

    const CONFIG: &str = r#"
[context]
launcher = "cephadm"
cephadm = "/usr/sbin/cephadm"
fsid = "6a3e2c1e-0000-4000-8000-000000000000"
image = "quay.io/ceph/ceph:v18"

[[rules]]
name = "fast"
rule_type = "replicated"
bucket_root = "default"
bucket_type = "rack"
device_class = "ssd"

[[rules]]
name = "archive"
rule_type = "erasure"
profile = "ec42"

[[rules]]
name = "old"
state = "absent"
"#;

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(CONFIG).unwrap();

        assert_eq!(config.context.launcher, Launcher::Cephadm);
        assert_eq!(config.context.cephadm, "/usr/sbin/cephadm");
        assert_eq!(
            config.context.base_command(),
            vec![
                "/usr/sbin/cephadm",
                "--image",
                "quay.io/ceph/ceph:v18",
                "shell",
                "--fsid",
                "6a3e2c1e-0000-4000-8000-000000000000"
            ]
        );
        assert_eq!(config.rules.len(), 3);
        assert!(config.validate().is_ok());

        let DesiredState::Present(fast) = config.rules[0].desired_state().unwrap() else {
            panic!("fast should be present");
        };
        let RuleKind::Replicated(spec) = &fast.kind else {
            panic!("fast should be replicated");
        };
        assert_eq!(spec.bucket_type, BucketType::Rack);
        assert_eq!(spec.device_class.as_deref(), Some("ssd"));

        let DesiredState::Present(archive) = config.rules[1].desired_state().unwrap() else {
            panic!("archive should be present");
        };
        assert_eq!(archive.rule_type(), RuleType::Erasure);

        assert_eq!(config.rules[2].state, RuleState::Absent);
        assert_eq!(
            config.rules[2].desired_state().unwrap(),
            DesiredState::Absent("old".to_string())
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.context.launcher, Launcher::Cephadm);
        assert_eq!(config.context.base_command(), vec!["cephadm", "shell"]);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn replicated_rule_needs_root_and_type() {
        let config = Config::from_toml(
            r#"
[[rules]]
name = "fast"
rule_type = "replicated"
bucket_root = "default"
"#,
        )
        .unwrap();

        match config.validate() {
            Err(ConfigError::MissingField { rule, field, .. }) => {
                assert_eq!(rule, "fast");
                assert_eq!(field, "bucket_type");
            }
            other => panic!("unexpected validation result: {other:?}"),
        }
    }

    #[test]
    fn present_rule_needs_a_type() {
        let config = Config::from_toml("[[rules]]\nname = \"fast\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField {
                field: "rule_type",
                ..
            })
        ));
    }

    #[test]
    fn unknown_bucket_type_is_a_parse_error() {
        let result = Config::from_toml(
            r#"
[[rules]]
name = "fast"
rule_type = "replicated"
bucket_root = "default"
bucket_type = "shelf"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn command_line_overrides_config() {
        let config = Config::from_toml(CONFIG).unwrap();
        let cli = Cli {
            fsid: Some("override".to_string()),
            direct: true,
            ..Default::default()
        };

        let context = execution_context(&cli, &config);
        assert_eq!(context.launcher, Launcher::Direct);
        assert_eq!(context.fsid.as_deref(), Some("override"));
        assert_eq!(context.image.as_deref(), Some("quay.io/ceph/ceph:v18"));
        assert!(context.base_command().is_empty());
    }
}
