// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, defaults, discovery, and environment overrides.

use ephem::config::*;
use ephem::error::Error;
use ephem::store::CleanupPolicy;
use std::path::Path;
use std::time::Duration;

const MINIMAL: &str = r#"
owner: qa@example.com
template: infra/main.json
scenarios:
  - name: standalone
    parameters: infra/params/standalone.json
"#;

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.owner, "qa@example.com");
        assert_eq!(config.scenarios.len(), 1);
        assert_eq!(config.scenarios.head.name.as_str(), "standalone");
        assert!(config.scenarios.head.template.is_none());
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.region, "westeurope");
        assert_eq!(config.resource_prefix, "ephem-test");
        assert_eq!(config.operation_prefix, "ephem-deploy");
        assert_eq!(config.cleanup_policy, CleanupPolicy::OnSuccess);
        assert_eq!(config.timeout, Duration::from_secs(30 * 60));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.max_concurrent_polls, 4);
        assert_eq!(config.scheduled_ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.managed_tag.to_string(), "managed-by=ephem");
        assert_eq!(config.endpoint.port, 7687);
        assert!(config.branch.is_none());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
owner: qa@example.com
region: northeurope
resource_prefix: graph-test
operation_prefix: graph-deploy
template: infra/main.json
scenarios:
  - name: standalone
    parameters: params/standalone.json
  - name: cluster
    parameters: params/cluster.json
    template: infra/cluster.json
cleanup_policy: scheduled
timeout: 45m
poll_interval: 10s
max_concurrent_polls: 8
scheduled_ttl: 2d
managed_tag:
  key: owner-tool
  value: graph-ci
endpoint:
  scheme: bolt
  port: 7688
  output_key: clusterUrl
branch: release/5.x
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.region, "northeurope");
        assert_eq!(config.scenarios.len(), 2);
        assert_eq!(config.cleanup_policy, CleanupPolicy::Scheduled);
        assert_eq!(config.timeout, Duration::from_secs(45 * 60));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_polls, 8);
        assert_eq!(config.scheduled_ttl, Duration::from_secs(2 * 24 * 60 * 60));
        assert_eq!(config.managed_tag.to_string(), "owner-tool=graph-ci");
        assert_eq!(config.endpoint.scheme, "bolt");
        assert_eq!(config.branch.as_deref(), Some("release/5.x"));

        let cluster = config.scenario("cluster").unwrap();
        assert_eq!(
            cluster.template.as_deref(),
            Some(Path::new("infra/cluster.json"))
        );
    }

    #[test]
    fn controller_settings_follow_config() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let settings = config.controller_settings("ci-runner-7");
        assert_eq!(settings.owner, "qa@example.com");
        assert_eq!(settings.launched_from, "ci-runner-7");
        assert_eq!(settings.monitor.poll_interval, config.poll_interval);
    }
}

mod validation {
    use super::*;

    #[test]
    fn duplicate_scenario_names_rejected() {
        let yaml = r#"
owner: qa@example.com
template: infra/main.json
scenarios:
  - name: standalone
    parameters: a.json
  - name: standalone
    parameters: b.json
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate scenario name"));
    }

    #[test]
    fn empty_scenarios_rejected() {
        let yaml = r#"
owner: qa@example.com
template: infra/main.json
scenarios: []
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("at least one scenario"));
    }

    #[test]
    fn scheduled_ttl_beyond_date_range_rejected() {
        let yaml = format!("{MINIMAL}scheduled_ttl: 500000years\n");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("scheduled_ttl cannot exceed"));
    }

    #[test]
    fn timeout_beyond_limit_rejected() {
        let yaml = format!("{MINIMAL}timeout: 20years\n");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn durations_at_the_limit_accepted() {
        let yaml = format!("{MINIMAL}scheduled_ttl: 3650days\ntimeout: 3650days\n");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.scheduled_ttl, MAX_DURATION);
    }

    #[test]
    fn invalid_scenario_name_rejected() {
        let yaml = r#"
owner: qa@example.com
template: infra/main.json
scenarios:
  - name: "has spaces"
    parameters: a.json
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn empty_owner_rejected() {
        let yaml = MINIMAL.replace("qa@example.com", "\"  \"");
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let yaml = format!("{MINIMAL}poll_interval: 0s\n");
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_cleanup_policy_rejected() {
        let yaml = format!("{MINIMAL}cleanup_policy: sometimes\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }
}

mod selection {
    use super::*;

    fn two_scenarios() -> Config {
        let yaml = format!("{MINIMAL}  - name: cluster\n    parameters: c.json\n");
        Config::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn empty_selection_means_all() {
        let config = two_scenarios();
        assert_eq!(config.select_scenarios(&[]).unwrap().len(), 2);
    }

    #[test]
    fn selection_keeps_given_order_without_duplicates() {
        let config = two_scenarios();
        let names = vec![
            "cluster".to_string(),
            "standalone".to_string(),
            "cluster".to_string(),
        ];
        let selected: Vec<_> = config
            .select_scenarios(&names)
            .unwrap()
            .into_iter()
            .map(|s| s.name.to_string())
            .collect();
        assert_eq!(selected, vec!["cluster", "standalone"]);
    }

    #[test]
    fn unknown_scenario_is_an_error() {
        let config = two_scenarios();
        assert!(matches!(
            config.select_scenarios(&["replica".to_string()]),
            Err(Error::UnknownScenario(name)) if name == "replica"
        ));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn discover_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.template, dir.path().join("infra/main.json"));
        assert_eq!(config.state_dir, dir.path().join(".ephem/state"));
        assert_eq!(
            config.scenarios.head.parameters,
            dir.path().join("infra/params/standalone.json")
        );
    }

    #[test]
    fn discover_finds_dot_directory_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".ephem")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), MINIMAL).unwrap();

        assert!(Config::discover(dir.path()).is_ok());
    }

    #[test]
    fn discover_without_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }

    #[test]
    fn state_dir_env_override() {
        let base = Path::new("/work/project");
        let config = Config::from_yaml(MINIMAL).unwrap();
        temp_env::with_var(STATE_DIR_ENV, Some("custom-state"), || {
            let config = config.clone().with_env_overrides(base);
            assert_eq!(config.state_dir, base.join("custom-state"));
        });
    }

    #[test]
    fn blank_state_dir_env_is_ignored() {
        let base = Path::new("/work/project");
        let config = Config::from_yaml(MINIMAL).unwrap();
        temp_env::with_var(STATE_DIR_ENV, Some("  "), || {
            let config = config.clone().with_env_overrides(base);
            assert_eq!(config.state_dir, Path::new(".ephem/state"));
        });
    }
}

mod init {
    use super::*;

    #[test]
    fn init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), Some("lead@example.com"), false).unwrap();
        let config = Config::load(&path, dir.path()).unwrap();
        assert_eq!(config.owner, "lead@example.com");
    }

    #[test]
    fn init_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, false).unwrap();
        assert!(init_config(dir.path(), Some("other@example.com"), true).is_ok());
    }
}
