// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates ephem.yml template files.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

/// Write a starter `ephem.yml` into `dir`, returning its path.
pub fn init_config(dir: &Path, owner: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let owner = owner.unwrap_or("you@example.com");
    if owner.trim().is_empty() {
        return Err(Error::InvalidConfig("owner cannot be empty".to_string()));
    }

    std::fs::write(&config_path, generate_template_yaml(owner))?;
    Ok(config_path)
}

fn generate_template_yaml(owner: &str) -> String {
    format!(
        r#"owner: {owner}
region: westeurope
template: infra/main.json

scenarios:
  - name: standalone
    parameters: infra/params/standalone.json
  # - name: cluster
  #   parameters: infra/params/cluster.json

# immediate | on-success | manual | scheduled
cleanup_policy: on-success
# scheduled_ttl: 24h

timeout: 30m
poll_interval: 30s
# max_concurrent_polls: 4

# state_dir: .ephem/state
# results_dir: .ephem/results

# Only targets carrying this tag may be destroyed without --force
# managed_tag:
#   key: managed-by
#   value: ephem

# endpoint:
#   scheme: neo4j
#   port: 7687
#   output_key: browserUrl
"#
    )
}
