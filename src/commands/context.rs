// ABOUTME: Shared setup for commands that need config, state, and the remote client.
// ABOUTME: Loads ephem.yml, opens the state store, and builds the orchestrator.

use ephem::config::Config;
use ephem::error::Result;
use ephem::lifecycle::{ControllerSettings, Orchestrator, local_hostname};
use ephem::remote::AzCliClient;
use ephem::store::FileDeploymentStore;
use std::path::{Path, PathBuf};

/// Everything a lifecycle command runs against.
pub struct Context {
    pub root: PathBuf,
    pub config: Config,
    pub store: FileDeploymentStore,
    pub remote: AzCliClient,
    pub settings: ControllerSettings,
}

impl Context {
    /// Load configuration from `root` and open the state store it names.
    pub async fn open(root: &Path) -> Result<Self> {
        let config = Config::discover(root)?.with_env_overrides(root);
        tracing::debug!("state directory: {}", config.state_dir.display());

        let store = FileDeploymentStore::open(&config.state_dir).await?;
        let remote = AzCliClient::new(&config.az_path);
        let settings = config.controller_settings(local_hostname());

        Ok(Self {
            root: root.to_path_buf(),
            config,
            store,
            remote,
            settings,
        })
    }

    pub fn orchestrator(&self) -> Orchestrator<'_, AzCliClient, FileDeploymentStore> {
        Orchestrator::new(&self.remote, &self.store, &self.settings)
    }
}
