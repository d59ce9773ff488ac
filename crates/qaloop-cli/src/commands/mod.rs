//! CLI command implementations.

pub mod batch;
pub mod cycle;
pub mod report;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use qaloop::config::timeout_from_secs;
use qaloop::{
    Collaborators, HttpCollaborators, HttpConfig, LocalCollaborators, LoopConfig, QualityLoop,
    ScriptedCollaborators, Workspace,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::cli::{Backend, Cli};

/// Score the mock backend gives every unit.
const MOCK_SCORE: f64 = 8.0;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub backend: Backend,
    pub workspace: PathBuf,
    pub threshold: Option<f64>,
    pub timeout_secs: Option<f64>,
    pub verbose: bool,
}

impl From<&Cli> for GlobalOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            backend: cli.backend.clone(),
            workspace: cli.workspace.clone(),
            threshold: cli.threshold,
            timeout_secs: cli.timeout_secs,
            verbose: cli.verbose,
        }
    }
}

impl GlobalOptions {
    /// Loop configuration from the environment with flag overrides applied.
    pub fn loop_config(&self) -> Result<LoopConfig, Box<dyn std::error::Error>> {
        let mut config = LoopConfig::from_env()?;
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_call_timeout(timeout_from_secs("--timeout-secs", secs)?);
        }
        config.validate()?;
        Ok(config)
    }
}

/// A quality loop wired to the chosen backend.
pub struct Session {
    pub quality_loop: QualityLoop,
    workspace: Option<Arc<RwLock<Workspace>>>,
    root: PathBuf,
}

impl Session {
    pub fn open(
        options: &GlobalOptions,
        config: LoopConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut workspace = None;

        let collaborators = match options.backend {
            Backend::Local => {
                let shared = Arc::new(RwLock::new(Workspace::load_dir(&options.workspace)?));
                let local = LocalCollaborators::new(shared.clone(), config.quality_threshold);
                workspace = Some(shared);
                Collaborators::shared(Arc::new(local))
            }
            Backend::Http => {
                let http_config = HttpConfig::from_env()?.with_timeout(config.call_timeout);
                Collaborators::shared(Arc::new(HttpCollaborators::new(http_config)?))
            }
            Backend::Mock => Collaborators::shared(Arc::new(
                ScriptedCollaborators::new()
                    .with_threshold(config.quality_threshold)
                    .with_default_score(MOCK_SCORE),
            )),
        };

        info!(backend = %options.backend, "Opened session");
        Ok(Self {
            quality_loop: QualityLoop::new(collaborators, config),
            workspace,
            root: options.workspace.clone(),
        })
    }

    /// Write the local workspace back to disk. A no-op for other backends.
    pub async fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(workspace) = &self.workspace {
            workspace.read().await.save_dir(&self.root)?;
            info!("Saved workspace to {}", self.root.display());
        }
        Ok(())
    }
}

/// Write a result as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    qaloop::store::save_json(value, path)?;
    Ok(())
}
