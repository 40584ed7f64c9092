use crate::config::BackupConfig;
use crate::error::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Local staging area the stage executors write into before upload. One
/// subdirectory per source type.
#[derive(Debug, Clone)]
pub struct StagingTree {
    root: PathBuf,
}

impl StagingTree {
    pub fn create(root: &Path) -> Result<Self> {
        let tree = Self {
            root: root.to_path_buf(),
        };
        fs::create_dir_all(tree.database_dir())?;
        fs::create_dir_all(tree.compose_dir())?;
        fs::create_dir_all(tree.volumes_dir())?;
        fs::create_dir_all(tree.files_dir())?;
        info!("Staging tree created at {:?}", tree.root);
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_dir(&self) -> PathBuf {
        self.root.join("database")
    }

    pub fn docker_dir(&self) -> PathBuf {
        self.root.join("docker")
    }

    pub fn compose_dir(&self) -> PathBuf {
        self.docker_dir().join("compose")
    }

    pub fn volumes_dir(&self) -> PathBuf {
        self.docker_dir().join("volumes")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    /// Best-effort removal once the run has completed. On fatal errors the
    /// tree is deliberately left behind for inspection.
    pub fn remove(&self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!("Failed to remove staging tree {:?}: {}", self.root, e);
        } else {
            info!("Staging tree removed");
        }
    }
}

/// Run-scoped context handed to every component: resolved configuration, the
/// run tag naming all artifacts of this run, and the staging tree.
#[derive(Debug)]
pub struct RunContext {
    pub config: BackupConfig,
    pub run_tag: String,
    pub staging: StagingTree,
}

impl RunContext {
    pub fn new(config: BackupConfig) -> Result<Self> {
        let run_tag = Local::now().format("%Y%m%d%H%M%S").to_string();
        let staging = StagingTree::create(&config.staging_dir)?;
        Ok(Self {
            config,
            run_tag,
            staging,
        })
    }

    #[cfg(test)]
    pub fn for_tests(config: BackupConfig, run_tag: &str, staging_root: &Path) -> Self {
        Self {
            config,
            run_tag: run_tag.to_string(),
            staging: StagingTree {
                root: staging_root.to_path_buf(),
            },
        }
    }
}
