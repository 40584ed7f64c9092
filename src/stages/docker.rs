use crate::context::RunContext;
use crate::docker::{self, compose};
use crate::error::Result;
use crate::process::{self, CommandSpec};
use tracing::{error, info, warn};

/// Snapshots the selected containers (inspect metadata + filesystem export),
/// copies matched compose files, and archives volume data. Every item is
/// independently tolerant: one container, compose file, or volume failing is
/// logged and skipped.
pub async fn run(ctx: &RunContext) -> Result<()> {
    let cfg = &ctx.config.docker;
    if !cfg.enabled {
        info!("Docker stage disabled, skipping");
        return Ok(());
    }

    info!("Starting docker stage");
    // Stopped containers are snapshotted too; export does not need them
    // running.
    let containers = match docker::resolve_containers(&cfg.selector(), docker::ContainerScope::All).await {
        Ok(containers) => containers,
        Err(e) => {
            error!("Failed to resolve containers to back up: {}", e);
            Vec::new()
        }
    };

    for name in &containers {
        let inspect_path = ctx
            .staging
            .docker_dir()
            .join(format!("{}_inspect_{}.json", name, ctx.run_tag));
        if let Err(e) = docker::inspect_to_file(name, &inspect_path).await {
            error!("Inspect of container {} failed, skipping: {}", name, e);
            continue;
        }

        let export_path = ctx
            .staging
            .docker_dir()
            .join(format!("{}_{}.tar", name, ctx.run_tag));
        if let Err(e) = docker::export_to_file(name, &export_path).await {
            error!("Export of container {} failed, skipping: {}", name, e);
            continue;
        }
        info!("Snapshotted container {}", name);
    }

    if cfg.compose_enabled {
        backup_compose_files(ctx);
    }

    if cfg.volumes_enabled {
        backup_volumes(ctx).await;
    }

    info!("Docker stage complete");
    Ok(())
}

fn backup_compose_files(ctx: &RunContext) {
    let dest = ctx.staging.compose_dir();
    for pattern in &ctx.config.docker.compose_patterns {
        let matches = match compose::resolve_pattern(pattern) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Skipping compose pattern '{}': {}", pattern, e);
                continue;
            }
        };
        if matches.is_empty() {
            warn!("Compose pattern '{}' matched no files", pattern);
            continue;
        }
        for path in matches {
            match compose::copy_into(&dest, &path) {
                Ok(copied) => info!("Copied compose file {:?} to {:?}", path, copied),
                Err(e) => warn!("Failed to copy compose file {:?}: {}", path, e),
            }
        }
    }
}

async fn backup_volumes(ctx: &RunContext) {
    let volumes = match docker::list_volumes().await {
        Ok(volumes) => volumes,
        Err(e) => {
            error!("Failed to list volumes: {}", e);
            return;
        }
    };

    for volume in volumes {
        let mountpoint = match docker::volume_mountpoint(&volume).await {
            Ok(mountpoint) => mountpoint,
            Err(e) => {
                error!("Failed to resolve mountpoint of volume {}, skipping: {}", volume, e);
                continue;
            }
        };

        let artifact = ctx
            .staging
            .volumes_dir()
            .join(format!("{}_{}.tar.gz", volume, ctx.run_tag));
        let tar = CommandSpec::with_args(
            "tar",
            vec![
                "-czf".to_string(),
                artifact.to_string_lossy().into_owned(),
                "-C".to_string(),
                mountpoint,
                ".".to_string(),
            ],
        );
        match process::run(&tar, None).await {
            Ok(_) => info!("Archived volume {}", volume),
            Err(e) => error!("Archive of volume {} failed, skipping: {}", volume, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackupConfig, DockerConfig, RemoteConfig};
    use tempfile::tempdir;

    fn base_config(docker: DockerConfig) -> BackupConfig {
        BackupConfig {
            remote: RemoteConfig {
                remote_name: "offsite".to_string(),
                base_path: "backups".to_string(),
                retention_days: 7,
                rclone_config: None,
            },
            database: Default::default(),
            docker,
            files: Default::default(),
            staging_dir: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_disabled_stage_is_a_no_op() {
        let dir = tempdir().unwrap();
        let config = base_config(DockerConfig::default());
        let ctx = RunContext::for_tests(config, "20230101120000", dir.path());

        run(&ctx).await.unwrap();
        // Nothing was created under the staging root.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_compose_files_are_copied_into_staging() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging");
        let src = dir.path().join("apps");
        std::fs::create_dir_all(src.join("web")).unwrap();
        std::fs::write(src.join("web/docker-compose.yml"), "services:\n").unwrap();

        let config = base_config(DockerConfig {
            enabled: true,
            containers: Vec::new(),
            compose_enabled: true,
            compose_patterns: vec![format!("{}/*/docker-compose.yml", src.display())],
            volumes_enabled: false,
        });
        let ctx = RunContext::for_tests(config, "20230101120000", &staging);
        crate::context::StagingTree::create(&staging).unwrap();

        run(&ctx).await.unwrap();

        let copied = ctx.staging.compose_dir().join("docker-compose.yml");
        assert!(copied.is_file());
    }
}
