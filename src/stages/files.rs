use crate::context::RunContext;
use crate::error::{BackupError, Result};
use crate::process::{self, CommandSpec};
use std::path::Path;
use tracing::info;

/// Archives every configured `source:name` pair into the staging tree.
/// Malformed pairs were already skipped with a diagnostic during parsing.
/// Unlike the database and docker stages, an archive failure here aborts the
/// whole run: the configured file paths are the primary backup target.
pub async fn run(ctx: &RunContext) -> Result<()> {
    let cfg = &ctx.config.files;
    if !cfg.enabled {
        info!("Files stage disabled, skipping");
        return Ok(());
    }

    info!("Starting files stage");
    for pair in cfg.path_pairs() {
        let artifact = ctx
            .staging
            .files_dir()
            .join(format!("{}_{}.tar.gz", pair.name, ctx.run_tag));

        let parent = pair.source.parent().unwrap_or_else(|| Path::new("/"));
        let base = pair.source.file_name().ok_or_else(|| {
            BackupError::Config(format!("Source path {:?} has no base name", pair.source))
        })?;

        let tar = CommandSpec::with_args(
            "tar",
            vec![
                "-czf".to_string(),
                artifact.to_string_lossy().into_owned(),
                "-C".to_string(),
                parent.to_string_lossy().into_owned(),
                base.to_string_lossy().into_owned(),
            ],
        );
        process::run(&tar, None).await?;
        info!("Archived {:?} as {}_{}.tar.gz", pair.source, pair.name, ctx.run_tag);
    }
    info!("Files stage complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackupConfig, FilesConfig, RemoteConfig};
    use crate::context::StagingTree;
    use std::fs;
    use tempfile::tempdir;

    fn base_config(files: FilesConfig) -> BackupConfig {
        BackupConfig {
            remote: RemoteConfig {
                remote_name: "offsite".to_string(),
                base_path: "backups".to_string(),
                retention_days: 7,
                rclone_config: None,
            },
            database: Default::default(),
            docker: Default::default(),
            files,
            staging_dir: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_archives_each_pair_and_skips_malformed() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging");
        StagingTree::create(&staging).unwrap();

        let source = dir.path().join("project");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("data.txt"), "content").unwrap();

        let config = base_config(FilesConfig {
            enabled: true,
            paths: vec![
                format!("{}:project", source.display()),
                "not-a-pair".to_string(),
            ],
        });
        let ctx = RunContext::for_tests(config, "20230101120000", &staging);

        run(&ctx).await.unwrap();

        let artifact = ctx.staging.files_dir().join("project_20230101120000.tar.gz");
        assert!(artifact.is_file());
        assert!(fs::metadata(&artifact).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging");
        StagingTree::create(&staging).unwrap();

        let config = base_config(FilesConfig {
            enabled: true,
            paths: vec![format!("{}/does-not-exist:gone", dir.path().display())],
        });
        let ctx = RunContext::for_tests(config, "20230101120000", &staging);

        assert!(run(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_stage_is_a_no_op() {
        let dir = tempdir().unwrap();
        let config = base_config(FilesConfig::default());
        let ctx = RunContext::for_tests(config, "20230101120000", dir.path());

        run(&ctx).await.unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
