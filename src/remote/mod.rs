use crate::config::RemoteConfig;
use crate::context::RunContext;
use crate::error::{BackupError, Result};
use crate::process::{self, CommandSpec};
use chrono::{Duration, Local};
use tracing::{info, warn};

/// One entry of the remote base folder listing. The first 8 characters of
/// the folder name carry its `YYYYMMDD` date.
#[derive(Debug, PartialEq)]
pub struct RemoteFolder {
    pub name: String,
    pub date: String,
}

/// Builds an rclone invocation, appending the alternate config file when one
/// is configured.
fn rclone_spec(cfg: &RemoteConfig, args: &[&str]) -> CommandSpec {
    let mut full: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
    if let Some(path) = &cfg.rclone_config {
        full.push("--config".to_string());
        full.push(path.to_string_lossy().into_owned());
    }
    CommandSpec::with_args("rclone", full)
}

fn remote_base(cfg: &RemoteConfig) -> String {
    format!("{}:{}", cfg.remote_name, cfg.base_path)
}

fn copy_spec(cfg: &RemoteConfig, staging: &str, dest: &str) -> CommandSpec {
    rclone_spec(cfg, &["copy", staging, dest, "--progress"])
}

/// Lists the remote root to prove the sync tool, credentials, and remote
/// definition are all usable. Used by the dependency preflight.
pub async fn probe(cfg: &RemoteConfig) -> Result<()> {
    let root = format!("{}:", cfg.remote_name);
    process::run(&rclone_spec(cfg, &["lsd", &root]), None).await?;
    Ok(())
}

/// Creates the dated destination folder and copies the whole staging tree
/// into it. Both steps are fatal: pruning old backups without a confirmed
/// new one would reduce redundancy.
pub async fn upload(ctx: &RunContext) -> Result<()> {
    let cfg = &ctx.config.remote;
    let dest = format!("{}/{}", remote_base(cfg), ctx.run_tag);
    info!("Uploading staging tree to {}", dest);

    process::run(&rclone_spec(cfg, &["mkdir", &dest]), None)
        .await
        .map_err(|e| BackupError::Upload(format!("Failed to create {}: {}", dest, e)))?;

    let staging = ctx.staging.root().to_string_lossy().into_owned();
    process::run(&copy_spec(cfg, &staging, &dest), None)
        .await
        .map_err(|e| BackupError::Upload(format!("Failed to copy staging tree: {}", e)))?;

    info!("Upload to {} complete", dest);
    Ok(())
}

/// Purges remote run folders older than the retention window. Best-effort:
/// listing and deletion failures are logged, never propagated.
pub async fn sweep(ctx: &RunContext) {
    let cfg = &ctx.config.remote;
    let cutoff = cutoff_date(cfg.retention_days);
    let base = remote_base(cfg);
    info!("Sweeping {} for backups older than {}", base, cutoff);

    let listing = match process::run(&rclone_spec(cfg, &["lsd", &base]), None).await {
        Ok(outcome) => outcome.stdout,
        Err(e) => {
            warn!("Remote listing failed, skipping retention sweep: {}", e);
            return;
        }
    };

    for folder in expired(&parse_listing(&listing), &cutoff) {
        let target = format!("{}/{}", base, folder.name);
        info!("Purging expired remote backup {}", target);
        if let Err(e) = process::run(&rclone_spec(cfg, &["purge", &target]), None).await {
            warn!("Failed to purge {}: {}", target, e);
        }
    }
}

/// Parses an `rclone lsd` listing. Lines with fewer than 5 fields, or whose
/// folder name is shorter than 8 characters, are ignored rather than
/// misparsed.
fn parse_listing(stdout: &str) -> Vec<RemoteFolder> {
    let mut folders = Vec::new();
    for line in stdout.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            continue;
        }
        let name = fields[4..].join(" ");
        let date = match name.get(..8) {
            Some(prefix) => prefix.to_string(),
            None => continue,
        };
        folders.push(RemoteFolder { name, date });
    }
    folders
}

fn expired<'a>(folders: &'a [RemoteFolder], cutoff: &str) -> Vec<&'a RemoteFolder> {
    folders
        .iter()
        .filter(|f| f.date.as_str() < cutoff)
        .collect()
}

fn cutoff_date(retention_days: u32) -> String {
    (Local::now() - Duration::days(i64::from(retention_days)))
        .format("%Y%m%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
          -1 2023-01-01 02:00:00        -1 20230101_x
          -1 2023-06-01 02:00:00        -1 20230601_y
          -1 2023-03-15 02:00:00        -1 bad
garbage line
";

    #[test]
    fn test_parse_listing_skips_short_names_and_lines() {
        let folders = parse_listing(LISTING);
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].name, "20230101_x");
        assert_eq!(folders[0].date, "20230101");
        assert_eq!(folders[1].name, "20230601_y");
    }

    #[test]
    fn test_expired_respects_cutoff() {
        let folders = parse_listing(LISTING);
        let purge = expired(&folders, "20230301");
        assert_eq!(purge.len(), 1);
        assert_eq!(purge[0].name, "20230101_x");
    }

    #[test]
    fn test_cutoff_date_shape() {
        let cutoff = cutoff_date(7);
        assert_eq!(cutoff.len(), 8);
        assert!(cutoff.chars().all(|c| c.is_ascii_digit()));
        assert!(cutoff < cutoff_date(0));
    }

    #[test]
    fn test_copy_reports_progress() {
        let cfg = RemoteConfig {
            remote_name: "offsite".to_string(),
            base_path: "backups".to_string(),
            retention_days: 7,
            rclone_config: None,
        };
        let spec = copy_spec(&cfg, "/tmp/staging", "offsite:backups/20230101120000");
        assert_eq!(spec.program, "rclone");
        assert_eq!(spec.args[0], "copy");
        assert!(spec.args.contains(&"--progress".to_string()));
    }

    #[test]
    fn test_rclone_spec_appends_alternate_config() {
        let cfg = RemoteConfig {
            remote_name: "offsite".to_string(),
            base_path: "backups".to_string(),
            retention_days: 7,
            rclone_config: Some("/etc/omnibak/rclone.conf".into()),
        };
        let spec = rclone_spec(&cfg, &["lsd", "offsite:backups"]);
        assert_eq!(spec.program, "rclone");
        assert!(spec.args.contains(&"--config".to_string()));
        assert!(spec.args.contains(&"/etc/omnibak/rclone.conf".to_string()));
    }
}
