use crate::config::BackupConfig;
use crate::docker::compose;
use crate::error::{BackupError, Result};
use crate::process::{self, CommandSpec};
use crate::remote;
use crate::stages::database;
use std::fs;
use tracing::{debug, info};

/// Validates, before anything is mutated, that every command and service the
/// enabled stages need is present and reachable. Problems are accumulated
/// rather than returned one at a time, so the operator sees the full list in
/// a single aggregated error.
pub async fn check(config: &BackupConfig) -> Result<()> {
    info!("Running dependency preflight");
    let mut problems: Vec<String> = Vec::new();

    if config.database.enabled {
        require_binary("mysqldump", &mut problems);
        require_binary("gzip", &mut problems);
        if require_binary("mysql", &mut problems) {
            let probe = database::client_probe_spec(&config.database);
            if let Err(e) = process::run(&probe, None).await {
                problems.push(format!("MySQL connectivity probe failed: {}", e));
            }
        }
    }

    if config.docker.enabled {
        if require_binary("docker", &mut problems) {
            let probe = CommandSpec::new("docker", &["ps", "-q"]);
            if let Err(e) = process::run(&probe, None).await {
                problems.push(format!("Docker daemon probe failed: {}", e));
            }
        }
        if config.docker.compose_enabled {
            for pattern in &config.docker.compose_patterns {
                match compose::resolve_pattern(pattern) {
                    Ok(matches) if matches.is_empty() => {
                        problems.push(format!("Compose pattern '{}' matches no files", pattern));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        problems.push(format!("Compose pattern '{}' is invalid: {}", pattern, e));
                    }
                }
            }
        }
    }

    if config.files.enabled {
        require_binary("tar", &mut problems);
        for pair in config.files.path_pairs() {
            if let Err(e) = fs::metadata(&pair.source) {
                problems.push(format!("Source path {:?} is not accessible: {}", pair.source, e));
            }
        }
    }

    // The remote store is required no matter which stages are enabled.
    if require_binary("rclone", &mut problems) {
        if let Err(e) = remote::probe(&config.remote).await {
            problems.push(format!("Remote store probe failed: {}", e));
        }
    }

    if problems.is_empty() {
        info!("Preflight passed");
        Ok(())
    } else {
        Err(BackupError::Preflight(problems.join("\n")))
    }
}

fn require_binary(name: &str, problems: &mut Vec<String>) -> bool {
    match which::which(name) {
        Ok(path) => {
            debug!("Found {} at {:?}", name, path);
            true
        }
        Err(_) => {
            problems.push(format!("Required command '{}' not found on PATH", name));
            false
        }
    }
}
