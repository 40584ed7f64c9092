use crate::config::{DatabaseConfig, Selector};
use crate::context::RunContext;
use crate::error::Result;
use crate::process::{run_piped, CommandSpec};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Dumps the configured databases into the staging tree, each dump piped
/// through gzip. One database's failure is logged and skipped; the stage
/// itself never aborts the run.
pub async fn run(ctx: &RunContext) -> Result<()> {
    let cfg = &ctx.config.database;
    if !cfg.enabled {
        info!("Database stage disabled, skipping");
        return Ok(());
    }

    info!("Starting database stage");
    let entries = plan(cfg, &ctx.run_tag);
    let total = entries.len();
    let dir = ctx.staging.database_dir();
    let produced = attempt_each(entries, &dir, |database, path| async move {
        dump(cfg, database.as_deref(), &path).await
    })
    .await;
    info!("Database stage complete ({} of {} dumps succeeded)", produced.len(), total);
    Ok(())
}

/// Attempts every planned dump in order, logging and skipping failures so
/// one database cannot abort its siblings. Returns the artifacts produced.
async fn attempt_each<F, Fut>(
    entries: Vec<(Option<String>, String)>,
    dir: &Path,
    mut attempt: F,
) -> Vec<String>
where
    F: FnMut(Option<String>, PathBuf) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut produced = Vec::new();
    for (database, artifact) in entries {
        let path = dir.join(&artifact);
        match attempt(database.clone(), path).await {
            Ok(()) => produced.push(artifact),
            Err(e) => match &database {
                Some(name) => error!("Dump of database {} failed, skipping: {}", name, e),
                None => error!("All-databases dump failed: {}", e),
            },
        }
    }
    produced
}

/// One entry per artifact to produce: `None` means an all-databases dump.
fn plan(cfg: &DatabaseConfig, run_tag: &str) -> Vec<(Option<String>, String)> {
    match cfg.selector() {
        Selector::AllAvailable => {
            vec![(None, format!("all_databases_{}.sql.gz", run_tag))]
        }
        Selector::Explicit(databases) => databases
            .into_iter()
            .map(|db| {
                let artifact = format!("{}_{}.sql.gz", db, run_tag);
                (Some(db), artifact)
            })
            .collect(),
    }
}

async fn dump(cfg: &DatabaseConfig, database: Option<&str>, artifact: &Path) -> Result<()> {
    let gzip = CommandSpec::new("gzip", &["-c"]);
    run_piped(&dump_spec(cfg, database), &gzip, artifact).await
}

fn dump_spec(cfg: &DatabaseConfig, database: Option<&str>) -> CommandSpec {
    let mut args = connection_args(cfg);
    match database {
        Some(db) => args.push(db.to_string()),
        None => args.push("--all-databases".to_string()),
    }
    CommandSpec::with_args("mysqldump", args)
}

/// Trivial-query probe used by the preflight to prove connectivity.
pub fn client_probe_spec(cfg: &DatabaseConfig) -> CommandSpec {
    let mut args = connection_args(cfg);
    args.push("-e".to_string());
    args.push("SELECT 1".to_string());
    CommandSpec::with_args("mysql", args)
}

fn connection_args(cfg: &DatabaseConfig) -> Vec<String> {
    let mut args = vec!["-h".to_string(), cfg.host.clone()];
    if cfg.port > 0 {
        // An explicit port must not silently fall back to the local socket.
        args.push("-P".to_string());
        args.push(cfg.port.to_string());
        args.push("--protocol=TCP".to_string());
    }
    args.push("-u".to_string());
    args.push(cfg.user.clone());
    if !cfg.password.is_empty() {
        args.push(format!("-p{}", cfg.password));
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(databases: &[&str], password: &str, port: u16) -> DatabaseConfig {
        DatabaseConfig {
            enabled: true,
            host: "localhost".to_string(),
            port,
            user: "root".to_string(),
            password: password.to_string(),
            databases: databases.iter().map(|d| (*d).to_string()).collect(),
        }
    }

    #[test]
    fn test_plan_all_databases_is_one_artifact() {
        let plan = plan(&config(&["all"], "", 3306), "20230101120000");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].0, None);
        assert_eq!(plan[0].1, "all_databases_20230101120000.sql.gz");
    }

    #[test]
    fn test_plan_explicit_list_is_one_artifact_each() {
        let plan = plan(&config(&["a", "b"], "", 3306), "20230101120000");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].0.as_deref(), Some("a"));
        assert_eq!(plan[0].1, "a_20230101120000.sql.gz");
        assert_eq!(plan[1].0.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_failed_dump_does_not_abort_later_databases() {
        use crate::error::BackupError;
        use std::cell::RefCell;

        let dir = tempfile::tempdir().unwrap();
        let entries = plan(&config(&["a", "b"], "", 3306), "20230101120000");
        let attempted = RefCell::new(Vec::new());

        let produced = attempt_each(entries, dir.path(), |database, _path| {
            attempted.borrow_mut().push(database.clone());
            async move {
                if database.as_deref() == Some("a") {
                    Err(BackupError::Command("forced dump failure".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(
            *attempted.borrow(),
            vec![Some("a".to_string()), Some("b".to_string())]
        );
        assert_eq!(produced, vec!["b_20230101120000.sql.gz".to_string()]);
    }

    #[test]
    fn test_dump_spec_all_databases() {
        let spec = dump_spec(&config(&["all"], "pw", 3306), None);
        assert_eq!(spec.program, "mysqldump");
        assert!(spec.args.contains(&"--all-databases".to_string()));
        assert!(spec.args.contains(&"--protocol=TCP".to_string()));
        assert!(spec.args.contains(&"-ppw".to_string()));
    }

    #[test]
    fn test_no_password_flag_when_password_empty() {
        let spec = client_probe_spec(&config(&["all"], "", 3306));
        assert!(!spec.args.iter().any(|a| a.starts_with("-p") && a != "-P"));
    }

    #[test]
    fn test_port_zero_omits_tcp_forcing() {
        let spec = client_probe_spec(&config(&["all"], "", 0));
        assert!(!spec.args.contains(&"--protocol=TCP".to_string()));
        assert!(!spec.args.contains(&"-P".to_string()));
    }
}
