pub mod compose;
pub mod guard;

use crate::config::Selector;
use crate::error::Result;
use crate::process::{run, CommandSpec};
use std::path::Path;

/// Which containers a listing covers. Snapshots cover every container
/// (`docker export` works on stopped ones too); only running containers can
/// be paused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContainerScope {
    Running,
    All,
}

fn ps_args(scope: ContainerScope) -> Vec<&'static str> {
    match scope {
        ContainerScope::Running => vec!["ps", "--format", "{{.Names}}"],
        ContainerScope::All => vec!["ps", "-a", "--format", "{{.Names}}"],
    }
}

pub async fn list_containers(scope: ContainerScope) -> Result<Vec<String>> {
    let spec = CommandSpec::new("docker", &ps_args(scope));
    let outcome = run(&spec, None).await?;
    Ok(lines(&outcome.stdout))
}

pub async fn resolve_containers(selector: &Selector, scope: ContainerScope) -> Result<Vec<String>> {
    match selector {
        Selector::AllAvailable => list_containers(scope).await,
        Selector::Explicit(names) => Ok(names.clone()),
    }
}

pub async fn pause(name: &str) -> Result<()> {
    run(&CommandSpec::new("docker", &["pause", name]), None).await?;
    Ok(())
}

pub async fn unpause(name: &str) -> Result<()> {
    run(&CommandSpec::new("docker", &["unpause", name]), None).await?;
    Ok(())
}

pub async fn inspect_to_file(name: &str, path: &Path) -> Result<()> {
    run(&CommandSpec::new("docker", &["inspect", name]), Some(path)).await?;
    Ok(())
}

pub async fn export_to_file(name: &str, path: &Path) -> Result<()> {
    run(&CommandSpec::new("docker", &["export", name]), Some(path)).await?;
    Ok(())
}

pub async fn list_volumes() -> Result<Vec<String>> {
    let spec = CommandSpec::new("docker", &["volume", "ls", "-q"]);
    let outcome = run(&spec, None).await?;
    Ok(lines(&outcome.stdout))
}

pub async fn volume_mountpoint(name: &str) -> Result<String> {
    let spec = CommandSpec::new(
        "docker",
        &["volume", "inspect", "--format", "{{.Mountpoint}}", name],
    );
    let outcome = run(&spec, None).await?;
    Ok(outcome.stdout.trim().to_string())
}

fn lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ps_args_include_stopped_containers_only_for_all_scope() {
        assert_eq!(
            ps_args(ContainerScope::All),
            vec!["ps", "-a", "--format", "{{.Names}}"]
        );
        assert_eq!(
            ps_args(ContainerScope::Running),
            vec!["ps", "--format", "{{.Names}}"]
        );
    }

    #[test]
    fn test_lines_filters_blank_output() {
        assert_eq!(
            lines("web\n\n db \n"),
            vec!["web".to_string(), "db".to_string()]
        );
        assert!(lines("\n\n").is_empty());
    }
}
