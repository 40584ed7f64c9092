use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Which items of a source a stage should back up: an explicit list, or
/// everything the source reports. The single-element list `["all"]` in the
/// config file means everything.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    AllAvailable,
    Explicit(Vec<String>),
}

impl Selector {
    pub fn from_list(list: &[String]) -> Self {
        if list.len() == 1 && list[0] == "all" {
            Selector::AllAvailable
        } else {
            Selector::Explicit(list.to_vec())
        }
    }
}

/// A `source:name` entry from the files section. `source` is the path to
/// archive, `name` the logical name of the resulting artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPair {
    pub source: PathBuf,
    pub name: String,
}

impl PathPair {
    /// Parses one configured entry. Entries that are not exactly two
    /// colon-separated fields are rejected with a diagnostic, never
    /// silently dropped.
    pub fn parse(entry: &str) -> Option<Self> {
        let fields: Vec<&str> = entry.split(':').collect();
        match fields.as_slice() {
            [source, name] if !source.is_empty() && !name.is_empty() => Some(Self {
                source: PathBuf::from(source),
                name: (*name).to_string(),
            }),
            _ => {
                warn!("Skipping malformed path entry '{}' (expected source:name)", entry);
                None
            }
        }
    }
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub remote_name: String,
    pub base_path: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default)]
    pub rclone_config: Option<PathBuf>,
}

fn default_retention_days() -> u32 {
    7
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub host: String,
    /// Port 0 means "use the client default / local socket".
    pub port: u16,
    pub user: String,
    /// Empty means "connect without a password flag".
    pub password: String,
    pub databases: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            databases: vec!["all".to_string()],
        }
    }
}

impl DatabaseConfig {
    pub fn selector(&self) -> Selector {
        Selector::from_list(&self.databases)
    }
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    pub enabled: bool,
    pub containers: Vec<String>,
    #[serde(default)]
    pub compose_enabled: bool,
    #[serde(default)]
    pub compose_patterns: Vec<String>,
    #[serde(default)]
    pub volumes_enabled: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            containers: vec!["all".to_string()],
            compose_enabled: false,
            compose_patterns: Vec::new(),
            volumes_enabled: false,
        }
    }
}

impl DockerConfig {
    pub fn selector(&self) -> Selector {
        Selector::from_list(&self.containers)
    }
}
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesConfig {
    pub enabled: bool,
    #[serde(default)]
    pub paths: Vec<String>,
}

impl FilesConfig {
    /// Well-formed `source:name` pairs; malformed entries are logged and
    /// dropped here.
    pub fn path_pairs(&self) -> Vec<PathPair> {
        self.paths.iter().filter_map(|p| PathPair::parse(p)).collect()
    }
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("/tmp/omnibak_staging")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_from_list() {
        assert_eq!(
            Selector::from_list(&["all".to_string()]),
            Selector::AllAvailable
        );
        assert_eq!(
            Selector::from_list(&["a".to_string(), "b".to_string()]),
            Selector::Explicit(vec!["a".to_string(), "b".to_string()])
        );
        // "all" alongside other names is taken literally
        assert_eq!(
            Selector::from_list(&["all".to_string(), "b".to_string()]),
            Selector::Explicit(vec!["all".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_path_pair_parse() {
        let pair = PathPair::parse("/var/www:www").unwrap();
        assert_eq!(pair.source, PathBuf::from("/var/www"));
        assert_eq!(pair.name, "www");

        assert!(PathPair::parse("/var/www").is_none());
        assert!(PathPair::parse("a:b:c").is_none());
        assert!(PathPair::parse(":name").is_none());
        assert!(PathPair::parse("/src:").is_none());
    }

    #[test]
    fn test_malformed_pairs_are_skipped() {
        let files = FilesConfig {
            enabled: true,
            paths: vec![
                "/etc:etc".to_string(),
                "broken".to_string(),
                "/home:home".to_string(),
            ],
        };
        let pairs = files.path_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].name, "etc");
        assert_eq!(pairs[1].name, "home");
    }
}
