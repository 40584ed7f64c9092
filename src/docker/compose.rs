use crate::error::{BackupError, Result};
use globset::GlobBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expands one compose-file glob pattern against the filesystem. The literal
/// leading components become the walk root; the remainder is matched with
/// shell-style glob semantics (`*` does not cross directory separators,
/// `**` does). Returns the matched files sorted, possibly empty; an invalid
/// pattern is an error so callers can report it individually.
pub fn resolve_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let (base, rest) = split_literal_prefix(pattern);

    if rest.is_empty() {
        return Ok(if base.is_file() { vec![base] } else { Vec::new() });
    }

    let matcher = GlobBuilder::new(&rest)
        .literal_separator(true)
        .build()
        .map_err(|e| BackupError::Config(format!("Invalid glob '{}': {}", pattern, e)))?
        .compile_matcher();

    let mut matches = Vec::new();
    for entry in WalkDir::new(&base).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(stripped) = entry.path().strip_prefix(&base) {
            if matcher.is_match(stripped) {
                matches.push(entry.path().to_path_buf());
            }
        }
    }
    matches.sort();
    Ok(matches)
}

/// Copies a matched compose file into the staging subdirectory, suffixing the
/// name when two patterns match files with the same basename.
pub fn copy_into(dest_dir: &Path, source: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| BackupError::Config(format!("Path {:?} has no file name", source)))?
        .to_string_lossy()
        .into_owned();

    let mut dest = dest_dir.join(&file_name);
    let mut counter = 1;
    while dest.exists() {
        dest = dest_dir.join(format!("{}_{}", counter, file_name));
        counter += 1;
    }
    fs::copy(source, &dest)?;
    Ok(dest)
}

fn split_literal_prefix(pattern: &str) -> (PathBuf, String) {
    let mut base = PathBuf::new();
    let mut rest: Vec<String> = Vec::new();
    let mut in_glob = false;

    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        if !in_glob && !text.contains(['*', '?', '[', '{']) {
            base.push(component);
        } else {
            in_glob = true;
            rest.push(text.into_owned());
        }
    }

    if base.as_os_str().is_empty() {
        base = PathBuf::from(".");
    }
    (base, rest.join("/"))
}
