use crate::error::{BackupError, Result};
use crate::process::WORKDIR;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info};

/// Upper bound on how much child stdout is kept in memory for logging.
const CAPTURE_LIMIT: usize = 64 * 1024;
/// Outputs at or above this size are logged as elided instead of dumped.
const LOG_LIMIT: usize = 1000;

/// One external command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    pub fn with_args(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }

    /// Command line safe to log. Redaction is keyed by command name: each
    /// command known to take a secret on its command line gets its own rule
    /// here, extended per command rather than pattern-matched generically.
    pub fn sanitized(&self) -> String {
        let name = Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program);

        let args: Vec<String> = match name {
            "mysql" | "mysqldump" => self
                .args
                .iter()
                .map(|a| {
                    if a.starts_with("-p") && a.len() > 2 {
                        "-p******".to_string()
                    } else if a.starts_with("--password=") {
                        "--password=******".to_string()
                    } else {
                        a.clone()
                    }
                })
                .collect(),
            _ => self.args.clone(),
        };

        if args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, args.join(" "))
        }
    }
}

/// Result of one completed external process.
#[derive(Debug)]
pub struct CommandOutcome {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Runs an external command to completion. With an output file, the child's
/// stdout is streamed to that file and mirrored into the bounded in-memory
/// buffer; without one it is captured to memory only. Stderr is always
/// captured. A non-zero exit becomes an error carrying the sanitized command
/// line and stderr (falling back to the exit status when stderr is empty).
pub async fn run(spec: &CommandSpec, output_file: Option<&Path>) -> Result<CommandOutcome> {
    let start = Instant::now();
    debug!("Running: {}", spec.sanitized());

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(WORKDIR)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackupError::Command(format!("Failed to spawn {}: {}", spec.sanitized(), e)))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| BackupError::Command("Child stdout was not captured".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| BackupError::Command("Child stderr was not captured".to_string()))?;

    let stdout_fut = async {
        let mut mirror: Vec<u8> = Vec::new();
        let mut file = match output_file {
            Some(path) => Some(tokio::fs::File::create(path).await?),
            None => None,
        };
        let mut chunk = vec![0u8; 8192];
        loop {
            let n = stdout_pipe.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            if let Some(file) = file.as_mut() {
                file.write_all(&chunk[..n]).await?;
            }
            if mirror.len() < CAPTURE_LIMIT {
                let take = (CAPTURE_LIMIT - mirror.len()).min(n);
                mirror.extend_from_slice(&chunk[..take]);
            }
        }
        if let Some(file) = file.as_mut() {
            file.flush().await?;
        }
        Ok::<_, std::io::Error>(mirror)
    };

    let stderr_fut = async {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await?;
        Ok::<_, std::io::Error>(buf)
    };

    let (stdout_buf, stderr_buf) = tokio::join!(stdout_fut, stderr_fut);
    let status = child.wait().await?;

    let stdout = String::from_utf8_lossy(&stdout_buf?).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_buf?).into_owned();
    let duration = start.elapsed();

    if stdout.len() >= LOG_LIMIT {
        info!(
            "{} finished in {:.2}s, stdout ({} bytes, elided)",
            spec.sanitized(),
            duration.as_secs_f64(),
            stdout.len()
        );
    } else if stdout.trim().is_empty() {
        info!("{} finished in {:.2}s", spec.sanitized(), duration.as_secs_f64());
    } else {
        info!(
            "{} finished in {:.2}s: {}",
            spec.sanitized(),
            duration.as_secs_f64(),
            stdout.trim()
        );
    }

    if !status.success() {
        let detail = if stderr.trim().is_empty() {
            status.to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(BackupError::Command(format!(
            "{} failed: {}",
            spec.sanitized(),
            detail
        )));
    }

    Ok(CommandOutcome {
        code: status.code(),
        stdout,
        stderr,
        duration,
    })
}
