use crate::error::{BackupError, Result};
use crate::process::{CommandSpec, WORKDIR};
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs `first | second > output_file` without a temporary file: the first
/// command's stdout feeds the second's stdin through an in-process pipe, and
/// the second's stdout goes to the file. Both stderrs are captured.
///
/// Failure is judged by the second command's exit status alone. A non-zero
/// first command is logged but not surfaced unless it starves the second of
/// input; the error for a failing second command combines both stderrs when
/// either is non-empty.
pub async fn run_piped(
    first: &CommandSpec,
    second: &CommandSpec,
    output_file: &Path,
) -> Result<()> {
    let start = Instant::now();
    debug!(
        "Running: {} | {} > {:?}",
        first.sanitized(),
        second.sanitized(),
        output_file
    );

    let mut upstream = Command::new(&first.program)
        .args(&first.args)
        .current_dir(WORKDIR)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackupError::Command(format!("Failed to spawn {}: {}", first.sanitized(), e)))?;

    let out_file = std::fs::File::create(output_file)?;
    let mut downstream = Command::new(&second.program)
        .args(&second.args)
        .current_dir(WORKDIR)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(out_file))
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackupError::Command(format!("Failed to spawn {}: {}", second.sanitized(), e)))?;

    let mut up_out = upstream
        .stdout
        .take()
        .ok_or_else(|| BackupError::Command("Upstream stdout was not captured".to_string()))?;
    let mut up_err = upstream
        .stderr
        .take()
        .ok_or_else(|| BackupError::Command("Upstream stderr was not captured".to_string()))?;
    let mut down_in = downstream
        .stdin
        .take()
        .ok_or_else(|| BackupError::Command("Downstream stdin was not captured".to_string()))?;

    // Pump upstream stdout into downstream stdin while draining upstream
    // stderr, so a chatty upstream cannot fill the stderr pipe and stall the
    // copy mid-stream. The stdin handle is dropped once the copy ends so the
    // downstream command observes end-of-input; only then is the upstream
    // exit collected.
    let pump = tokio::spawn(async move {
        let copy_fut = async {
            let copied = tokio::io::copy(&mut up_out, &mut down_in).await;
            drop(down_in);
            copied
        };
        let stderr_fut = async {
            let mut buf = Vec::new();
            let _ = up_err.read_to_end(&mut buf).await;
            buf
        };
        let (copied, stderr_buf) = tokio::join!(copy_fut, stderr_fut);
        let status = upstream.wait().await;
        (copied, status, stderr_buf)
    });

    let down_output = downstream.wait_with_output().await?;
    let (copied, up_status, up_stderr_buf) = pump
        .await
        .map_err(|e| BackupError::Command(format!("Pipe pump task failed: {}", e)))?;

    let up_stderr = String::from_utf8_lossy(&up_stderr_buf).into_owned();
    match &up_status {
        Ok(status) if !status.success() => {
            warn!(
                "{} exited with {} while feeding {}",
                first.sanitized(),
                status,
                second.sanitized()
            );
        }
        Err(e) => {
            warn!("Failed to collect exit of {}: {}", first.sanitized(), e);
        }
        Ok(_) => {}
    }
    let down_stderr = String::from_utf8_lossy(&down_output.stderr).into_owned();

    if !down_output.status.success() {
        let mut detail = String::new();
        if !up_stderr.trim().is_empty() {
            detail.push_str(up_stderr.trim());
        }
        if !down_stderr.trim().is_empty() {
            if !detail.is_empty() {
                detail.push('\n');
            }
            detail.push_str(down_stderr.trim());
        }
        if detail.is_empty() {
            detail = down_output.status.to_string();
        }
        return Err(BackupError::Command(format!(
            "{} | {} failed: {}",
            first.sanitized(),
            second.sanitized(),
            detail
        )));
    }

    info!(
        "{} | {} completed in {:.2}s ({} bytes piped)",
        first.sanitized(),
        second.sanitized(),
        start.elapsed().as_secs_f64(),
        copied.unwrap_or(0)
    );
    Ok(())
}
