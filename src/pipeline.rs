use crate::config::BackupConfig;
use crate::context::RunContext;
use crate::docker::guard::PauseGuard;
use crate::docker::ContainerScope;
use crate::error::Result;
use crate::{preflight, remote, stages};
use std::time::Instant;
use tracing::info;

/// Runs one full backup: preflight, staging, paused snapshots, upload, and
/// retention sweep, in that order. Preflight, upload, and files-stage errors
/// are fatal; everything else is logged and the run continues.
pub async fn run(config: BackupConfig) -> Result<()> {
    let start = Instant::now();

    preflight::check(&config).await?;

    let ctx = RunContext::new(config)?;
    info!("Backup run {} starting", ctx.run_tag);

    let mut guard = if ctx.config.docker.enabled {
        Some(PauseGuard::pause_all(&ctx.config.docker.selector(), ContainerScope::Running).await)
    } else {
        None
    };

    run_local_stages(&ctx, &mut guard).await?;

    remote::upload(&ctx).await?;
    remote::sweep(&ctx).await;

    ctx.staging.remove();
    info!(
        "Backup run {} finished in {:.0}s",
        ctx.run_tag,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Local snapshot phase. Containers stay paused across all three stages so
/// bind-mounted paths archived by the files stage are captured in the same
/// consistent state as the container exports; they resume before the slow
/// network upload. The guard's Drop covers any unwind before the explicit
/// resume.
async fn run_local_stages(ctx: &RunContext, guard: &mut Option<PauseGuard>) -> Result<()> {
    stages::database::run(ctx).await?;
    stages::docker::run(ctx).await?;
    stages::files::run(ctx).await?;

    if let Some(guard) = guard.as_mut() {
        guard.resume_all().await;
    }
    Ok(())
}
