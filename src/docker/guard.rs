use crate::config::Selector;
use crate::docker;
use std::mem;
use tracing::{error, info, warn};

/// Keeps the set of containers this run actually paused and guarantees each
/// is resumed exactly once. The explicit `resume_all` call drains the set, so
/// the Drop fallback only acts when a run unwinds between pausing and that
/// call. Only this guard may pause or resume containers during a run.
#[derive(Debug)]
pub struct PauseGuard {
    paused: Vec<String>,
}

impl PauseGuard {
    /// Pauses every container the selector resolves to within the given
    /// scope. A pause failure is logged and excludes that container from the
    /// resume set; it does not abort the others.
    pub async fn pause_all(selector: &Selector, scope: docker::ContainerScope) -> Self {
        let containers = match docker::resolve_containers(selector, scope).await {
            Ok(containers) => containers,
            Err(e) => {
                error!("Failed to resolve containers to pause: {}", e);
                return Self { paused: Vec::new() };
            }
        };

        let mut paused = Vec::new();
        for name in containers {
            match docker::pause(&name).await {
                Ok(()) => {
                    info!("Paused container {}", name);
                    paused.push(name);
                }
                Err(e) => {
                    warn!("Failed to pause container {}, excluding from resume: {}", name, e);
                }
            }
        }
        Self { paused }
    }

    pub fn paused(&self) -> &[String] {
        &self.paused
    }

    /// Resumes everything this guard paused. Resume failures are logged and
    /// never escalated. Draining the set makes a second call a no-op.
    pub async fn resume_all(&mut self) {
        for name in mem::take(&mut self.paused) {
            match docker::unpause(&name).await {
                Ok(()) => info!("Resumed container {}", name),
                Err(e) => warn!("Failed to resume container {}: {}", name, e),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn with_paused(paused: Vec<String>) -> Self {
        Self { paused }
    }
}

impl Drop for PauseGuard {
    /// Safety net for abnormal exits between pause and the explicit resume
    /// point. Synchronous because Drop cannot await; a no-op when
    /// `resume_all` already ran.
    fn drop(&mut self) {
        for name in mem::take(&mut self.paused) {
            warn!("Resuming container {} from unwind fallback", name);
            let status = std::process::Command::new("docker")
                .args(["unpause", &name])
                .status();
            if let Err(e) = status {
                warn!("Fallback unpause of {} failed: {}", name, e);
            }
        }
    }
}
