//! Waiting helpers for asynchronous tests.

use crate::config::OrchestratorConfig;
use crate::core::PollResponse;
use crate::orchestrator::GenerationOrchestrator;
use crate::polling::PollPolicy;
use std::time::{Duration, Instant};

/// Configuration with millisecond polling, suited to tests.
#[must_use]
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_polling(PollPolicy::every(Duration::from_millis(2)))
        .with_stage2_timeout(Duration::from_secs(5))
        .with_shutdown_grace(Duration::from_secs(2))
}

/// Polls `id` until it reaches `done` or `failed`, or `timeout` passes.
///
/// Returns the last response seen.
pub async fn wait_for_terminal(
    orchestrator: &GenerationOrchestrator,
    id: &str,
    timeout: Duration,
) -> PollResponse {
    let deadline = Instant::now() + timeout;
    loop {
        let response = orchestrator.poll(id);
        if response.status.is_terminal() || Instant::now() >= deadline {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
