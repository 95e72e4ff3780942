//! Admission control for concurrent runs.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::PresentoError;
use crate::orchestrator::{PipelineOrchestrator, RunArtifacts, RunRequest};

/// Caps how many runs execute at once; extra runs wait for a slot.
#[derive(Clone)]
pub struct RunAdmission {
    slots: Arc<Semaphore>,
    limit: usize,
}

impl RunAdmission {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            slots: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots not currently held by a run.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a slot, then run `request` on `orchestrator`.
    pub async fn run(
        &self,
        orchestrator: &PipelineOrchestrator,
        request: RunRequest,
    ) -> Result<RunArtifacts, PresentoError> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| PresentoError::InvalidRequest("admission is closed".to_string()))?;
        orchestrator.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::orchestrator::Backends;
    use crate::testing::{StubAgents, StubImages, StubText};
    use std::time::Duration;

    #[tokio::test]
    async fn test_limit_bounds_overlapping_runs() {
        let dir = tempfile::tempdir().unwrap();
        let text = Arc::new(StubText::new().with_delay(Duration::from_millis(30)));

        let mut config = Config::default();
        config.generation.session_settle_ms = 0;
        config.output.directory = dir.path().to_path_buf();
        let orchestrator = Arc::new(
            PipelineOrchestrator::new(
                config,
                Backends {
                    text: text.clone(),
                    agents: Arc::new(StubAgents::new()),
                    images: Arc::new(StubImages::always_succeeding()),
                    speech: None,
                },
            )
            .unwrap(),
        );

        let admission = RunAdmission::new(2);
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..5 {
            let admission = admission.clone();
            let orchestrator = orchestrator.clone();
            tasks.spawn(async move {
                admission
                    .run(&orchestrator, RunRequest::new(format!("Topic {}", i), 1))
                    .await
            });
        }

        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().is_ok());
        }

        assert_eq!(text.calls(), 5);
        assert!(text.max_active() <= 2);
        assert_eq!(admission.available(), 2);
    }

    #[test]
    fn test_zero_limit_becomes_one() {
        assert_eq!(RunAdmission::new(0).limit(), 1);
    }
}
