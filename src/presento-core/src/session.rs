//! Run-scoped tracking of agent sessions.

use crate::backend::{AgentBackend, SessionId};
use crate::error::PresentoError;

/// Every session opened during one run.
///
/// A session is recorded in the same step that creates it, so a failure at
/// any later point still leaves it on the list for [`SessionLedger::release_all`].
#[derive(Debug, Default)]
pub struct SessionLedger {
    sessions: Vec<SessionId>,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session on `backend` and record it.
    pub async fn open(&mut self, backend: &dyn AgentBackend) -> Result<SessionId, PresentoError> {
        let id = backend.create_session().await?;
        self.sessions.push(id.clone());
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Delete every recorded session, continuing past failures.
    ///
    /// Returns the number of sessions that could not be released.
    pub async fn release_all(&mut self, backend: &dyn AgentBackend) -> usize {
        let mut failures = 0;
        for id in self.sessions.drain(..) {
            if let Err(e) = backend.delete_session(&id).await {
                failures += 1;
                let err = match e {
                    e @ PresentoError::ResourceCleanup { .. } => e,
                    other => PresentoError::ResourceCleanup {
                        session: id.to_string(),
                        message: other.to_string(),
                    },
                };
                tracing::warn!(error = %err, "Session cleanup failed");
            }
        }
        failures
    }
}
