//! Gate evaluator and the coordinating owner of gate state.
//!
//! [`Gatekeeper`] owns the [`SessionRegistry`] and is the only component that
//! transitions a session between locked and unlocked. Host lifecycle events,
//! pre-execution gate checks, and the exposed tools all go through it.
//!
//! The registry caches repository ground truth. A locked session is always
//! re-checked against the live description and diff before a gated tool is
//! denied, so checkpoints created by hand outside the agent's tool calls are
//! honored.

use std::sync::Arc;
use std::time::Duration;

use jjgate_types::{GateState, GatedTool, SessionId};
use tokio::sync::Mutex;

use crate::config::VcsSettings;
use crate::probe::VcsProbe;
use crate::registry::SessionRegistry;
use crate::vcs::{VcsDriver, VcsError, VcsFut, bounded};

/// Grace added to the driver timeout for the outer probe bound.
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// Why a tool call was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The tool is not in the gated set.
    Ungated,
    /// The registry already had the session unlocked.
    Unlocked,
    /// The registry said locked but the repository shows work in progress.
    Reconciled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error(
        "Blocked `{tool}`: create a checkpoint before editing.\n\n\
         Call the `jj` tool with a description of what you're about to do:\n\n    \
         jj(description: \"Add retry to the upload client\")\n\n\
         This opens a new jj change so every edit is tracked and can be undone with `jj undo`."
    )]
    Locked { session: SessionId, tool: GatedTool },
}

/// A base ref that `jj new` rejected.
#[derive(Debug, Clone)]
pub struct CheckpointAttempt {
    pub base: String,
    pub error: VcsError,
}

pub struct Gatekeeper {
    registry: Mutex<SessionRegistry>,
    probe: VcsProbe,
    driver: Arc<dyn VcsDriver>,
    settings: VcsSettings,
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("probe", &self.probe)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Gatekeeper {
    #[must_use]
    pub fn new(driver: Arc<dyn VcsDriver>, settings: VcsSettings) -> Self {
        let probe = VcsProbe::new(driver.clone(), settings.timeout + PROBE_GRACE);
        Self {
            registry: Mutex::new(SessionRegistry::new()),
            probe,
            driver,
            settings,
        }
    }

    #[must_use]
    pub fn probe(&self) -> &VcsProbe {
        &self.probe
    }

    #[must_use]
    pub fn settings(&self) -> &VcsSettings {
        &self.settings
    }

    /// Snapshot of the gate state for `id`, `None` if the session is unknown.
    pub async fn state(&self, id: &SessionId) -> Option<GateState> {
        self.registry.lock().await.get(id).cloned()
    }

    /// Handle `session.created`.
    ///
    /// Inherits from an unlocked session first (see
    /// [`SessionRegistry::inheritance_source`]), then falls back to the
    /// repository: outside a repository the gate is a no-op, inside one the
    /// session starts unlocked only if work is already in progress.
    pub async fn on_session_created(
        &self,
        id: SessionId,
        parent_hint: Option<SessionId>,
    ) -> GateState {
        let source = self
            .registry
            .lock()
            .await
            .inheritance_source(&id, parent_hint.as_ref());

        let state = match source {
            Some(parent) => {
                tracing::info!(session = %id, parent = %parent, "session inherits unlocked gate");
                GateState::inherited_from(parent)
            }
            None => self.derive_from_repository().await,
        };

        tracing::debug!(session = %id, gate = state.label(), "session created");
        self.registry
            .lock()
            .await
            .insert_created(id, state.clone());
        state
    }

    /// Handle `session.deleted`.
    pub async fn on_session_deleted(&self, id: &SessionId) -> Option<GateState> {
        let removed = self.registry.lock().await.remove(id);
        tracing::debug!(session = %id, known = removed.is_some(), "session deleted");
        removed
    }

    /// Decide whether `tool_name` may run for session `id`.
    ///
    /// Never holds the registry lock across a VCS call.
    pub async fn check_tool(&self, id: &SessionId, tool_name: &str) -> Result<Admission, GateError> {
        let Some(tool) = GatedTool::parse(tool_name) else {
            return Ok(Admission::Ungated);
        };

        let known = self.registry.lock().await.get(id).cloned();
        let unlocked = match &known {
            Some(state) if state.unlocked => return Ok(Admission::Unlocked),
            Some(_) => self.probe.shows_work_in_progress().await,
            None => {
                // Not observed since this process started.
                let state = self.derive_from_repository().await;
                tracing::debug!(session = %id, gate = state.label(), "observed unknown session");
                state.unlocked
            }
        };

        if unlocked {
            tracing::info!(session = %id, %tool, "gate unlocked from repository state");
            self.registry
                .lock()
                .await
                .set(id.clone(), GateState::unlocked());
            return Ok(Admission::Reconciled);
        }

        if known.is_none() {
            self.registry
                .lock()
                .await
                .set(id.clone(), GateState::locked());
        }
        tracing::info!(session = %id, %tool, "gated tool blocked");
        Err(GateError::Locked {
            session: id.clone(),
            tool,
        })
    }

    /// Mark `id` unlocked after an explicit checkpoint. Clears any recorded parent.
    pub async fn unlock(&self, id: &SessionId) {
        self.registry
            .lock()
            .await
            .set(id.clone(), GateState::unlocked());
        tracing::info!(session = %id, "gate unlocked by checkpoint");
    }

    /// Mark `id` locked again after a publish.
    pub async fn relock(&self, id: &SessionId) {
        self.registry
            .lock()
            .await
            .set(id.clone(), GateState::locked());
        tracing::info!(session = %id, "gate re-locked");
    }

    /// Run a mutating driver call under the configured timeout.
    pub async fn attempt<T>(&self, command: &str, fut: VcsFut<'_, T>) -> Result<T, VcsError> {
        bounded(self.settings.timeout + PROBE_GRACE, command, fut).await
    }

    #[must_use]
    pub fn driver(&self) -> &dyn VcsDriver {
        self.driver.as_ref()
    }

    /// Create a new change on the first base ref that works.
    ///
    /// Returns the base that succeeded, or every attempt's failure in order.
    pub async fn open_checkpoint(
        &self,
        bases: &[String],
        description: &str,
    ) -> Result<String, Vec<CheckpointAttempt>> {
        let mut failures = Vec::with_capacity(bases.len());
        for base in bases {
            let command = format!("jj new {base}");
            match self
                .attempt(&command, self.driver.new_change(base, description))
                .await
            {
                Ok(()) => {
                    tracing::info!(%base, "opened checkpoint");
                    return Ok(base.clone());
                }
                Err(error) => {
                    tracing::debug!(%base, %error, "checkpoint base unavailable");
                    failures.push(CheckpointAttempt {
                        base: base.clone(),
                        error,
                    });
                }
            }
        }
        Err(failures)
    }

    async fn derive_from_repository(&self) -> GateState {
        if !self.probe.is_repository().await {
            return GateState::unlocked();
        }
        if self.probe.shows_work_in_progress().await {
            GateState::unlocked()
        } else {
            GateState::locked()
        }
    }
}
