use chrono::NaiveTime;
use tracing::{debug, warn};

use crate::engine::{self, MoveError, MoveOutcome};
use crate::gateway::{GatewayError, ScheduleGateway};
use crate::model::{Day, ScheduleSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Viewing,
    Editing,
    Saving,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Viewing => "viewing",
            SessionState::Editing => "editing",
            SessionState::Saving => "saving",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("operation requires {required} state, session is {actual}")]
    InvalidState {
        required: &'static str,
        actual: &'static str,
    },
    #[error(transparent)]
    EntryNotFound(#[from] MoveError),
    /// One or more update calls failed. The working copy is retained and
    /// the session is back in Editing so the arrangement can be retried.
    #[error("{failed} of {attempted} updates failed: {first_cause}")]
    SaveFailed {
        attempted: usize,
        failed: usize,
        first_cause: GatewayError,
    },
    /// Updates all landed but the post-save re-fetch failed; the canonical
    /// snapshot stays at its last known-good value.
    #[error("schedule re-fetch failed: {0}")]
    LoadFailed(GatewayError),
}

/// Governs when the schedule may be mutated and how changes reach the
/// backend. Owns the working copy; the canonical snapshot stays with the
/// caller and is only ever replaced wholesale.
#[derive(Debug, Default)]
pub struct EditSession {
    working: Option<ScheduleSnapshot>,
    saving: bool,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match (&self.working, self.saving) {
            (Some(_), false) => SessionState::Editing,
            (Some(_), true) => SessionState::Saving,
            (None, _) => SessionState::Viewing,
        }
    }

    pub fn is_viewing(&self) -> bool {
        self.state() == SessionState::Viewing
    }

    pub fn working(&self) -> Option<&ScheduleSnapshot> {
        self.working.as_ref()
    }

    fn require(&self, required: SessionState) -> Result<(), SessionError> {
        let actual = self.state();
        if actual != required {
            return Err(SessionError::InvalidState {
                required: required.as_str(),
                actual: actual.as_str(),
            });
        }
        Ok(())
    }

    /// Viewing -> Editing. Deep-clones the canonical snapshot; from here on
    /// the two copies share nothing.
    pub fn enter_edit(&mut self, canonical: &ScheduleSnapshot) -> Result<(), SessionError> {
        self.require(SessionState::Viewing)?;
        self.working = Some(canonical.clone());
        debug!(entries = canonical.len(), "edit session opened");
        Ok(())
    }

    /// Editing -> Editing: one drop, applied to the working copy.
    pub fn move_entry(
        &mut self,
        source_entry_id: &str,
        target_day: Day,
        target_start: NaiveTime,
        target_end: NaiveTime,
    ) -> Result<MoveOutcome, SessionError> {
        self.require(SessionState::Editing)?;
        let working = self.working.as_mut().expect("editing implies working copy");
        let outcome =
            engine::apply_move(working, source_entry_id, target_day, target_start, target_end)?;
        debug!(entry = source_entry_id, ?outcome, "move applied");
        Ok(outcome)
    }

    /// Editing -> Viewing. Discards the working copy without touching the
    /// canonical snapshot or the network.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Editing)?;
        self.working = None;
        debug!("edit session cancelled");
        Ok(())
    }

    /// Editing -> Saving -> Viewing on success.
    ///
    /// Diffs the working copy against `canonical` by entry id and submits
    /// one update per changed entry, attempting every one before settling.
    /// Any failure leaves the session in Editing with the working copy
    /// intact and reports SaveFailed. When every update lands, the section
    /// is re-fetched as the new canonical snapshot; if that fetch fails the
    /// session still returns to Viewing (nothing is left to retry) and the
    /// caller keeps its previous canonical snapshot.
    ///
    /// Returns the number of updates issued and, on full success, the
    /// re-fetched snapshot.
    pub fn save(
        &mut self,
        canonical: &ScheduleSnapshot,
        section_id: &str,
        gateway: &dyn ScheduleGateway,
    ) -> Result<(usize, ScheduleSnapshot), SessionError> {
        self.require(SessionState::Editing)?;
        self.saving = true;

        let working = self.working.as_ref().expect("editing implies working copy");
        let changed = engine::changed_entries(canonical, working);
        let attempted = changed.len();

        let mut first_cause = None;
        let mut failed = 0usize;
        for entry in &changed {
            if let Err(e) = gateway.update_entry(entry) {
                warn!(entry = %entry.id, error = %e, "update rejected");
                failed += 1;
                first_cause.get_or_insert(e);
            }
        }

        if let Some(cause) = first_cause {
            self.saving = false;
            return Err(SessionError::SaveFailed {
                attempted,
                failed,
                first_cause: cause,
            });
        }

        let refetched = gateway.list_by_section(section_id);
        self.saving = false;
        self.working = None;
        match refetched {
            Ok(snapshot) => {
                debug!(updates = attempted, "edit session saved");
                Ok((attempted, snapshot))
            }
            Err(e) => Err(SessionError::LoadFailed(e)),
        }
    }
}
