//! # Update Scheduler
//!
//! Decides when a candidate snapshot becomes the committed one.
//!
//! ```text
//!          schedule(candidate)            take_pending()
//!   Idle ───────────────────────▶ CommitPending ───────────────▶ Idle
//!     ▲                                  │
//!     └──────────── cancel() ────────────┘
//! ```
//!
//! Entering `CommitPending` wakes the host (if a waker is installed) so it can
//! queue the continuation for its next turn. The continuation is
//! [`Editor::run_pending`](crate::Editor::run_pending). Only one deferred
//! commit can be outstanding; scheduling a second one fails.

use crate::{EditorError, Snapshot, SnapshotId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How `update` commits a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Commit before `update` returns
    Sync,

    /// Commit on the host's next turn
    #[default]
    Deferred,
}

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    CommitPending(SnapshotId),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    CommitPending(Box<Snapshot>),
}

/// Hook the host uses to learn that a continuation must be queued
pub type Waker = Box<dyn FnMut()>;

/// `Idle → CommitPending → Idle` state machine
#[derive(Default)]
pub struct Scheduler {
    state: State,
    waker: Option<Waker>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the hook called whenever a deferred commit is scheduled
    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    pub fn phase(&self) -> SchedulerPhase {
        match &self.state {
            State::Idle => SchedulerPhase::Idle,
            State::CommitPending(candidate) => SchedulerPhase::CommitPending(candidate.id()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::CommitPending(_))
    }

    /// Fail if a deferred commit is outstanding
    pub fn ensure_idle(&self) -> Result<(), EditorError> {
        match self.state {
            State::Idle => Ok(()),
            State::CommitPending(_) => Err(EditorError::ConcurrentUpdate),
        }
    }

    /// Park `candidate` as the pending commit and wake the host
    pub fn schedule(&mut self, candidate: Snapshot) -> Result<(), EditorError> {
        self.ensure_idle()?;
        tracing::debug!(snapshot = %candidate.id(), "Scheduled deferred commit");
        self.state = State::CommitPending(Box::new(candidate));

        if let Some(waker) = &mut self.waker {
            waker();
        }
        Ok(())
    }

    /// Return to `Idle`, handing back the pending candidate
    pub fn take_pending(&mut self) -> Option<Snapshot> {
        match std::mem::take(&mut self.state) {
            State::Idle => None,
            State::CommitPending(candidate) => Some(*candidate),
        }
    }

    /// Drop the pending candidate, if any
    pub fn cancel(&mut self) -> Option<SnapshotId> {
        self.take_pending().map(|candidate| candidate.id())
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("phase", &self.phase())
            .field("has_waker", &self.waker.is_some())
            .finish()
    }
}
