//! Deferred release sweeping.
//!
//! The release queue is the only cross-context buffer in the subsystem:
//! timers, background workers, and external triggers append subjects here
//! from any thread, and a repeating main-context task drains it and
//! re-enters the protocol. A second repeating task expires running
//! confinement durations.

use crate::domain::subject::SubjectId;
use crate::exec::TICK_MS;
use crate::service::manager::ConfinementManager;
use std::sync::{Arc, Mutex, PoisonError};

/// Ticks before the first release sweep after startup.
pub const SWEEPER_STARTUP_DELAY_TICKS: u64 = 100;

/// Ticks between release sweeps.
pub const SWEEPER_PERIOD_TICKS: u64 = 20;

/// Ticks between duration-expiry sweeps.
pub const DURATION_SWEEP_PERIOD_TICKS: u64 = 20;

/// Unordered collection of subjects awaiting exit processing.
///
/// Appended from any context; drained only by the sweeper on the main
/// context.
#[derive(Debug, Default)]
pub struct ReleaseQueue {
    queued: Mutex<Vec<SubjectId>>,
}

impl ReleaseQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subject for the next sweep.
    pub fn push(&self, id: SubjectId) {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    /// Atomically take everything queued so far.
    #[must_use]
    pub fn drain(&self) -> Vec<SubjectId> {
        std::mem::take(&mut *self.queued.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Schedule the repeating sweeper tasks on the manager's main context.
pub(crate) fn install(manager: &Arc<ConfinementManager>) {
    let weak = Arc::downgrade(manager);
    manager.context().submit_repeating(
        SWEEPER_STARTUP_DELAY_TICKS,
        SWEEPER_PERIOD_TICKS,
        move || {
            if let Some(manager) = weak.upgrade() {
                manager.drain_release_queue();
            }
        },
    );

    let weak = Arc::downgrade(manager);
    let elapsed_ms = (DURATION_SWEEP_PERIOD_TICKS * TICK_MS) as i64;
    manager.context().submit_repeating(
        DURATION_SWEEP_PERIOD_TICKS,
        DURATION_SWEEP_PERIOD_TICKS,
        move || {
            if let Some(manager) = weak.upgrade() {
                manager.sweep_durations(elapsed_ms);
            }
        },
    );
}
