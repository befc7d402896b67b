//! The Subject record: durable data for one confined actor.

use super::area::Point;
use super::mode::OperatingMode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable unique identifier of an actor.
pub type SubjectId = Uuid;

/// Sentinel for `remaining_ms` meaning "confined indefinitely".
pub const INDEFINITE: i64 = -1;

/// Durable record for one confined actor.
///
/// A Subject is associated with at most one Holding Area at a time, and
/// within that area with at most one Holding Cell or with the area's general
/// population. The exclusivity is structural: the record is stored inside
/// either a cell's occupant slot or the area's population map, never both.
///
/// `remaining_ms < 0` means indefinite confinement; the value is never
/// otherwise negative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    id: SubjectId,
    name: String,
    confined_by: String,
    reason: String,
    remaining_ms: i64,
    muted: bool,
    offline_pending: bool,
    #[serde(skip)]
    relocating: bool,
    pending_transfer: bool,
    #[serde(skip)]
    dirty: bool,
    carried_blob: String,
    worn_blob: String,
    previous_position: Option<Point>,
    previous_mode: OperatingMode,
    idle_ms: u64,
}

impl Subject {
    /// Create a record for an actor confined for `remaining_ms` milliseconds
    /// (or [`INDEFINITE`]).
    #[must_use]
    pub fn new(id: SubjectId, name: impl Into<String>, remaining_ms: i64) -> Self {
        Self {
            id,
            name: name.into(),
            confined_by: String::new(),
            reason: String::new(),
            remaining_ms,
            muted: true,
            offline_pending: false,
            relocating: false,
            pending_transfer: false,
            dirty: false,
            carried_blob: String::new(),
            worn_blob: String::new(),
            previous_position: None,
            previous_mode: OperatingMode::default(),
            idle_ms: 0,
        }
    }

    /// Set the confining party's name.
    #[must_use]
    pub fn confined_by(mut self, confined_by: impl Into<String>) -> Self {
        self.confined_by = confined_by.into();
        self
    }

    /// Set the free-text confinement reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set whether the actor is muted while confined.
    #[must_use]
    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    pub fn id(&self) -> SubjectId {
        self.id
    }

    /// Last known display name of the actor.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.dirty = true;
    }

    pub fn confiner(&self) -> &str {
        &self.confined_by
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
        self.dirty = true;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.dirty = true;
    }

    /// Whether the subject is confined indefinitely.
    pub fn is_indefinite(&self) -> bool {
        self.remaining_ms == INDEFINITE
    }

    /// Remaining duration in milliseconds; negative means indefinite.
    pub fn remaining_ms(&self) -> i64 {
        self.remaining_ms
    }

    /// Remaining duration in whole minutes.
    pub fn remaining_minutes(&self) -> i64 {
        self.remaining_ms / 60_000
    }

    pub fn set_remaining_ms(&mut self, remaining_ms: i64) {
        self.remaining_ms = remaining_ms;
        self.dirty = true;
    }

    /// Add time to the remaining duration, unless confined indefinitely.
    pub fn add_time(&mut self, ms: i64) -> i64 {
        if self.remaining_ms != INDEFINITE {
            self.remaining_ms += ms;
            self.dirty = true;
        }
        self.remaining_ms
    }

    /// Subtract time from the remaining duration, saturating at zero.
    /// Indefinite subjects are unaffected.
    pub fn subtract_time(&mut self, ms: i64) -> i64 {
        if self.remaining_ms != INDEFINITE {
            self.remaining_ms = (self.remaining_ms - ms).max(0);
            self.dirty = true;
        }
        self.remaining_ms
    }

    /// Whether the actor was absent when confinement was recorded and the
    /// environmental effects are still pending.
    pub fn is_offline_pending(&self) -> bool {
        self.offline_pending
    }

    pub fn set_offline_pending(&mut self, offline_pending: bool) {
        self.offline_pending = offline_pending;
        self.dirty = true;
    }

    /// Whether an in-flight relocation is occurring. Movement validation
    /// elsewhere must not interfere while this is set.
    pub fn is_relocating(&self) -> bool {
        self.relocating
    }

    pub fn set_relocating(&mut self, relocating: bool) {
        self.relocating = relocating;
    }

    /// Whether a transfer must be completed next time the actor is present.
    pub fn is_pending_transfer(&self) -> bool {
        self.pending_transfer
    }

    pub fn set_pending_transfer(&mut self, pending: bool) {
        self.pending_transfer = pending;
        self.dirty = true;
    }

    /// Opaque blob of the primary (carried) possessions.
    pub fn carried_blob(&self) -> &str {
        &self.carried_blob
    }

    pub fn set_carried_blob(&mut self, blob: impl Into<String>) {
        self.carried_blob = blob.into();
        self.dirty = true;
    }

    /// Opaque blob of the secondary (worn) possessions.
    pub fn worn_blob(&self) -> &str {
        &self.worn_blob
    }

    pub fn set_worn_blob(&mut self, blob: impl Into<String>) {
        self.worn_blob = blob.into();
        self.dirty = true;
    }

    /// Free-world position captured at entry, restored on release.
    pub fn previous_position(&self) -> Option<Point> {
        self.previous_position
    }

    pub fn set_previous_position(&mut self, position: Option<Point>) {
        self.previous_position = position;
        self.dirty = true;
    }

    /// Operating mode captured at entry, restored on release.
    pub fn previous_mode(&self) -> OperatingMode {
        self.previous_mode
    }

    pub fn set_previous_mode(&mut self, mode: OperatingMode) {
        self.previous_mode = mode;
        self.dirty = true;
    }

    /// Accumulated inactivity time in milliseconds.
    pub fn idle_ms(&self) -> u64 {
        self.idle_ms
    }

    pub fn set_idle_ms(&mut self, idle_ms: u64) {
        self.idle_ms = idle_ms;
    }

    /// Whether the record changed since it was last persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
