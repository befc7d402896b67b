//! # Custody Events
//!
//! Defines the lifecycle notifications that flow through the bus. Payloads
//! are detached snapshots so subscribers never hold references into the
//! registry's mutable state.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A reference to a live actor in the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    /// Stable identity of the actor.
    pub id: Uuid,
    /// Display name at the time the event fired.
    pub name: String,
}

/// Detached copy of the Subject record carried in event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSnapshot {
    /// Stable identity of the confined actor.
    pub id: Uuid,
    /// Last known display name.
    pub name: String,
    /// Who confined them.
    pub confined_by: String,
    /// Free-text reason for the confinement.
    pub reason: String,
    /// Remaining duration in milliseconds; negative means indefinite.
    pub remaining_ms: i64,
}

/// Advisory cancellation flag carried by [`CustodyEvent::PreRelease`].
///
/// Subscribers may raise it; the confinement core does not consult it. The
/// caller that initiated the release decides whether a raised flag matters.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether any subscriber raised the flag.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// All lifecycle events the confinement core publishes.
#[derive(Debug, Clone)]
pub enum CustodyEvent {
    /// Fired before a release begins. Carries the advisory [`CancelFlag`].
    PreRelease {
        area: String,
        cell: Option<String>,
        subject: SubjectSnapshot,
        actor: Option<ActorRef>,
        cancel: CancelFlag,
    },

    /// An absent actor's confinement was recorded; environmental effects are
    /// deferred until presence is detected.
    ConfinedWhileAbsent {
        area: String,
        cell: Option<String>,
        subject: SubjectSnapshot,
    },

    /// An actor was confined and all environmental effects applied.
    Confined {
        area: String,
        cell: Option<String>,
        subject: SubjectSnapshot,
        actor: ActorRef,
    },

    /// An actor was released. `actor` is `None` when the release took the
    /// absence path and no environmental effects ran.
    Released {
        area: String,
        cell: Option<String>,
        subject: SubjectSnapshot,
        actor: Option<ActorRef>,
    },

    /// An actor was moved between areas and/or cells.
    Transferred {
        origin_area: String,
        origin_cell: Option<String>,
        target_area: String,
        target_cell: Option<String>,
        subject: SubjectSnapshot,
        actor: Option<ActorRef>,
    },
}

impl CustodyEvent {
    /// The topic this event belongs to.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::PreRelease { .. } => EventTopic::PreRelease,
            Self::ConfinedWhileAbsent { .. } | Self::Confined { .. } => EventTopic::Confined,
            Self::Released { .. } => EventTopic::Released,
            Self::Transferred { .. } => EventTopic::Transferred,
        }
    }

    /// Name of the holding area the event concerns.
    #[must_use]
    pub fn area(&self) -> &str {
        match self {
            Self::PreRelease { area, .. }
            | Self::ConfinedWhileAbsent { area, .. }
            | Self::Confined { area, .. }
            | Self::Released { area, .. } => area,
            Self::Transferred { target_area, .. } => target_area,
        }
    }

    /// The subject snapshot carried by the event.
    #[must_use]
    pub fn subject(&self) -> &SubjectSnapshot {
        match self {
            Self::PreRelease { subject, .. }
            | Self::ConfinedWhileAbsent { subject, .. }
            | Self::Confined { subject, .. }
            | Self::Released { subject, .. }
            | Self::Transferred { subject, .. } => subject,
        }
    }
}

/// Coarse event categories for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTopic {
    PreRelease,
    Confined,
    Released,
    Transferred,
}

/// Filter describing which events a subscription receives.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to receive; empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Restrict to a single area by name; `None` means all areas.
    pub area: Option<String>,
}

impl EventFilter {
    /// A filter that matches every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter restricted to the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            area: None,
        }
    }

    /// Restrict the filter to one area.
    #[must_use]
    pub fn for_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    /// Whether the event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &CustodyEvent) -> bool {
        if !self.topics.is_empty() && !self.topics.contains(&event.topic()) {
            return false;
        }
        match &self.area {
            Some(area) => event.area().eq_ignore_ascii_case(area),
            None => true,
        }
    }
}
