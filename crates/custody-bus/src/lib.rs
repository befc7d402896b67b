//! # Custody Bus - Lifecycle Event Bus
//!
//! Carries typed confinement lifecycle notifications between the confinement
//! core and its collaborators (persistence, signage, chat decoration, ...).
//!
//! ## Pattern
//!
//! ```text
//! ┌──────────────────┐                    ┌──────────────────┐
//! │ Confinement core │                    │   Collaborator   │
//! │                  │    publish()       │                  │
//! │                  │ ──────┐            │                  │
//! └──────────────────┘       │            └──────────────────┘
//!                            ▼                    ↑
//!                      ┌──────────────┐          │
//!                      │  Event Bus   │          │
//!                      │              │ ─────────┘
//!                      └──────────────┘  subscribe()
//! ```
//!
//! The core publishes and never waits on subscribers. The single advisory
//! exception is [`CancelFlag`] on [`CustodyEvent::PreRelease`]: a subscriber
//! may raise it, and callers of the release path may consult it, but the core
//! itself proceeds regardless.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{ActorRef, CancelFlag, CustodyEvent, EventFilter, EventTopic, SubjectSnapshot};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
