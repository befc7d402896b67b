//! # Custody Core
//!
//! Temporary confinement of actors within a simulated environment: placing
//! an actor into a holding area, preserving and restoring their
//! possessions, releasing them after a duration or on demand, and moving
//! them between holding areas.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): pure state and rules, no I/O
//!   - `Subject`: durable record for one confined actor
//!   - `HoldingArea` / `HoldingCell` / `Container`: capacity-bounded
//!     confinement structure; occupancy is structural, a subject lives in
//!     exactly one cell slot or one population map
//!   - `CellSelector`: {None, Any, Named} entry resolution
//! - **Registry** (`registry.rs`): explicit keyed store of areas with
//!   exclusive ownership, injected into the manager
//! - **Execution** (`exec/`): the single main context all mutation runs on;
//!   a tick scheduler with immediate, delayed, and repeating tasks
//! - **Ports Layer** (`ports/`): driven collaborators — `Store`
//!   (persistence) and `Environment` (presence, relocation, possessions,
//!   messaging)
//! - **Service Layer** (`service/`): orchestration
//!   - `ConfinementManager`: the transition protocol (entry, apply, exit,
//!     forced exit, transfer, presence handling)
//!   - possession containment rules
//!   - the deferred release sweeper
//!
//! Lifecycle notifications travel over the `custody-bus` crate.
//!
//! ## Concurrency model
//!
//! One thread — the main context — performs all mutation of subjects,
//! areas, and cells, and all environment-affecting effects. Any thread may
//! enqueue work (release queue, scheduled tasks); none may mutate directly.
//! `apply_confinement` and `release_confined` fail with
//! `WrongExecutionContext` when invoked from anywhere else.
//!
//! ## Usage
//!
//! ```ignore
//! use custody_core::{AreaRegistry, CellSelector, ConfinementManager, CustodyConfig, MainContext, Subject};
//! use custody_bus::InMemoryEventBus;
//! use std::sync::Arc;
//!
//! let ctx = MainContext::new();
//! let manager = ConfinementManager::new(
//!     registry,
//!     CustodyConfig::new(),
//!     store,
//!     environment,
//!     Arc::new(InMemoryEventBus::new()),
//!     ctx.clone(),
//! );
//! custody_core::exec::spawn_driver(ctx)?;
//!
//! let subject = Subject::new(id, "vex", 60_000).with_reason("trespass");
//! manager.prepare_confinement("east", CellSelector::Any, actor, subject)?;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod domain;
pub mod exec;
pub mod ports;
pub mod registry;
pub mod service;

// Re-exports for convenience
pub use config::{ConfigKey, CustodyConfig};
pub use domain::{
    CellSelector, Container, CustodyError, HoldingArea, HoldingCell, Item, OperatingMode, Point,
    Region, Subject, SubjectId, WornSlot, INDEFINITE,
};
pub use exec::MainContext;
pub use ports::{Environment, Store};
pub use registry::AreaRegistry;
pub use service::{ConfinementManager, ReleaseQueue};
