//! Ports for the confinement subsystem.
//!
//! Only driven (outbound) ports exist here: the protocol itself is the
//! inbound surface, exposed directly by
//! [`crate::service::ConfinementManager`].

pub mod outbound;

pub use outbound::{Environment, Store};
