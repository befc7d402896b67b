//! Service layer: the transition protocol and its supporting rules.

pub mod containment;
pub mod manager;
pub mod sweeper;

pub use containment::{merge_possessions, restore_possessions, store_possessions};
pub use manager::ConfinementManager;
pub use sweeper::ReleaseQueue;
