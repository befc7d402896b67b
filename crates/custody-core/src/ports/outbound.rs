//! Outbound (driven) ports for the confinement subsystem.
//!
//! These traits define the collaborators the protocol depends on. Every
//! call site runs on the main context, so the surface is synchronous;
//! implementations that need real I/O hand the work off themselves.

use crate::domain::area::{HoldingArea, Point};
use crate::domain::items::{Item, WornSlot};
use crate::domain::mode::OperatingMode;
use crate::domain::subject::{Subject, SubjectId};

/// Persistence collaborator.
///
/// Fire-and-forget from the protocol's perspective; failures are the
/// collaborator's concern.
pub trait Store: Send + Sync {
    /// Persist an area and everything it holds.
    fn save(&self, area: &HoldingArea);

    /// Drop the persisted record of one subject.
    fn remove_subject(&self, area: &str, cell: Option<&str>, subject: &Subject);
}

/// Presence/environment collaborator: the live world the protocol affects.
pub trait Environment: Send + Sync {
    /// Whether the identity is currently present in the environment.
    fn is_present(&self, id: SubjectId) -> bool;

    /// Current display name of a present actor.
    fn display_name(&self, id: SubjectId) -> Option<String>;

    /// Current position of a present actor.
    fn position(&self, id: SubjectId) -> Option<Point>;

    /// Move the actor. Returns whether the relocation took effect.
    fn relocate(&self, id: SubjectId, point: Point) -> bool;

    fn operating_mode(&self, id: SubjectId) -> OperatingMode;

    fn set_operating_mode(&self, id: SubjectId, mode: OperatingMode);

    /// Whether the actor is riding a vehicle or mount.
    fn is_mounted(&self, id: SubjectId) -> bool;

    fn eject_from_mount(&self, id: SubjectId);

    /// Whether the actor is under unrelated restraint state.
    fn has_restraints(&self, id: SubjectId) -> bool;

    fn clear_restraints(&self, id: SubjectId);

    /// Suppress or re-enable idle/rest-state tracking for the actor.
    fn set_rest_tracking_suppressed(&self, id: SubjectId, suppressed: bool);

    /// Current resource (e.g. energy) level.
    fn resource_level(&self, id: SubjectId) -> i64;

    fn set_resource_level(&self, id: SubjectId, level: i64);

    /// Remove and return everything the actor carries.
    fn take_carried(&self, id: SubjectId) -> Vec<Item>;

    /// Remove and return everything the actor wears.
    fn take_worn(&self, id: SubjectId) -> Vec<(WornSlot, Item)>;

    /// Clear carried and worn possessions outright.
    fn clear_possessions(&self, id: SubjectId);

    /// Hand the actor an item. Returns the item back when there is no free
    /// slot.
    fn give_item(&self, id: SubjectId, item: Item) -> Option<Item>;

    /// Equip an item into a worn slot if that slot is empty. Returns the
    /// item back when the slot was taken.
    fn equip_if_empty(&self, id: SubjectId, slot: WornSlot, item: Item) -> Option<Item>;

    /// Drop an item at the actor's current position.
    fn drop_item(&self, id: SubjectId, item: Item);

    /// Send a message to the actor.
    fn send_message(&self, id: SubjectId, message: &str);

    /// Send a message to a named operator.
    fn notify_operator(&self, operator: &str, message: &str);

    /// Broadcast a message to the whole environment.
    fn broadcast(&self, message: &str);

    /// Execute a side-effect command. Placeholders are already substituted.
    fn execute_command(&self, command: &str);

    /// Refresh display/signage collaborators for one cell.
    fn refresh_cell_signage(&self, area: &str, cell: &str);
}
