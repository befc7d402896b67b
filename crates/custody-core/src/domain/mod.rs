//! Core domain entities for the confinement subsystem.
//!
//! Pure state and rules, no I/O: the Subject record, holding areas and
//! cells, possession items, cell selection, operating modes, and the error
//! taxonomy.

pub mod area;
pub mod errors;
pub mod items;
pub mod mode;
pub mod selector;
pub mod subject;

pub use area::{Container, HoldingArea, HoldingCell, Point, Region};
pub use errors::CustodyError;
pub use items::{Item, WornSlot};
pub use mode::OperatingMode;
pub use selector::CellSelector;
pub use subject::{Subject, SubjectId, INDEFINITE};
