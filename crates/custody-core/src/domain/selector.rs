//! Cell selection for the entry protocol.

use serde::{Deserialize, Serialize};

/// How the entry protocol chooses where a subject is held within an area.
///
/// Resolved exactly once, at the start of the entry protocol, into a
/// concrete optional cell.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellSelector {
    /// Place the subject into the area's general population.
    #[default]
    None,
    /// Scan cells in their defined order and take the first empty one,
    /// degrading to the general population when none is free.
    Any,
    /// A specific cell by name. Fails when the cell is missing or occupied.
    Named(String),
}

impl CellSelector {
    /// Selector for the cell with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_general_population() {
        assert_eq!(CellSelector::default(), CellSelector::None);
    }

    #[test]
    fn test_named_constructor() {
        assert_eq!(CellSelector::named("c1"), CellSelector::Named("c1".into()));
    }
}
