//! Operating modes an actor can be placed under.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The interaction mode forced on a confined actor and restored on release.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Full, unrestricted interaction. The default free-world mode.
    #[default]
    Active,
    /// Reduced interaction; the safe default while confined.
    Restricted,
    /// Observation only, no interaction.
    Observer,
    /// Automation-driven; the actor does not act on its own.
    Passive,
}

impl OperatingMode {
    /// Every mode, in declaration order. Used for the configuration
    /// diagnostic when an invalid mode value is encountered.
    pub const ALL: [OperatingMode; 4] = [
        OperatingMode::Active,
        OperatingMode::Restricted,
        OperatingMode::Observer,
        OperatingMode::Passive,
    ];

    /// Comma-separated list of valid mode names.
    #[must_use]
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Restricted => "restricted",
            Self::Observer => "observer",
            Self::Passive => "passive",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OperatingMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "restricted" => Ok(Self::Restricted),
            "observer" => Ok(Self::Observer),
            "passive" => Ok(Self::Passive),
            _ => Err(()),
        }
    }
}
