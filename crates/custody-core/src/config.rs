//! Configuration surface for the confinement core.
//!
//! Consumed as a flat key→value mapping with documented option keys. The
//! protocol never validates values beyond the guarded operating-mode
//! fallback in the entry protocol; everything else is read with a per-call
//! default, exactly as the call sites need it.

use std::collections::HashMap;

/// Documented configuration keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKey {
    /// Operating mode forced on entry. String, one of
    /// [`crate::domain::OperatingMode`]'s names.
    EntryMode,
    /// Whether possessions are stored on entry and restored on exit. Bool.
    StorePossessions,
    /// Comma-separated item-kind fragments that are never containered.
    PossessionDenyList,
    /// Whether the entry summary is broadcast to the environment. Bool.
    BroadcastEntry,
    /// Whether the entry summary is logged when not broadcast. Bool.
    LogEntry,
    /// Whether subjects are muted automatically on entry. Bool.
    AutoMute,
    /// Comma-separated commands executed after entry.
    EntryCommands,
    /// Default confinement duration in milliseconds. Integer.
    DefaultDurationMs,
    /// Lower bound of the resource clamp applied on entry. Integer.
    ResourceClampMin,
    /// Upper bound of the resource clamp applied on entry. Integer.
    ResourceClampMax,
    /// Whether idle/rest-state tracking is suppressed while confined. Bool.
    SuppressRestState,
    /// Whether release relocates to the position captured at entry. Bool.
    ReleaseToPreviousPosition,
    /// Whether release restores the operating mode captured at entry. Bool.
    RestorePreviousMode,
    /// Whether release relocates to the area's free point when the previous
    /// position was not used. Bool.
    RelocateOnRelease,
    /// Comma-separated commands executed after release.
    ExitCommands,
}

impl ConfigKey {
    /// The flat map key this option lives under.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::EntryMode => "confinement.entry.mode",
            Self::StorePossessions => "confinement.entry.storePossessions",
            Self::PossessionDenyList => "confinement.entry.possessionDenyList",
            Self::BroadcastEntry => "confinement.entry.broadcast",
            Self::LogEntry => "confinement.entry.logToConsole",
            Self::AutoMute => "confinement.entry.autoMute",
            Self::EntryCommands => "confinement.entry.commands",
            Self::DefaultDurationMs => "confinement.entry.defaultDurationMs",
            Self::ResourceClampMin => "confinement.entry.resourceMin",
            Self::ResourceClampMax => "confinement.entry.resourceMax",
            Self::SuppressRestState => "confinement.entry.suppressRestState",
            Self::ReleaseToPreviousPosition => "confinement.release.backToPreviousPosition",
            Self::RestorePreviousMode => "confinement.release.restorePreviousMode",
            Self::RelocateOnRelease => "confinement.release.relocate",
            Self::ExitCommands => "confinement.release.commands",
        }
    }
}

/// Flat key→value configuration, read with call-site defaults.
#[derive(Clone, Debug, Default)]
pub struct CustodyConfig {
    values: HashMap<String, String>,
}

impl CustodyConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from raw key→value pairs.
    #[must_use]
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.path().to_owned(), value.into());
        self
    }

    /// Raw string value, or the default when unset.
    #[must_use]
    pub fn string(&self, key: ConfigKey, default: &str) -> String {
        self.values
            .get(key.path())
            .cloned()
            .unwrap_or_else(|| default.to_owned())
    }

    /// Boolean value; unparseable or unset values fall back to the default.
    #[must_use]
    pub fn bool(&self, key: ConfigKey, default: bool) -> bool {
        self.values
            .get(key.path())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Integer value; unparseable or unset values fall back to the default.
    #[must_use]
    pub fn int(&self, key: ConfigKey, default: i64) -> i64 {
        self.values
            .get(key.path())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Comma-separated list value. Unset means empty; entries are trimmed
    /// and blank entries dropped.
    #[must_use]
    pub fn list(&self, key: ConfigKey) -> Vec<String> {
        self.values
            .get(key.path())
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}
