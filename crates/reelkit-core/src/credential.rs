//! Credential normalization.
//!
//! Environment values that are unset, empty or still carry a placeholder
//! are treated as *absent* at startup, so a missing configuration surfaces
//! as a typed `NotConfigured` failure instead of an opaque vendor error.

use std::fmt;

/// Sentinel values shipped in env templates that mean "not configured".
const PLACEHOLDER_VALUES: &[&str] = &["placeholder", "changeme", "your-api-key", "xxx"];

/// A configured secret value. Construction filters out placeholders, so
/// holding a `Credential` means the value is usable.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Read a credential from the environment. Unset, empty and
    /// placeholder values resolve to `None`.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().and_then(Self::from_value)
    }

    /// Normalize a raw value into a credential.
    pub fn from_value(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lowered = trimmed.to_lowercase();
        if PLACEHOLDER_VALUES.contains(&lowered.as_str()) || lowered.contains("placeholder") {
            return None;
        }

        Some(Self(trimmed.to_string()))
    }

    /// The underlying secret. Callers pass this to vendor SDKs only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
