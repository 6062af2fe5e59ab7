#![forbid(unsafe_code)]

//! Environment configuration.
//!
//! Supports environment variable overrides via the `WEFT_*` prefix:
//!
//! ```text
//! WEFT_INTERACTIVE        Schedule modifiers (1/true/yes/on, 0/false/no/off)
//! WEFT_DEBUG_REFERENCES   Fresh, labelled child references (1/true/yes/on)
//! ```

use std::env;

use weft_reference::ChildPolicy;

pub const ENV_INTERACTIVE: &str = "WEFT_INTERACTIVE";
pub const ENV_DEBUG_REFERENCES: &str = "WEFT_DEBUG_REFERENCES";

/// Settings of an [`Environment`](crate::Environment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnvironmentConfig {
    /// Whether modifiers are scheduled at all. Off for server-side rendering.
    pub interactive: bool,
    /// How references hand out children.
    pub child_policy: ChildPolicy,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            interactive: true,
            child_policy: ChildPolicy::Memoized,
        }
    }
}

impl EnvironmentConfig {
    #[must_use]
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    #[must_use]
    pub fn with_child_policy(mut self, child_policy: ChildPolicy) -> Self {
        self.child_policy = child_policy;
        self
    }

    /// Defaults overlaid with the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().overlay(|name| env::var(name).ok())
    }

    /// Overlay values found through `lookup`. Unset or unparseable variables
    /// keep the current setting.
    #[must_use]
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup(ENV_INTERACTIVE)
            && let Some(flag) = parse_flag(&val)
        {
            self.interactive = flag;
        }
        if let Some(val) = lookup(ENV_DEBUG_REFERENCES)
            && let Some(flag) = parse_flag(&val)
        {
            self.child_policy = ChildPolicy::from_debug(flag);
        }
        self
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    let val = val.trim();
    if ["1", "true", "yes", "on"]
        .iter()
        .any(|t| val.eq_ignore_ascii_case(t))
    {
        Some(true)
    } else if ["0", "false", "no", "off"]
        .iter()
        .any(|f| val.eq_ignore_ascii_case(f))
    {
        Some(false)
    } else {
        tracing::warn!(message = "config.invalid_flag", value = val);
        None
    }
}
