//! Contains common, primitive types shared across the deadhang crate.
//!
//! Durations in the timer core are whole seconds. Command inputs that cross the
//! clock boundary are signed so the engine can reject nonsense values with a
//! typed error instead of relying on the caller.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

/// Whole seconds, as stored in profiles and state.
pub type Seconds = u32;

/// Identifies one countdown of the clock. Assigned by the clock service,
/// counting up from 1 and never reused within a process.
pub type CountdownId = u64;

new_key_type! {
    /// Uniquely and safely identifies a registered clock listener.
    ///
    /// Returned by [`ClockService::add_listener`](crate::service::ClockService::add_listener).
    /// Keys are never reused, so a stale id can never remove someone else's listener.
    pub struct ListenerId;
}

/// The phase a workout is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Preparation before the first hang.
    #[default]
    Start,
    Hang,
    Rest,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Hang => "hang",
            Phase::Rest => "rest",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
