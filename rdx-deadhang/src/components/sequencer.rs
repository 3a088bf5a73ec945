//! Pure phase sequencing: which phase comes next and how long it lasts.
//!
//! A workout runs `start -> hang -> rest -> hang -> ... -> hang` with exactly
//! one hang per rep and one rest between consecutive hangs.

use crate::common::{Phase, Seconds};
use crate::profile::WorkoutProfile;

/// The outcome of leaving a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    /// The phase to enter. Meaningless when `is_finished` is set.
    pub phase: Phase,
    /// The phase to enter belongs to the next rep.
    pub is_new_rep: bool,
    /// The workout is complete; there is no next phase.
    pub is_finished: bool,
}

/// Computes the phase that follows `current`.
pub fn next_phase(current: Phase, current_rep: u32, total_reps: u32) -> PhaseTransition {
    match current {
        Phase::Start => PhaseTransition {
            phase: Phase::Hang,
            is_new_rep: false,
            is_finished: false,
        },
        Phase::Hang if current_rep >= total_reps => PhaseTransition {
            phase: Phase::Start,
            is_new_rep: false,
            is_finished: true,
        },
        Phase::Hang => PhaseTransition {
            phase: Phase::Rest,
            is_new_rep: false,
            is_finished: false,
        },
        Phase::Rest => PhaseTransition {
            phase: Phase::Hang,
            is_new_rep: true,
            is_finished: false,
        },
    }
}

/// Duration of `phase` in the 1-based `rep` of `profile`.
pub fn phase_duration(phase: Phase, rep: u32, profile: &WorkoutProfile) -> Seconds {
    match phase {
        Phase::Start => profile.start_pause,
        Phase::Hang => profile.hang_times.for_rep(rep),
        Phase::Rest => profile.pause_times.for_rep(rep),
    }
}
