//! The pure building blocks of a workout.
//!
//! The sequencer decides which phase comes next and how long it lasts; the
//! machine holds the workout state and applies commands to it. Neither knows
//! about the clock. The `Coordinator` drives both from clock events.

pub mod machine;
pub mod sequencer;
