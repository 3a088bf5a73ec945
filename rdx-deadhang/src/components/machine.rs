//! The workout state machine.
//!
//! [`transition`] is a pure function over an immutable [`TimerState`]
//! snapshot. [`WorkoutMachine`] owns the authoritative state and is the only
//! thing that replaces it.

use crate::common::{Phase, Seconds};
use crate::profile::WorkoutProfile;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle of a workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

/// The authoritative state of a workout, as read by renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerState {
    pub status: TimerStatus,
    pub current_phase: Phase,
    /// Remaining time of the current phase, as last reported by the clock.
    pub time_left: Seconds,
    /// 1-based.
    pub current_rep: u32,
    pub total_reps: u32,
    pub workout_profile: Option<Arc<WorkoutProfile>>,
    /// Whole seconds counted down while running.
    pub total_elapsed_time: Seconds,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            status: TimerStatus::Idle,
            current_phase: Phase::Start,
            time_left: 0,
            current_rep: 1,
            total_reps: 0,
            workout_profile: None,
            total_elapsed_time: 0,
        }
    }
}

impl TimerState {
    pub fn is_idle(&self) -> bool {
        self.status == TimerStatus::Idle
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_paused(&self) -> bool {
        self.status == TimerStatus::Paused
    }

    pub fn is_finished(&self) -> bool {
        self.status == TimerStatus::Finished
    }

    /// Cosmetic progress in percent: completed reps plus a fixed share of the
    /// current rep (a third in hang, two thirds in rest).
    pub fn progress(&self) -> f64 {
        if self.workout_profile.is_none() || self.total_reps == 0 {
            return 0.0;
        }
        let total = f64::from(self.total_reps);
        let completed = f64::from(self.current_rep.saturating_sub(1)) / total;
        let within_rep = match self.current_phase {
            Phase::Start => 0.0,
            Phase::Hang => 0.33,
            Phase::Rest => 0.67,
        };
        ((completed + within_rep / total) * 100.0).min(100.0)
    }

    /// Progress in percent measured by elapsed time against the planned total.
    pub fn elapsed_progress(&self) -> f64 {
        let Some(profile) = &self.workout_profile else {
            return 0.0;
        };
        let planned = profile.estimated_total_seconds();
        if planned == 0 {
            return 0.0;
        }
        (f64::from(self.total_elapsed_time) / planned as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// State transition commands.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerCommand {
    Start(Arc<WorkoutProfile>),
    Pause,
    Resume,
    Stop,
    Reset,
    /// One whole second elapsed; `time_left` is the new remaining time.
    Tick { time_left: Seconds },
    /// Sets the remaining time without counting elapsed time.
    SyncTime { time_left: Seconds },
    AdvancePhase { phase: Phase, time_left: Seconds },
    AdvanceRep { rep: u32 },
    Finish,
    UpdateProfile(Arc<WorkoutProfile>),
}

/// Applies `command` to `state` and returns the next state.
pub fn transition(state: &TimerState, command: TimerCommand) -> TimerState {
    match command {
        TimerCommand::Start(profile) => {
            if profile.repetitions == 0 {
                warn!("Refusing to start '{}': no repetitions", profile.name);
                return state.clone();
            }
            TimerState {
                status: TimerStatus::Running,
                current_phase: Phase::Start,
                time_left: profile.start_pause,
                current_rep: 1,
                total_reps: profile.repetitions,
                total_elapsed_time: 0,
                workout_profile: Some(profile),
            }
        }
        TimerCommand::Pause if state.status == TimerStatus::Running => TimerState {
            status: TimerStatus::Paused,
            ..state.clone()
        },
        TimerCommand::Resume if state.status == TimerStatus::Paused => TimerState {
            status: TimerStatus::Running,
            ..state.clone()
        },
        TimerCommand::Pause | TimerCommand::Resume => state.clone(),
        TimerCommand::Stop => TimerState {
            status: TimerStatus::Idle,
            current_phase: Phase::Start,
            time_left: 0,
            current_rep: 1,
            total_elapsed_time: 0,
            ..state.clone()
        },
        TimerCommand::Reset => TimerState {
            workout_profile: state.workout_profile.clone(),
            ..TimerState::default()
        },
        TimerCommand::Tick { time_left } => TimerState {
            time_left,
            total_elapsed_time: state.total_elapsed_time.saturating_add(1),
            ..state.clone()
        },
        TimerCommand::SyncTime { time_left } => TimerState {
            time_left,
            ..state.clone()
        },
        TimerCommand::AdvancePhase { phase, time_left } => TimerState {
            current_phase: phase,
            time_left,
            ..state.clone()
        },
        TimerCommand::AdvanceRep { rep } => TimerState {
            current_rep: rep,
            ..state.clone()
        },
        TimerCommand::Finish => TimerState {
            status: TimerStatus::Finished,
            current_phase: Phase::Start,
            time_left: 0,
            ..state.clone()
        },
        TimerCommand::UpdateProfile(profile) => TimerState {
            workout_profile: Some(profile),
            ..state.clone()
        },
    }
}

/// Owner of the authoritative [`TimerState`].
#[derive(Debug, Default)]
pub struct WorkoutMachine {
    state: TimerState,
}

impl WorkoutMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Applies a command and returns the new state.
    pub fn apply(&mut self, command: TimerCommand) -> &TimerState {
        if !matches!(command, TimerCommand::Tick { .. } | TimerCommand::SyncTime { .. }) {
            debug!("Applying {:?}", CommandName(&command));
        }
        self.state = transition(&self.state, command);
        &self.state
    }
}

/// Logs a command without dumping the whole profile.
struct CommandName<'a>(&'a TimerCommand);

impl std::fmt::Debug for CommandName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            TimerCommand::Start(profile) => write!(f, "Start({})", profile.name),
            TimerCommand::UpdateProfile(profile) => write!(f, "UpdateProfile({})", profile.name),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(reps: u32) -> Arc<WorkoutProfile> {
        Arc::new(WorkoutProfile::new("test", reps, 10, 5, 3))
    }

    fn running() -> TimerState {
        transition(&TimerState::default(), TimerCommand::Start(profile(2)))
    }

    #[test]
    fn start_replaces_the_whole_state() {
        let stale = TimerState {
            total_elapsed_time: 99,
            current_rep: 4,
            ..TimerState::default()
        };
        let state = transition(&stale, TimerCommand::Start(profile(2)));
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.current_phase, Phase::Start);
        assert_eq!(state.current_rep, 1);
        assert_eq!(state.total_reps, 2);
        assert_eq!(state.time_left, 3);
        assert_eq!(state.total_elapsed_time, 0);
        assert!(state.workout_profile.is_some());
    }

    #[test]
    fn start_without_repetitions_is_ignored() {
        let idle = TimerState::default();
        assert_eq!(transition(&idle, TimerCommand::Start(profile(0))), idle);
    }

    #[test]
    fn pause_and_resume_only_apply_in_the_right_status() {
        let idle = TimerState::default();
        assert_eq!(transition(&idle, TimerCommand::Pause), idle);
        assert_eq!(transition(&idle, TimerCommand::Resume), idle);

        let paused = transition(&running(), TimerCommand::Pause);
        assert_eq!(paused.status, TimerStatus::Paused);
        assert_eq!(transition(&paused, TimerCommand::Pause), paused);
        assert_eq!(transition(&paused, TimerCommand::Resume).status, TimerStatus::Running);
    }

    #[test]
    fn stop_returns_to_idle_and_reset_keeps_the_profile() {
        let mut state = running();
        state = transition(&state, TimerCommand::Tick { time_left: 2 });
        state = transition(&state, TimerCommand::AdvanceRep { rep: 2 });

        let stopped = transition(&state, TimerCommand::Stop);
        assert_eq!(stopped.status, TimerStatus::Idle);
        assert_eq!(stopped.time_left, 0);
        assert_eq!(stopped.current_rep, 1);
        assert_eq!(stopped.total_elapsed_time, 0);

        let reset = transition(&state, TimerCommand::Reset);
        assert_eq!(reset.status, TimerStatus::Idle);
        assert_eq!(reset.total_reps, 0);
        assert_eq!(reset.workout_profile, state.workout_profile);
    }

    #[test]
    fn ticks_count_elapsed_seconds_but_syncs_do_not() {
        let mut state = running();
        state = transition(&state, TimerCommand::Tick { time_left: 2 });
        state = transition(&state, TimerCommand::Tick { time_left: 1 });
        assert_eq!(state.time_left, 1);
        assert_eq!(state.total_elapsed_time, 2);

        state = transition(&state, TimerCommand::SyncTime { time_left: 8 });
        assert_eq!(state.time_left, 8);
        assert_eq!(state.total_elapsed_time, 2);
    }

    #[test]
    fn finish_parks_the_phase_on_start() {
        let mut state = running();
        state = transition(
            &state,
            TimerCommand::AdvancePhase {
                phase: Phase::Hang,
                time_left: 10,
            },
        );
        let finished = transition(&state, TimerCommand::Finish);
        assert_eq!(finished.status, TimerStatus::Finished);
        assert_eq!(finished.current_phase, Phase::Start);
        assert_eq!(finished.time_left, 0);
        assert!(finished.is_finished());
    }

    #[test]
    fn progress_combines_reps_and_phase_share() {
        let mut state = transition(&TimerState::default(), TimerCommand::Start(profile(4)));
        assert_eq!(state.progress(), 0.0);

        state.current_phase = Phase::Hang;
        assert!((state.progress() - 8.25).abs() < 1e-9);

        state.current_rep = 3;
        state.current_phase = Phase::Rest;
        assert!((state.progress() - 66.75).abs() < 1e-9);

        assert_eq!(TimerState::default().progress(), 0.0);
    }

    #[test]
    fn elapsed_progress_uses_planned_total() {
        let mut state = running();
        // 3 + (10 + 5) * 2 = 33 planned seconds
        state.total_elapsed_time = 11;
        assert!((state.elapsed_progress() - 100.0 / 3.0).abs() < 1e-9);
        state.total_elapsed_time = 60;
        assert_eq!(state.elapsed_progress(), 100.0);
    }

    #[test]
    fn machine_applies_commands_in_order() {
        let mut machine = WorkoutMachine::new();
        machine.apply(TimerCommand::Start(profile(1)));
        machine.apply(TimerCommand::Pause);
        assert!(machine.state().is_paused());
        machine.apply(TimerCommand::UpdateProfile(profile(3)));
        assert!(machine.state().is_paused());
        assert_eq!(
            machine.state().workout_profile.as_ref().map(|p| p.repetitions),
            Some(3)
        );
    }
}
