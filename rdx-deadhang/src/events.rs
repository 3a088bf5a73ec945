//! Defines all public event and command types of the deadhang timer.
//!
//! This module is the typed channel between the parts of the system. The clock
//! engine is the only producer of [`ClockEvent`]s; the coordinator and any
//! read-only observers consume them. [`WorkoutNotice`]s are the coordinator's
//! own output for renderers.

use crate::common::{CountdownId, ListenerId, Phase, Seconds};
use crate::error::ClockError;
use std::time::Duration;

/// Commands accepted by the clock engine.
///
/// Durations are raw signed seconds. The engine validates them and answers
/// invalid values with a [`ClockEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockCommand {
    /// `interval` overrides the engine's poll interval for this countdown.
    Start {
        duration: i64,
        interval: Option<Duration>,
        countdown: CountdownId,
    },
    Pause,
    Resume,
    Stop,
    Reset,
    SetTime { seconds: i64 },
}

/// Events emitted by the clock engine, in the order they were produced.
///
/// `Started` and `Finished` name the countdown they belong to, so a consumer
/// can tell a late `Finished` of a replaced countdown from the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockEvent {
    Started {
        duration: Seconds,
        countdown: CountdownId,
    },
    Tick { time_left: Seconds },
    Paused { time_left: Seconds },
    Resumed { time_left: Seconds },
    Stopped,
    Finished { countdown: CountdownId },
    Error(ClockError),
}

impl ClockEvent {
    pub fn kind(&self) -> ClockEventKind {
        match self {
            ClockEvent::Started { .. } => ClockEventKind::Started,
            ClockEvent::Tick { .. } => ClockEventKind::Tick,
            ClockEvent::Paused { .. } => ClockEventKind::Paused,
            ClockEvent::Resumed { .. } => ClockEventKind::Resumed,
            ClockEvent::Stopped => ClockEventKind::Stopped,
            ClockEvent::Finished { .. } => ClockEventKind::Finished,
            ClockEvent::Error(_) => ClockEventKind::Error,
        }
    }
}

/// The discriminant of a [`ClockEvent`], used to key listener registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockEventKind {
    Started,
    Tick,
    Paused,
    Resumed,
    Stopped,
    Finished,
    Error,
}

/// Events related to the lifecycle of the clock service itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// A new clock engine was spawned. Generations count up from 1.
    EngineStarted { generation: u64 },
    /// The clock engine was torn down by `terminate`.
    EngineShutdown { generation: u64 },
    ListenerAdded { id: ListenerId, kind: ClockEventKind },
    ListenerRemoved { id: ListenerId },
}

/// Workout-level notifications published by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkoutNotice {
    Started { profile: String, total_reps: u32 },
    PhaseChanged { phase: Phase, rep: u32, time_left: Seconds },
    RepAdvanced { rep: u32 },
    Paused,
    Resumed,
    Stopped,
    Reset,
    Finished { total_elapsed: Seconds },
    /// A failure the user should see, e.g. an invalid configuration.
    Fault { message: String },
}
