//! Error types for the deadhang timer core.
//!
//! Clock failures never cross the event boundary as `Err` values: they are
//! wrapped in [`ClockEvent::Error`](crate::events::ClockEvent::Error) and
//! delivered to listeners like any other event. The remaining enums are the
//! synchronous failures of the façade and the coordinator.

use thiserror::Error;

/// Failures of a single clock engine command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// A non-positive duration was passed to `start`.
    #[error("duration must be positive, got {0}")]
    InvalidDuration(i64),

    /// `start` was requested while a countdown is active and not paused.
    #[error("timer is already running")]
    AlreadyRunning,

    /// `pause` or `resume` was requested while no countdown is active.
    #[error("timer is not running")]
    NotRunning,

    /// A negative value was passed to `set_time`.
    #[error("time must be non-negative, got {0}")]
    InvalidTime(i64),
}

impl ClockError {
    /// Benign races (double start, pause while idle) are logged and ignored.
    pub fn is_benign(&self) -> bool {
        matches!(self, ClockError::AlreadyRunning | ClockError::NotRunning)
    }

    /// Get a user-friendly description of the error.
    pub fn user_message(&self) -> String {
        match self {
            ClockError::InvalidDuration(_) => "Invalid workout configuration.".to_string(),
            ClockError::AlreadyRunning => "The timer is already running.".to_string(),
            ClockError::NotRunning => "The timer is not running.".to_string(),
            ClockError::InvalidTime(_) => "Invalid time value.".to_string(),
        }
    }
}

/// Synchronous failures of the clock service façade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The background clock could not be spawned.
    #[error("clock engine unavailable: {0}")]
    EngineUnavailable(String),
}

/// Workout profile validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("a workout needs at least one repetition")]
    NoRepetitions,

    #[error("{field} must be greater than zero")]
    NonPositiveDuration { field: &'static str },

    #[error("{field} must list at least one duration")]
    EmptyDurations { field: &'static str },
}

/// Failures surfaced to the user when driving a workout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("invalid workout configuration: {0}")]
    InvalidProfile(#[from] ProfileError),

    #[error(transparent)]
    Engine(#[from] ServiceError),

    #[error("a workout is already in progress")]
    WorkoutInProgress,
}

impl CoordinatorError {
    /// Get a user-friendly description of the error.
    pub fn user_message(&self) -> String {
        match self {
            CoordinatorError::InvalidProfile(e) => format!("Invalid workout configuration: {e}."),
            CoordinatorError::Engine(_) => {
                "The background clock could not be started. Please restart the application."
                    .to_string()
            }
            CoordinatorError::WorkoutInProgress => {
                "Stop the current workout before starting a new one.".to_string()
            }
        }
    }
}
