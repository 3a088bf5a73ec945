//! # Deadhang
//!
//! A drift-free interval timer core for deadhang (hangboard) workouts.
//!
//! Deadhang runs a countdown on a background task and turns it into a
//! sequence of workout phases: a start pause, then alternating hangs and
//! rests until every repetition is done.
//!
//! ## Core Concepts
//!
//! - **ClockEngine**: A countdown that re-derives the remaining time from a
//!   monotonic clock on every poll, so it never drifts no matter how late the
//!   polls are.
//! - **ClockService**: The process-wide façade over exactly one engine. It
//!   spawns the engine lazily and keeps the listener registry alive across
//!   engine restarts.
//! - **Sequencer and Machine**: Pure functions deciding the next phase and a
//!   reducer holding the authoritative workout state.
//! - **Coordinator**: Binds clock events to the workout. Ticks count down the
//!   phase, a finished countdown advances it, user intents drive the clock.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use deadhang::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Acquire the shared clock service.
//!     let service = ClockService::global();
//!
//!     // 2. Create a coordinator and bind it to the clock.
//!     let coordinator = Coordinator::new(service, Arc::new(SilentAudio), AudioSettings::default());
//!     coordinator.bind();
//!
//!     // 3. Watch the workout notices.
//!     let mut notices = coordinator.subscribe_notices();
//!
//!     // 4. Start a workout from a built-in template.
//!     let template = find_template("beginner").expect("built-in template");
//!     coordinator.start_timer(profile_from_template(template))?;
//!
//!     while let Ok(notice) = notices.recv().await {
//!         println!("{:?}", notice);
//!         if matches!(notice, WorkoutNotice::Finished { .. }) {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Deadhang Timer";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod audio;
pub mod common;
pub mod components;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod profile;
pub mod service;
pub mod time;

/// A prelude module for easy importing of the most common Deadhang types.
pub mod prelude {
    pub use crate::audio::{AudioCue, AudioSettings, AudioSink, SilentAudio};
    pub use crate::common::{CountdownId, ListenerId, Phase, Seconds};
    pub use crate::components::machine::{TimerState, TimerStatus};
    pub use crate::config::{ClockResolution, DeadhangConfig};
    pub use crate::coordinator::Coordinator;
    pub use crate::error::{ClockError, CoordinatorError, ProfileError, ServiceError};
    pub use crate::events::{ClockEvent, ClockEventKind, SystemEvent, WorkoutNotice};
    pub use crate::profile::{
        find_template, profile_from_template, Difficulty, Durations, WorkoutProfile, TEMPLATES,
    };
    pub use crate::service::ClockService;
}
