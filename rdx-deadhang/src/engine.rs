//! The clock engine: a free-running countdown on its own task.
//!
//! The engine only knows how to count down N seconds. It never counts ticks:
//! remaining time is always derived from the instant the countdown started,
//!
//! ```text
//! time_left = max(0, duration - floor(now - started_at))
//! ```
//!
//! so a late or skipped poll can delay a notification but never make the
//! countdown drift. Pausing shifts `started_at` forward by the paused interval
//! when the countdown resumes.
//!
//! [`ClockEngine`] is the synchronous state machine and takes `now` as an
//! argument; [`ClockEngine::run`] drives it from a command channel and a
//! periodic poll.

use crate::common::{CountdownId, Seconds};
use crate::error::ClockError;
use crate::events::{ClockCommand, ClockEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Private state of a clock engine.
///
/// Invariant: `is_paused` implies `is_running`.
#[derive(Debug, Clone)]
struct ClockEngineState {
    is_running: bool,
    is_paused: bool,
    time_left: Seconds,
    duration: Seconds,
    tick_interval: Duration,
    countdown: CountdownId,
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
}

impl ClockEngineState {
    fn idle(tick_interval: Duration) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            time_left: 0,
            duration: 0,
            tick_interval,
            countdown: 0,
            started_at: None,
            paused_at: None,
        }
    }
}

/// A countdown clock with start/pause/resume/stop/reset/set-time commands.
#[derive(Debug, Clone)]
pub struct ClockEngine {
    state: ClockEngineState,
    default_interval: Duration,
}

impl ClockEngine {
    /// Creates an idle engine that polls at `tick_interval` unless a `start`
    /// command asks for a different interval.
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            state: ClockEngineState::idle(tick_interval),
            default_interval: tick_interval,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    pub fn time_left(&self) -> Seconds {
        self.state.time_left
    }

    pub fn duration(&self) -> Seconds {
        self.state.duration
    }

    /// The id of the current (or last) countdown, 0 before the first start.
    pub fn countdown(&self) -> CountdownId {
        self.state.countdown
    }

    pub fn tick_interval(&self) -> Duration {
        self.state.tick_interval
    }

    /// Whether the periodic poll should currently be scheduled.
    pub fn is_polling(&self) -> bool {
        self.state.is_running && !self.state.is_paused
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Applies a command and returns the events it produced.
    ///
    /// Failures are returned as [`ClockEvent::Error`], never as `Err`.
    pub fn handle(&mut self, command: ClockCommand, now: Instant) -> Vec<ClockEvent> {
        let result = match command {
            ClockCommand::Start {
                duration,
                interval,
                countdown,
            } => self
                .start(
                    duration,
                    interval.unwrap_or(self.default_interval),
                    countdown,
                    now,
                )
                .map(|event| vec![event]),
            ClockCommand::Pause => self.pause(now).map(|event| event.into_iter().collect()),
            ClockCommand::Resume => self.resume(now).map(|event| event.into_iter().collect()),
            ClockCommand::Stop => Ok(vec![self.stop()]),
            ClockCommand::Reset => Ok(vec![self.reset()]),
            ClockCommand::SetTime { seconds } => self.set_time(seconds).map(|event| vec![event]),
        };
        match result {
            Ok(events) => events,
            Err(error) => {
                if error.is_benign() {
                    warn!("Clock command ignored: {}", error);
                } else {
                    warn!("Clock command rejected: {}", error);
                }
                vec![ClockEvent::Error(error)]
            }
        }
    }

    /// Starts countdown `countdown` of `duration` seconds, polling every `interval`.
    ///
    /// A paused countdown may be replaced by a new one; a live one may not.
    pub fn start(
        &mut self,
        duration: i64,
        interval: Duration,
        countdown: CountdownId,
        now: Instant,
    ) -> Result<ClockEvent, ClockError> {
        if self.state.is_running && !self.state.is_paused {
            return Err(ClockError::AlreadyRunning);
        }
        let duration = match Seconds::try_from(duration) {
            Ok(secs) if secs > 0 => secs,
            _ => return Err(ClockError::InvalidDuration(duration)),
        };

        self.state = ClockEngineState {
            is_running: true,
            is_paused: false,
            time_left: duration,
            duration,
            tick_interval: interval,
            countdown,
            started_at: Some(now),
            paused_at: None,
        };
        debug!(
            "Clock started countdown #{}: {}s, polling every {:?}",
            countdown, duration, interval
        );
        Ok(ClockEvent::Started {
            duration,
            countdown,
        })
    }

    /// Freezes the countdown. Pausing an already paused clock is a no-op.
    pub fn pause(&mut self, now: Instant) -> Result<Option<ClockEvent>, ClockError> {
        if !self.state.is_running {
            return Err(ClockError::NotRunning);
        }
        if self.state.is_paused {
            return Ok(None);
        }
        self.state.time_left = self.remaining_at(now);
        self.state.is_paused = true;
        self.state.paused_at = Some(now);
        debug!("Clock paused with {}s left", self.state.time_left);
        Ok(Some(ClockEvent::Paused {
            time_left: self.state.time_left,
        }))
    }

    /// Continues a paused countdown. Resuming a live clock is a no-op.
    pub fn resume(&mut self, now: Instant) -> Result<Option<ClockEvent>, ClockError> {
        if !self.state.is_running {
            return Err(ClockError::NotRunning);
        }
        if !self.state.is_paused {
            return Ok(None);
        }
        if let (Some(started_at), Some(paused_at)) = (self.state.started_at, self.state.paused_at) {
            self.state.started_at = Some(started_at + now.saturating_duration_since(paused_at));
        }
        self.state.is_paused = false;
        self.state.paused_at = None;
        debug!("Clock resumed with {}s left", self.state.time_left);
        Ok(Some(ClockEvent::Resumed {
            time_left: self.state.time_left,
        }))
    }

    /// Halts the countdown. Safe to call in any state.
    pub fn stop(&mut self) -> ClockEvent {
        self.state.is_running = false;
        self.state.is_paused = false;
        self.state.time_left = 0;
        self.state.started_at = None;
        self.state.paused_at = None;
        debug!("Clock stopped");
        ClockEvent::Stopped
    }

    /// Stops and forgets the last duration.
    pub fn reset(&mut self) -> ClockEvent {
        let event = self.stop();
        self.state = ClockEngineState::idle(self.default_interval);
        event
    }

    /// Overwrites the remaining time and reports it immediately.
    ///
    /// While idle this also becomes the duration, which is how a display is
    /// seeded before the countdown starts.
    pub fn set_time(&mut self, seconds: i64) -> Result<ClockEvent, ClockError> {
        let secs = Seconds::try_from(seconds).map_err(|_| ClockError::InvalidTime(seconds))?;
        self.state.time_left = secs;
        if !self.state.is_running {
            self.state.duration = secs;
        }
        Ok(ClockEvent::Tick { time_left: secs })
    }

    /// One periodic poll: re-derives the remaining time from the wall clock.
    pub fn poll(&mut self, now: Instant) -> Vec<ClockEvent> {
        if !self.is_polling() || self.state.started_at.is_none() {
            return Vec::new();
        }

        let time_left = self.remaining_at(now);
        self.state.time_left = time_left;
        trace!("Clock poll: {}s left", time_left);

        let mut events = vec![ClockEvent::Tick { time_left }];
        if time_left == 0 {
            self.state.is_running = false;
            self.state.is_paused = false;
            self.state.started_at = None;
            self.state.paused_at = None;
            debug!("Clock finished after {}s", self.state.duration);
            events.push(ClockEvent::Finished {
                countdown: self.state.countdown,
            });
        }
        events
    }

    fn remaining_at(&self, now: Instant) -> Seconds {
        match self.state.started_at {
            Some(started_at) => {
                let elapsed = now.saturating_duration_since(started_at).as_secs();
                let elapsed = Seconds::try_from(elapsed).unwrap_or(Seconds::MAX);
                self.state.duration.saturating_sub(elapsed)
            }
            None => self.state.time_left,
        }
    }
}

// The task side of the engine.
impl ClockEngine {
    /// Runs the engine until the command channel closes.
    ///
    /// Commands are handled before polls, so a command sent right after a
    /// `Finished` event is always applied to the finished state.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ClockCommand>,
        events: mpsc::UnboundedSender<ClockEvent>,
    ) {
        info!("Clock engine task started");
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    let produced = self.handle(command, Instant::now());
                    let rearm = produced
                        .iter()
                        .any(|e| matches!(e, ClockEvent::Started { .. } | ClockEvent::Resumed { .. }));
                    for event in produced {
                        events.send(event).ok();
                    }
                    if !self.is_polling() {
                        ticker = None;
                    } else if rearm || ticker.is_none() {
                        ticker = Some(self.new_ticker());
                    }
                }
                _ = next_poll(&mut ticker) => {
                    for event in self.poll(Instant::now()) {
                        events.send(event).ok();
                    }
                    if !self.is_polling() {
                        ticker = None;
                    }
                }
            }
        }
        info!("Clock engine task stopped");
    }

    fn new_ticker(&self) -> Interval {
        let period = self.state.tick_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

async fn next_poll(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(100);

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn start_cmd(duration: i64) -> ClockCommand {
        ClockCommand::Start {
            duration,
            interval: None,
            countdown: 1,
        }
    }

    #[test]
    fn start_rejects_non_positive_durations() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        assert_eq!(
            engine.handle(start_cmd(0), t0),
            vec![ClockEvent::Error(ClockError::InvalidDuration(0))]
        );
        assert_eq!(
            engine.handle(start_cmd(-5), t0),
            vec![ClockEvent::Error(ClockError::InvalidDuration(-5))]
        );
        assert!(!engine.is_running());
    }

    #[test]
    fn start_while_running_is_rejected_but_paused_clock_can_restart() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        assert_eq!(
            engine.handle(start_cmd(10), t0),
            vec![ClockEvent::Started {
                duration: 10,
                countdown: 1
            }]
        );
        assert_eq!(
            engine.handle(start_cmd(20), t0),
            vec![ClockEvent::Error(ClockError::AlreadyRunning)]
        );

        engine.handle(ClockCommand::Pause, t0 + secs(1.0));
        let restart = ClockCommand::Start {
            duration: 20,
            interval: None,
            countdown: 2,
        };
        assert_eq!(
            engine.handle(restart, t0 + secs(2.0)),
            vec![ClockEvent::Started {
                duration: 20,
                countdown: 2
            }]
        );
        assert_eq!(engine.countdown(), 2);
        assert!(engine.is_polling());
        assert_eq!(engine.duration(), 20);
    }

    #[test]
    fn start_honours_an_explicit_poll_interval() {
        let mut engine = ClockEngine::new(POLL);
        engine.handle(
            ClockCommand::Start {
                duration: 5,
                interval: Some(Duration::from_secs(1)),
                countdown: 1,
            },
            Instant::now(),
        );
        assert_eq!(engine.tick_interval(), Duration::from_secs(1));
        engine.reset();
        assert_eq!(engine.tick_interval(), POLL);
    }

    #[test]
    fn poll_derives_time_left_from_elapsed_wall_clock() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        engine.handle(start_cmd(10), t0);

        assert_eq!(engine.poll(t0 + secs(0.1)), vec![ClockEvent::Tick { time_left: 10 }]);
        assert_eq!(engine.poll(t0 + secs(2.5)), vec![ClockEvent::Tick { time_left: 8 }]);
        assert_eq!(engine.poll(t0 + secs(9.99)), vec![ClockEvent::Tick { time_left: 1 }]);
    }

    #[test]
    fn skipped_polls_do_not_delay_completion() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        engine.handle(start_cmd(10), t0);

        // a single, very late poll
        assert_eq!(
            engine.poll(t0 + secs(30.0)),
            vec![ClockEvent::Tick { time_left: 0 }, ClockEvent::Finished { countdown: 1 }]
        );
        assert!(!engine.is_running());
        assert!(engine.poll(t0 + secs(31.0)).is_empty());
    }

    #[test]
    fn samples_are_non_increasing_and_hit_zero_at_duration() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        engine.handle(start_cmd(7), t0);

        let offsets = [0.05, 0.9, 1.0, 1.7, 3.2, 3.3, 5.0, 6.999];
        let mut last = Seconds::MAX;
        for offset in offsets {
            let events = engine.poll(t0 + secs(offset));
            let Some(ClockEvent::Tick { time_left }) = events.first() else {
                panic!("expected a tick at {offset}");
            };
            assert!(*time_left <= last);
            assert!(*time_left > 0);
            last = *time_left;
        }
        assert_eq!(
            engine.poll(t0 + secs(7.0)),
            vec![ClockEvent::Tick { time_left: 0 }, ClockEvent::Finished { countdown: 1 }]
        );
    }

    #[test]
    fn paused_time_does_not_count() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        engine.handle(start_cmd(60), t0);

        assert_eq!(
            engine.handle(ClockCommand::Pause, t0 + secs(15.0)),
            vec![ClockEvent::Paused { time_left: 45 }]
        );
        assert!(!engine.is_polling());
        assert!(engine.poll(t0 + secs(18.0)).is_empty());

        assert_eq!(
            engine.handle(ClockCommand::Resume, t0 + secs(20.0)),
            vec![ClockEvent::Resumed { time_left: 45 }]
        );
        assert_eq!(engine.poll(t0 + secs(20.5)), vec![ClockEvent::Tick { time_left: 45 }]);
        assert_eq!(engine.poll(t0 + secs(21.0)), vec![ClockEvent::Tick { time_left: 44 }]);
    }

    #[test]
    fn pause_and_resume_need_a_running_clock() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        assert_eq!(
            engine.handle(ClockCommand::Pause, t0),
            vec![ClockEvent::Error(ClockError::NotRunning)]
        );
        assert_eq!(
            engine.handle(ClockCommand::Resume, t0),
            vec![ClockEvent::Error(ClockError::NotRunning)]
        );

        engine.handle(start_cmd(10), t0);
        assert!(engine.handle(ClockCommand::Resume, t0).is_empty());
        assert_eq!(engine.handle(ClockCommand::Pause, t0).len(), 1);
        assert!(engine.handle(ClockCommand::Pause, t0).is_empty());
        assert!(engine.is_paused() && engine.is_running());
    }

    #[test]
    fn stop_is_always_accepted() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        assert_eq!(engine.handle(ClockCommand::Stop, t0), vec![ClockEvent::Stopped]);

        engine.handle(start_cmd(10), t0);
        engine.handle(ClockCommand::Pause, t0);
        assert_eq!(engine.handle(ClockCommand::Stop, t0), vec![ClockEvent::Stopped]);
        assert!(!engine.is_running());
        assert!(!engine.is_paused());
        assert_eq!(engine.time_left(), 0);
        assert_eq!(engine.duration(), 10);

        assert_eq!(engine.handle(ClockCommand::Reset, t0), vec![ClockEvent::Stopped]);
        assert_eq!(engine.duration(), 0);
    }

    #[test]
    fn set_time_seeds_the_display_and_rejects_negative_values() {
        let mut engine = ClockEngine::new(POLL);
        let t0 = Instant::now();
        assert_eq!(
            engine.handle(ClockCommand::SetTime { seconds: 30 }, t0),
            vec![ClockEvent::Tick { time_left: 30 }]
        );
        assert_eq!(engine.duration(), 30);

        assert_eq!(
            engine.handle(ClockCommand::SetTime { seconds: -1 }, t0),
            vec![ClockEvent::Error(ClockError::InvalidTime(-1))]
        );
        assert_eq!(engine.time_left(), 30);

        engine.handle(start_cmd(10), t0);
        engine.handle(ClockCommand::SetTime { seconds: 4 }, t0);
        assert_eq!(engine.time_left(), 4);
        assert_eq!(engine.duration(), 10);
    }
}
