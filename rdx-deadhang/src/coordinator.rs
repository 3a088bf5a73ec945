//! The workout coordinator.
//!
//! Glues the clock service, the phase sequencer and the state machine
//! together: clock events advance the workout, user intents drive the clock.
//! The coordinator is the only writer of the [`TimerState`]; renderers read it
//! through [`Coordinator::state`] or a [`watch`] subscription.

use crate::audio::{AudioCue, AudioSettings, AudioSink};
use crate::common::{CountdownId, ListenerId, Phase, Seconds};
use crate::components::machine::{TimerCommand, TimerState, TimerStatus, WorkoutMachine};
use crate::components::sequencer::{next_phase, phase_duration};
use crate::error::{ClockError, CoordinatorError, ServiceError};
use crate::events::{ClockEvent, ClockEventKind, WorkoutNotice};
use crate::profile::WorkoutProfile;
use crate::service::ClockService;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

struct CoordinatorInner {
    service: ClockService,
    machine: Mutex<WorkoutMachine>,
    audio: Arc<dyn AudioSink>,
    audio_settings: AudioSettings,
    state_sender: watch::Sender<TimerState>,
    notice_sender: broadcast::Sender<WorkoutNotice>,
    bound: Mutex<Vec<ListenerId>>,
    countdown: Mutex<CountdownGate>,
}

/// The countdown the workout is following.
///
/// Clock events are delivered asynchronously, so a `Finished` or `Tick` of a
/// countdown that was stopped or replaced can still arrive after a new one was
/// started. Only events of the followed countdown reach the workout, and
/// time reports only once its `Started` was seen.
#[derive(Debug, Default)]
struct CountdownGate {
    followed: Option<CountdownId>,
    live: bool,
}

/// Drives one workout at a time on top of a [`ClockService`].
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

/// What leaving a phase resulted in, decided under the machine lock.
enum PhaseOutcome {
    Advanced {
        phase: Phase,
        rep: u32,
        is_new_rep: bool,
        time_left: Seconds,
        was_paused: bool,
    },
    Finished {
        total_elapsed: Seconds,
    },
}

impl Coordinator {
    pub fn new(
        service: ClockService,
        audio: Arc<dyn AudioSink>,
        audio_settings: AudioSettings,
    ) -> Self {
        let (state_sender, _) = watch::channel(TimerState::default());
        let (notice_sender, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(CoordinatorInner {
                service,
                machine: Mutex::new(WorkoutMachine::new()),
                audio,
                audio_settings,
                state_sender,
                notice_sender,
                bound: Mutex::new(Vec::new()),
                countdown: Mutex::new(CountdownGate::default()),
            }),
        }
    }

    pub fn service(&self) -> &ClockService {
        &self.inner.service
    }

    /// A snapshot of the current workout state.
    pub fn state(&self) -> TimerState {
        self.inner.lock_machine().state().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TimerState> {
        self.inner.state_sender.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<WorkoutNotice> {
        self.inner.notice_sender.subscribe()
    }

    /// Registers the coordinator's clock listeners. Calling it again is a no-op.
    pub fn bind(&self) {
        let mut bound = self.inner.bound.lock().unwrap_or_else(|e| e.into_inner());
        if !bound.is_empty() {
            debug!("Coordinator already bound to the clock");
            return;
        }

        let service = &self.inner.service;
        let weak = Arc::downgrade(&self.inner);
        bound.push(service.on_tick(with_inner(&weak, |inner, time_left| {
            inner.on_time_report(time_left);
        })));
        bound.push(service.on_finished({
            let weak = weak.clone();
            move |countdown| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_finished(countdown);
                }
                Ok(())
            }
        }));
        bound.push(service.add_listener(ClockEventKind::Error, {
            let weak = weak.clone();
            move |event| {
                if let (Some(inner), ClockEvent::Error(error)) = (weak.upgrade(), event) {
                    inner.on_clock_error(error);
                }
                Ok(())
            }
        }));
        for kind in [ClockEventKind::Paused, ClockEventKind::Resumed] {
            bound.push(service.add_listener(kind, {
                let weak = weak.clone();
                move |event| {
                    if let (Some(inner), ClockEvent::Paused { time_left } | ClockEvent::Resumed { time_left }) =
                        (weak.upgrade(), event)
                    {
                        inner.on_time_report(*time_left);
                    }
                    Ok(())
                }
            }));
        }
        bound.push(service.add_listener(ClockEventKind::Started, {
            let weak = weak.clone();
            move |event| {
                if let (Some(inner), ClockEvent::Started { countdown, .. }) = (weak.upgrade(), event) {
                    inner.on_started(*countdown);
                }
                Ok(())
            }
        }));
        bound.push(service.add_listener(ClockEventKind::Stopped, |event| {
            debug!("Clock reported {:?}", event);
            Ok(())
        }));
        info!("Coordinator bound to the clock ({} listeners)", bound.len());
    }

    /// Removes the coordinator's listeners. The clock itself keeps running.
    pub fn unbind(&self) {
        let ids: Vec<ListenerId> = std::mem::take(
            &mut *self.inner.bound.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for id in &ids {
            self.inner.service.remove_listener(*id);
        }
        if !ids.is_empty() {
            info!("Coordinator unbound from the clock");
        }
    }

    pub fn is_bound(&self) -> bool {
        !self.inner.bound.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    /// Starts a workout with `profile`, beginning with its start pause.
    pub fn start_timer(&self, profile: WorkoutProfile) -> Result<(), CoordinatorError> {
        profile.validate()?;
        {
            let state = self.state();
            if state.is_running() || state.is_paused() {
                return Err(CoordinatorError::WorkoutInProgress);
            }
        }
        self.inner.service.ensure_ready()?;

        let profile = Arc::new(profile);
        let start_pause = profile.start_pause;
        self.inner.release_countdown();
        info!(
            "Starting workout '{}': {} reps, about {}s",
            profile.name,
            profile.repetitions,
            profile.estimated_total_seconds()
        );
        self.inner.apply(TimerCommand::Start(profile.clone()));
        self.inner.notify(WorkoutNotice::Started {
            profile: profile.name.clone(),
            total_reps: profile.repetitions,
        });
        self.inner.play(AudioCue::Start);

        let seeded = self
            .inner
            .service
            .set_time(i64::from(start_pause))
            .and_then(|()| self.inner.start_countdown(start_pause));
        if let Err(e) = seeded {
            error!("Could not start the clock: {}", e);
            self.inner.release_countdown();
            self.inner.apply(TimerCommand::Stop);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn pause(&self) -> Result<(), CoordinatorError> {
        let was_running = self.state().is_running();
        self.inner.apply(TimerCommand::Pause);
        if was_running {
            self.inner.notify(WorkoutNotice::Paused);
        }
        Ok(self.inner.service.pause()?)
    }

    pub fn resume(&self) -> Result<(), CoordinatorError> {
        let was_paused = self.state().is_paused();
        self.inner.apply(TimerCommand::Resume);
        if was_paused {
            self.inner.notify(WorkoutNotice::Resumed);
        }
        Ok(self.inner.service.resume()?)
    }

    pub fn stop(&self) -> Result<(), CoordinatorError> {
        self.inner.release_countdown();
        self.inner.apply(TimerCommand::Stop);
        self.inner.notify(WorkoutNotice::Stopped);
        Ok(self.inner.service.stop()?)
    }

    pub fn reset(&self) -> Result<(), CoordinatorError> {
        self.inner.release_countdown();
        self.inner.apply(TimerCommand::Reset);
        self.inner.notify(WorkoutNotice::Reset);
        Ok(self.inner.service.reset()?)
    }

    /// Replaces the stored profile. The running countdown is not touched.
    pub fn update_profile(&self, profile: WorkoutProfile) -> Result<(), CoordinatorError> {
        profile.validate()?;
        self.inner.apply(TimerCommand::UpdateProfile(Arc::new(profile)));
        Ok(())
    }
}

/// Wraps a tick handler so it only runs while the coordinator is alive.
fn with_inner(
    weak: &Weak<CoordinatorInner>,
    handler: impl Fn(&CoordinatorInner, Seconds) + Send + Sync + 'static,
) -> impl Fn(Seconds) -> anyhow::Result<()> + Send + Sync + 'static {
    let weak = weak.clone();
    move |time_left| {
        if let Some(inner) = weak.upgrade() {
            handler(&*inner, time_left);
        }
        Ok(())
    }
}

impl CoordinatorInner {
    fn lock_machine(&self) -> MutexGuard<'_, WorkoutMachine> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_gate(&self) -> MutexGuard<'_, CountdownGate> {
        self.countdown.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a clock countdown and follows it. The gate stays locked across
    /// the send so its `Started` cannot be checked against the old id.
    fn start_countdown(&self, seconds: Seconds) -> Result<(), ServiceError> {
        let mut gate = self.lock_gate();
        *gate = CountdownGate::default();
        let id = self.service.start(i64::from(seconds))?;
        gate.followed = Some(id);
        Ok(())
    }

    /// Stops following any countdown; late events of it are dropped.
    fn release_countdown(&self) {
        *self.lock_gate() = CountdownGate::default();
    }

    fn on_started(&self, countdown: CountdownId) {
        let mut gate = self.lock_gate();
        if gate.followed == Some(countdown) {
            gate.live = true;
        } else {
            debug!("Ignoring start of countdown #{}", countdown);
        }
    }

    fn apply(&self, command: TimerCommand) -> TimerState {
        let state = self.lock_machine().apply(command).clone();
        self.state_sender.send_replace(state.clone());
        state
    }

    fn publish(&self, state: TimerState) {
        self.state_sender.send_replace(state);
    }

    fn notify(&self, notice: WorkoutNotice) {
        self.notice_sender.send(notice).ok();
    }

    fn play(&self, cue: AudioCue) {
        if !self.audio_settings.allows(cue) {
            return;
        }
        if let Err(e) = self.audio.play(cue) {
            warn!("Audio cue {} failed: {:#}", cue, e);
        }
    }

    /// Folds a reported remaining time into the state.
    ///
    /// Every whole second counted down is one `Tick`, so seconds skipped
    /// between two reports still count as elapsed. A report that moves the
    /// time up is a resync and counts nothing.
    fn on_time_report(&self, time_left: Seconds) {
        if !self.lock_gate().live {
            return;
        }
        let (state, previous) = {
            let mut machine = self.lock_machine();
            let previous = machine.state().time_left;
            if !matches!(
                machine.state().status,
                TimerStatus::Running | TimerStatus::Paused
            ) || time_left == previous
            {
                return;
            }
            if time_left < previous {
                for remaining in (time_left..previous).rev() {
                    machine.apply(TimerCommand::Tick {
                        time_left: remaining,
                    });
                }
            } else {
                machine.apply(TimerCommand::SyncTime { time_left });
            }
            (machine.state().clone(), previous)
        };
        self.publish(state);

        if time_left < previous && time_left > 0 && time_left <= self.audio_settings.countdown_seconds {
            self.play(AudioCue::Countdown);
        }
    }

    fn on_finished(&self, countdown: CountdownId) {
        {
            let mut gate = self.lock_gate();
            if gate.followed != Some(countdown) || !gate.live {
                debug!("Ignoring finish of countdown #{}", countdown);
                return;
            }
            gate.live = false;
        }
        let outcome = {
            let mut machine = self.lock_machine();
            let state = machine.state().clone();
            if !matches!(state.status, TimerStatus::Running | TimerStatus::Paused) {
                debug!("Ignoring clock finish while {:?}", state.status);
                return;
            }
            let Some(profile) = state.workout_profile.clone() else {
                warn!("Clock finished without a workout profile");
                return;
            };

            let next = next_phase(state.current_phase, state.current_rep, state.total_reps);
            if next.is_finished {
                let finished = machine.apply(TimerCommand::Finish);
                PhaseOutcome::Finished {
                    total_elapsed: finished.total_elapsed_time,
                }
            } else {
                let rep = if next.is_new_rep {
                    state.current_rep + 1
                } else {
                    state.current_rep
                };
                let time_left = phase_duration(next.phase, state.current_rep, &profile);
                machine.apply(TimerCommand::AdvancePhase {
                    phase: next.phase,
                    time_left,
                });
                if next.is_new_rep {
                    machine.apply(TimerCommand::AdvanceRep { rep });
                }
                PhaseOutcome::Advanced {
                    phase: next.phase,
                    rep,
                    is_new_rep: next.is_new_rep,
                    time_left,
                    was_paused: state.is_paused(),
                }
            }
        };
        self.publish(self.lock_machine().state().clone());

        match outcome {
            PhaseOutcome::Finished { total_elapsed } => {
                info!("Workout finished after {}s", total_elapsed);
                self.play(AudioCue::End);
                self.notify(WorkoutNotice::Finished { total_elapsed });
            }
            PhaseOutcome::Advanced {
                phase,
                rep,
                is_new_rep,
                time_left,
                was_paused,
            } => {
                info!("Entering {} of rep {} ({}s)", phase, rep, time_left);
                if is_new_rep {
                    self.notify(WorkoutNotice::RepAdvanced { rep });
                }
                self.notify(WorkoutNotice::PhaseChanged {
                    phase,
                    rep,
                    time_left,
                });
                self.play(AudioCue::PhaseChange);

                let mut restarted = self.start_countdown(time_left);
                // A pause that raced the finish applies to the next phase.
                if was_paused {
                    restarted = restarted.and_then(|()| self.service.pause());
                }
                if let Err(e) = restarted {
                    error!("Could not start the next phase: {}", e);
                    self.notify(WorkoutNotice::Fault {
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    fn on_clock_error(&self, error: &ClockError) {
        if error.is_benign() {
            debug!("Ignoring clock error: {}", error);
            return;
        }
        match error {
            ClockError::InvalidDuration(_) => {
                error!("Clock rejected the workout: {}", error);
                self.release_countdown();
                self.apply(TimerCommand::Stop);
                self.play(AudioCue::Error);
                self.notify(WorkoutNotice::Fault {
                    message: error.user_message(),
                });
            }
            _ => warn!("Clock error: {}", error),
        }
    }
}
