//! The clock service: the process-wide façade over exactly one clock engine.
//!
//! The service owns two things with different lifetimes:
//!
//! - a **listener registry** (event kind to handlers), which lives as long as
//!   the service and survives engine restarts;
//! - an **engine slot**, filled lazily with a spawned [`ClockEngine`] task on
//!   first use and emptied only by [`ClockService::terminate`].
//!
//! Every event an engine produces goes through a dispatcher task that looks the
//! handlers up in the registry at delivery time, so listeners added before an
//! engine existed, or while an old one was being replaced, are always applied
//! to the current engine.

use crate::common::{CountdownId, ListenerId};
use crate::config::ClockResolution;
use crate::engine::ClockEngine;
use crate::error::ServiceError;
use crate::events::{ClockCommand, ClockEvent, ClockEventKind, SystemEvent};
use slotmap::SlotMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, Weak};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A clock event handler. Errors and panics are caught and logged at dispatch.
pub type ListenerFn = dyn Fn(&ClockEvent) -> anyhow::Result<()> + Send + Sync;

struct Listener {
    kind: ClockEventKind,
    handler: Arc<ListenerFn>,
}

/// A live engine and its dispatcher.
struct EngineSlot {
    generation: u64,
    commands: mpsc::UnboundedSender<ClockCommand>,
    engine_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
}

struct ServiceInner {
    resolution: ClockResolution,
    listeners: RwLock<SlotMap<ListenerId, Listener>>,
    engine: Mutex<Option<EngineSlot>>,
    generation: AtomicU64,
    last_countdown: AtomicU64,
    clock_event_sender: broadcast::Sender<ClockEvent>,
    system_event_sender: broadcast::Sender<SystemEvent>,
}

static GLOBAL: OnceLock<ClockService> = OnceLock::new();

/// Handle to a clock service. Clones share the same engine and registry.
#[derive(Clone)]
pub struct ClockService {
    inner: Arc<ServiceInner>,
}

// Construction and engine lifecycle.
impl ClockService {
    /// Creates a private service. Hosts normally use [`ClockService::global`].
    pub fn new(resolution: ClockResolution) -> Self {
        const CHANNEL_CAPACITY: usize = 1024;
        let (clock_event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (system_event_sender, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(ServiceInner {
                resolution,
                listeners: RwLock::new(SlotMap::with_key()),
                engine: Mutex::new(None),
                generation: AtomicU64::new(0),
                last_countdown: AtomicU64::new(0),
                clock_event_sender,
                system_event_sender,
            }),
        }
    }

    /// The process-wide service, created on first use with the default resolution.
    pub fn global() -> ClockService {
        Self::init_global(ClockResolution::default())
    }

    /// The process-wide service. Only the first caller's resolution is used;
    /// later calls return the existing instance unchanged.
    pub fn init_global(resolution: ClockResolution) -> ClockService {
        let mut created = false;
        let service = GLOBAL.get_or_init(|| {
            created = true;
            info!("Creating the global clock service ({:?})", resolution);
            ClockService::new(resolution)
        });
        if !created && service.inner.resolution != resolution {
            debug!(
                "Global clock service already exists with {:?}, ignoring {:?}",
                service.inner.resolution, resolution
            );
        }
        service.clone()
    }

    /// Whether both handles refer to the same service.
    pub fn ptr_eq(&self, other: &ClockService) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn resolution(&self) -> ClockResolution {
        self.inner.resolution
    }

    /// Number of engines spawned so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Makes sure an engine is running, spawning one if needed.
    pub fn ensure_ready(&self) -> Result<(), ServiceError> {
        self.engine_commands().map(|_| ())
    }

    /// Whether a live engine exists right now. Never spawns one.
    pub fn is_ready(&self) -> bool {
        self.lock_engine()
            .as_ref()
            .is_some_and(|slot| !slot.commands.is_closed())
    }

    /// Hard shutdown: drops the engine and every listener.
    ///
    /// The next command lazily spawns a fresh engine.
    pub fn terminate(&self) {
        let slot = self.lock_engine().take();
        if let Some(slot) = slot {
            info!("Terminating clock engine #{}", slot.generation);
            drop(slot.commands);
            slot.engine_task.abort();
            slot.dispatch_task.abort();
            self.inner
                .system_event_sender
                .send(SystemEvent::EngineShutdown {
                    generation: slot.generation,
                })
                .ok();
        }
        self.remove_all_listeners();
    }

    fn engine_commands(&self) -> Result<mpsc::UnboundedSender<ClockCommand>, ServiceError> {
        let mut slot = self.lock_engine();
        if let Some(live) = slot.as_ref() {
            if !live.commands.is_closed() {
                return Ok(live.commands.clone());
            }
            warn!("Clock engine #{} has stopped, replacing it", live.generation);
        }

        let runtime = Handle::try_current()
            .map_err(|e| ServiceError::EngineUnavailable(e.to_string()))?;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let engine = ClockEngine::new(self.inner.resolution.interval());
        let engine_task = runtime.spawn(engine.run(command_rx, event_tx));
        let dispatch_task = runtime.spawn(dispatch_loop(Arc::downgrade(&self.inner), event_rx));

        info!("Spawned clock engine #{}", generation);
        self.inner
            .system_event_sender
            .send(SystemEvent::EngineStarted { generation })
            .ok();

        *slot = Some(EngineSlot {
            generation,
            commands: command_tx.clone(),
            engine_task,
            dispatch_task,
        });
        Ok(command_tx)
    }

    fn send(&self, command: ClockCommand) -> Result<(), ServiceError> {
        self.engine_commands()?
            .send(command)
            .map_err(|_| ServiceError::EngineUnavailable("clock engine task has stopped".into()))
    }

    fn lock_engine(&self) -> MutexGuard<'_, Option<EngineSlot>> {
        self.inner.engine.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// Commands. Outcomes arrive as events; only a missing engine is an `Err`.
impl ClockService {
    /// Starts a countdown of `duration` seconds and returns its id.
    ///
    /// The id shows up again on the matching `Started` and `Finished` events.
    /// It is assigned even if the engine later rejects the command.
    pub fn start(&self, duration: i64) -> Result<CountdownId, ServiceError> {
        let countdown = self.inner.last_countdown.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(ClockCommand::Start {
            duration,
            interval: None,
            countdown,
        })?;
        Ok(countdown)
    }

    pub fn pause(&self) -> Result<(), ServiceError> {
        self.send(ClockCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), ServiceError> {
        self.send(ClockCommand::Resume)
    }

    pub fn stop(&self) -> Result<(), ServiceError> {
        self.send(ClockCommand::Stop)
    }

    pub fn reset(&self) -> Result<(), ServiceError> {
        self.send(ClockCommand::Reset)
    }

    pub fn set_time(&self, seconds: i64) -> Result<(), ServiceError> {
        self.send(ClockCommand::SetTime { seconds })
    }
}

// Listener registry.
impl ClockService {
    /// Registers a handler for one kind of clock event.
    ///
    /// The listener is kept across engine restarts until it is removed or the
    /// service is terminated.
    pub fn add_listener(
        &self,
        kind: ClockEventKind,
        handler: impl Fn(&ClockEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(Listener {
                kind,
                handler: Arc::new(handler),
            });
        self.inner
            .system_event_sender
            .send(SystemEvent::ListenerAdded { id, kind })
            .ok();

        if let Err(e) = self.ensure_ready() {
            warn!("Listener {:?} registered before the clock is available: {}", id, e);
        }
        id
    }

    /// Registers a handler for `Tick` events.
    pub fn on_tick(
        &self,
        handler: impl Fn(u32) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> ListenerId {
        self.add_listener(ClockEventKind::Tick, move |event| match event {
            ClockEvent::Tick { time_left } => handler(*time_left),
            _ => Ok(()),
        })
    }

    /// Registers a handler for `Finished` events. It receives the id of the
    /// countdown that finished.
    pub fn on_finished(
        &self,
        handler: impl Fn(CountdownId) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> ListenerId {
        self.add_listener(ClockEventKind::Finished, move |event| match event {
            ClockEvent::Finished { countdown } => handler(*countdown),
            _ => Ok(()),
        })
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let was_removed = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some();
        if was_removed {
            self.inner
                .system_event_sender
                .send(SystemEvent::ListenerRemoved { id })
                .ok();
        }
        was_removed
    }

    /// Removes every listener without touching the running countdown.
    pub fn remove_all_listeners(&self) {
        let removed: Vec<ListenerId> = {
            let mut listeners = self.inner.listeners.write().unwrap_or_else(|e| e.into_inner());
            let ids = listeners.keys().collect();
            listeners.clear();
            ids
        };
        for id in removed {
            self.inner
                .system_event_sender
                .send(SystemEvent::ListenerRemoved { id })
                .ok();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Subscribes to the raw `ClockEvent` stream, after listeners have run.
    pub fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.inner.clock_event_sender.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.inner.system_event_sender.subscribe()
    }
}

async fn dispatch_loop(inner: Weak<ServiceInner>, mut events: mpsc::UnboundedReceiver<ClockEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else { break };
        dispatch(&inner, &event);
        inner.clock_event_sender.send(event).ok();
    }
    debug!("Clock event dispatcher stopped");
}

fn dispatch(inner: &ServiceInner, event: &ClockEvent) {
    let kind = event.kind();
    // Handlers are cloned out so they may add or remove listeners themselves.
    let handlers: Vec<(ListenerId, Arc<ListenerFn>)> = inner
        .listeners
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .filter(|(_, listener)| listener.kind == kind)
        .map(|(id, listener)| (id, listener.handler.clone()))
        .collect();

    for (id, handler) in handlers {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Listener {:?} failed on {:?}: {:#}", id, kind, e),
            Err(_) => error!("Listener {:?} panicked on {:?}", id, kind),
        }
    }
}
