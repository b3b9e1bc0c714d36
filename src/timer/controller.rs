use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use anyhow::Result;
use log::{debug, info};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::{SoundId, SoundNotifier},
    store::{KeyValueStore, SharedStore},
};

use super::{SessionSwitch, SessionType, TickOutcome, TimerState};

const EVENT_CAPACITY: usize = 256;
const COMPLETION_CAPACITY: usize = 16;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub clock: String,
}

impl From<&TimerState> for TimerSnapshot {
    fn from(state: &TimerState) -> Self {
        Self {
            clock: state.clock(),
            state: state.clone(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    /// A user action changed the timer.
    StateChanged { snapshot: TimerSnapshot },
    /// One second elapsed.
    Tick { remaining_secs: u64 },
    /// The countdown reached zero; the timer is now stopped on `next`.
    SessionCompleted { switch: SessionSwitch },
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Ticker {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Drives a [`TimerState`] from user intents and a one-second ticker.
///
/// The ticker is single-flight: spawning always cancels the previous one,
/// and both happen while the state lock is held. A ticker re-checks its
/// cancellation token after taking the lock, so a cancelled ticker can never
/// decrement the state again.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    store: SharedStore,
    notifier: Arc<dyn SoundNotifier>,
    ticker: Arc<TickerSlot>,
    tick_interval: Duration,
    events: broadcast::Sender<TimerEvent>,
    completions: broadcast::Sender<SessionSwitch>,
}

/// Owns the running ticker; dropping the last controller stops it.
#[derive(Default)]
struct TickerSlot(StdMutex<Option<Ticker>>);

impl TickerSlot {
    fn replace(&self, next: Option<Ticker>) {
        let previous = {
            let mut guard = self.0.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *guard, next)
        };
        if let Some(ticker) = previous {
            ticker.stop();
        }
    }

    fn is_active(&self) -> bool {
        let guard = self.0.lock().unwrap_or_else(|p| p.into_inner());
        guard.as_ref().is_some_and(|t| !t.handle.is_finished())
    }
}

impl Drop for TickerSlot {
    fn drop(&mut self) {
        self.replace(None);
    }
}

impl TimerController {
    /// Restores the timer from `store`. It always comes back stopped.
    pub fn new(store: SharedStore, notifier: Arc<dyn SoundNotifier>) -> Self {
        let state = TimerState::restore(store.as_ref());
        info!(
            "Restored {} session with {} left (cycle {})",
            state.session_type,
            state.clock(),
            state.cycle_count
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (completions, _) = broadcast::channel(COMPLETION_CAPACITY);

        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            notifier,
            ticker: Arc::new(TickerSlot::default()),
            tick_interval: Duration::from_secs(1),
            events,
            completions,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    /// Finished sessions only; a lagging [`subscribe`](Self::subscribe)
    /// receiver does not lose these.
    pub fn completions(&self) -> broadcast::Receiver<SessionSwitch> {
        self.completions.subscribe()
    }

    pub async fn get_state(&self) -> TimerState {
        self.state.lock().await.clone()
    }

    pub async fn get_snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::from(&*self.state.lock().await)
    }

    pub fn has_active_ticker(&self) -> bool {
        self.ticker.is_active()
    }

    pub async fn start(&self) -> Result<TimerSnapshot> {
        let mut state = self.state.lock().await;
        if state.start()? {
            self.spawn_ticker();
            debug!("Timer started with {} left", state.clock());
        }
        Ok(self.emit_state_changed(&state))
    }

    pub async fn pause(&self) -> TimerSnapshot {
        let mut state = self.state.lock().await;
        if state.pause() {
            self.cancel_ticker();
            state.persist_progress(self.store.as_ref());
            debug!("Timer paused with {} left", state.clock());
        }
        self.emit_state_changed(&state)
    }

    pub async fn reset(&self) -> TimerSnapshot {
        let mut state = self.state.lock().await;
        self.cancel_ticker();
        state.reset();
        state.persist_session(self.store.as_ref());
        info!("Timer reset");
        self.emit_state_changed(&state)
    }

    pub async fn select_session(&self, session_type: SessionType) -> TimerSnapshot {
        let mut state = self.state.lock().await;
        self.cancel_ticker();
        state.select_session(session_type);
        state.persist_session(self.store.as_ref());
        self.emit_state_changed(&state)
    }

    /// A running countdown keeps running through a duration edit.
    pub async fn set_duration(&self, session_type: SessionType, minutes: i64) -> Result<TimerSnapshot> {
        let mut state = self.state.lock().await;
        state.set_duration(session_type, minutes)?;
        state.config.persist_one(self.store.as_ref(), session_type);
        if state.session_type == session_type {
            state.persist_progress(self.store.as_ref());
        }
        info!("{} duration set to {} minutes", session_type, minutes);
        Ok(self.emit_state_changed(&state))
    }

    pub async fn set_sound(&self, sound: SoundId) -> TimerSnapshot {
        let mut state = self.state.lock().await;
        state.set_sound(sound);
        self.notifier.set_sound(sound);
        self.emit_state_changed(&state)
    }

    /// Applies one elapsed second immediately, as the ticker would.
    pub async fn tick(&self) -> TickOutcome {
        let mut state = self.state.lock().await;
        let outcome = apply_tick(
            &mut state,
            self.store.as_ref(),
            self.notifier.as_ref(),
            &self.events,
            &self.completions,
        );
        if matches!(outcome, TickOutcome::Switched(_)) {
            self.cancel_ticker();
        }
        outcome
    }

    fn spawn_ticker(&self) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let state = self.state.clone();
        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let events = self.events.clone();
        let completions = self.completions.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let mut guard = state.lock().await;
                if token.is_cancelled() {
                    break;
                }

                match apply_tick(
                    &mut guard,
                    store.as_ref(),
                    notifier.as_ref(),
                    &events,
                    &completions,
                ) {
                    TickOutcome::Counted { .. } => {}
                    TickOutcome::Idle | TickOutcome::Switched(_) => break,
                }
            }
        });

        self.ticker.replace(Some(Ticker { handle, cancel }));
    }

    fn cancel_ticker(&self) {
        self.ticker.replace(None);
    }

    fn emit_state_changed(&self, state: &TimerState) -> TimerSnapshot {
        let snapshot = TimerSnapshot::from(state);
        let _ = self.events.send(TimerEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        snapshot
    }
}

fn apply_tick(
    state: &mut TimerState,
    store: &dyn KeyValueStore,
    notifier: &dyn SoundNotifier,
    events: &broadcast::Sender<TimerEvent>,
    completions: &broadcast::Sender<SessionSwitch>,
) -> TickOutcome {
    let outcome = state.tick();
    match outcome {
        TickOutcome::Idle => {}
        TickOutcome::Counted { remaining_secs } => {
            state.persist_progress(store);
            let _ = events.send(TimerEvent::Tick { remaining_secs });
        }
        TickOutcome::Switched(switch) => {
            notifier.play();
            state.persist_session(store);
            info!(
                "{} session complete (cycle {}); next up: {}",
                switch.completed, switch.cycle_count, switch.next
            );
            let _ = completions.send(switch);
            let _ = events.send(TimerEvent::SessionCompleted { switch });
            let _ = events.send(TimerEvent::StateChanged {
                snapshot: TimerSnapshot::from(&*state),
            });
        }
    }
    outcome
}
