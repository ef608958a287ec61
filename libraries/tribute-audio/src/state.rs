//! Session state machine
//!
//! [`transition`] is the only place that decides how platform events move the
//! session between states. [`StateStore`] holds the current state plus the
//! controller's intent, and pushes every change to subscribers.

use crate::events::SoundEvent;
use crate::types::{PlaybackStatus, SessionState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Compute the state that follows `event`
pub fn transition(state: SessionState, event: &SoundEvent, looping: bool) -> SessionState {
    use SessionState::{Failed, Idle, Loading, Paused, Playing, Stopped};

    match event {
        SoundEvent::Load => match state {
            Idle | Loading => Paused,
            other => other,
        },
        SoundEvent::LoadError(_) => Failed,
        SoundEvent::Play => match state {
            Failed | Stopped => state,
            _ => Playing,
        },
        SoundEvent::PlayError(_) => match state {
            Loading | Playing => Paused,
            other => other,
        },
        SoundEvent::Pause => match state {
            Playing => Paused,
            other => other,
        },
        SoundEvent::Stop => match state {
            Failed => Failed,
            _ => Stopped,
        },
        SoundEvent::End => match state {
            Playing if !looping => Stopped,
            other => other,
        },
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Observer = Arc<dyn Fn(SessionState) + Send + Sync>;

#[derive(Debug, Default)]
struct Tracked {
    state: SessionState,
    should_be_playing: bool,
    play_in_flight: bool,
}

/// Shared state of one session
///
/// Mutated by platform events (through [`crate::EventSink`]) and by the
/// controller components. Never held locked across an `.await`.
pub struct StateStore {
    tracked: Mutex<Tracked>,
    status_tx: Arc<watch::Sender<PlaybackStatus>>,
    state_tx: watch::Sender<SessionState>,
    observers: Mutex<Vec<Observer>>,
    looping: bool,
    detached: AtomicBool,
}

impl StateStore {
    pub(crate) fn new(looping: bool, status_tx: Arc<watch::Sender<PlaybackStatus>>) -> Self {
        Self {
            tracked: Mutex::new(Tracked::default()),
            status_tx,
            state_tx: watch::channel(SessionState::default()).0,
            observers: Mutex::new(Vec::new()),
            looping,
            detached: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        lock(&self.tracked).state
    }

    /// Feed a platform event through the state machine
    pub(crate) fn apply(&self, event: &SoundEvent) -> SessionState {
        if self.detached.load(Ordering::Acquire) {
            return self.state();
        }

        let (old, new) = {
            let mut tracked = lock(&self.tracked);
            let old = tracked.state;
            tracked.state = transition(old, event, self.looping);
            if tracked.state == SessionState::Failed {
                tracked.should_be_playing = false;
            }
            (old, tracked.state)
        };

        debug!("Sound event {:?}: {:?} -> {:?}", event, old, new);
        if old != new {
            self.publish(new);
        }
        new
    }

    /// Set the state directly (controller-observed changes)
    pub(crate) fn set_state(&self, state: SessionState) {
        if self.detached.load(Ordering::Acquire) {
            return;
        }

        let old = {
            let mut tracked = lock(&self.tracked);
            std::mem::replace(&mut tracked.state, state)
        };

        if old != state {
            debug!("Session state {:?} -> {:?}", old, state);
            self.publish(state);
        }
    }

    pub(crate) fn should_be_playing(&self) -> bool {
        lock(&self.tracked).should_be_playing
    }

    pub(crate) fn set_should_be_playing(&self, intended: bool) {
        lock(&self.tracked).should_be_playing = intended;
    }

    /// Claim the single play-request slot; false if one is outstanding
    pub(crate) fn try_begin_play(&self) -> bool {
        let mut tracked = lock(&self.tracked);
        if tracked.play_in_flight {
            return false;
        }
        tracked.play_in_flight = true;
        true
    }

    pub(crate) fn end_play(&self) {
        lock(&self.tracked).play_in_flight = false;
    }

    #[cfg(test)]
    pub(crate) fn is_play_in_flight(&self) -> bool {
        lock(&self.tracked).play_in_flight
    }

    /// Wait until the state satisfies `done`, returning the state that did
    pub(crate) async fn wait_for_state(
        &self,
        done: impl FnMut(&SessionState) -> bool,
    ) -> SessionState {
        let mut rx = self.state_tx.subscribe();
        let reached = rx.wait_for(done).await.map(|state| *state);
        reached.unwrap_or_else(|_| self.state())
    }

    /// Register a synchronous observer, called after every state change
    pub(crate) fn observe(&self, observer: impl Fn(SessionState) + Send + Sync + 'static) {
        lock(&self.observers).push(Arc::new(observer));
    }

    /// Stop reacting to events; the last published state stays visible
    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::Release);
        lock(&self.observers).clear();
    }

    fn publish(&self, state: SessionState) {
        self.state_tx.send_replace(state);

        let status = state.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        // Call outside the lock so observers may touch the store again
        let observers: Vec<Observer> = lock(&self.observers).clone();
        for observer in observers {
            observer(state);
        }
    }
}
