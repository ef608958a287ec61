//! Sound lifecycle events
//!
//! The platform reports what happened to the sound (`onplay`, `onloaderror`,
//! ...) through an [`EventSink`]. The sink does nothing but feed the event to
//! the session's state store, where [`crate::state::transition`] decides the
//! new state.

use crate::state::StateStore;
use serde::{Deserialize, Serialize};
use std::sync::Weak;
use tracing::debug;

/// Events emitted by the sound primitive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundEvent {
    /// Resource loaded and decodable
    Load,

    /// Resource missing or corrupt
    LoadError(String),

    /// Playback started (or resumed)
    Play,

    /// Playback was rejected after being requested
    PlayError(String),

    /// Playback paused
    Pause,

    /// Playback stopped
    Stop,

    /// Reached the end of the track (fires on every pass when looping)
    End,
}

/// Callback handle given to the sound primitive at load time
///
/// Holds only a weak reference: a backend that keeps the sink after the
/// session is gone simply has its events dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    store: Weak<StateStore>,
}

impl EventSink {
    pub(crate) fn new(store: Weak<StateStore>) -> Self {
        Self { store }
    }

    /// Sink that is not attached to any session
    pub fn detached() -> Self {
        Self { store: Weak::new() }
    }

    /// Report a lifecycle event
    pub fn emit(&self, event: SoundEvent) {
        match self.store.upgrade() {
            Some(store) => {
                store.apply(&event);
            }
            None => debug!("Dropping sound event {:?}: session is gone", event),
        }
    }
}
