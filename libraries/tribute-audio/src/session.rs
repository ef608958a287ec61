//! The background track session and its single-instance slot

use crate::backend::{ContextState, Sound, SoundBackend, SoundOptions};
use crate::error::SoundError;
use crate::events::EventSink;
use crate::state::{lock, StateStore};
use crate::types::{PlaybackStatus, SessionConfig, SessionState};
use crate::volume::Volume;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};

/// Result of one play request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlayAttempt {
    /// Playback started
    Started,

    /// The sound was already audible, nothing was requested
    AlreadyPlaying,

    /// The primitive refused
    Rejected(SoundError),

    /// Another play request is still outstanding
    InFlight,

    /// Session failed or was released
    Unavailable,
}

/// Holds the session's play-request slot until dropped
///
/// Dropping also covers a task aborted mid-request.
pub(crate) struct PlayGuard<'a> {
    store: &'a StateStore,
}

impl Drop for PlayGuard<'_> {
    fn drop(&mut self) {
        self.store.end_play();
    }
}

/// The single background track
pub struct AudioSession {
    config: SessionConfig,
    store: Arc<StateStore>,
    sound: Arc<dyn Sound>,
    released: AtomicBool,
}

impl AudioSession {
    /// Create the sound handle and start loading
    pub(crate) fn open(
        config: SessionConfig,
        backend: &dyn SoundBackend,
        status_tx: Arc<watch::Sender<PlaybackStatus>>,
    ) -> Arc<Self> {
        let store = Arc::new(StateStore::new(config.looping, status_tx));
        store.set_state(SessionState::Loading);

        let options = SoundOptions {
            volume: config.volume.get(),
            looping: config.looping,
            streaming: config.streaming,
        };

        info!("Loading background music from {}", config.source_url);
        let sound = backend.load(
            &config.source_url,
            &options,
            EventSink::new(Arc::downgrade(&store)),
        );

        Arc::new(Self {
            config,
            store,
            sound,
            released: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.store.state()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state().status()
    }

    /// Current volume as reported by the sound
    pub fn volume(&self) -> Volume {
        Volume::new(self.sound.volume())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn sound(&self) -> &dyn Sound {
        self.sound.as_ref()
    }

    pub(crate) fn store(&self) -> &StateStore {
        &self.store
    }

    pub(crate) fn should_be_playing(&self) -> bool {
        self.store.should_be_playing()
    }

    pub(crate) fn set_should_be_playing(&self, intended: bool) {
        self.store.set_should_be_playing(intended);
    }

    /// Wait until loading has settled, one way or the other
    ///
    /// Release also ends the wait since it moves the session out of `Loading`.
    pub(crate) async fn loaded(&self) -> SessionState {
        self.store
            .wait_for_state(|state| *state != SessionState::Loading)
            .await
    }

    pub(crate) fn begin_play(&self) -> Option<PlayGuard<'_>> {
        self.store
            .try_begin_play()
            .then_some(PlayGuard { store: &self.store })
    }

    /// Resume a suspended audio context, swallowing failures
    pub(crate) async fn resume_context(&self) {
        if self.sound.context_state() != ContextState::Suspended {
            return;
        }

        match self.sound.resume_context().await {
            Ok(()) => debug!("Audio context resumed"),
            Err(e) => debug!("Could not resume audio context: {}", e),
        }
    }

    /// Issue one guarded play request
    ///
    /// `resume_first` resumes a suspended context before playing; only
    /// gesture-driven paths may do that.
    pub(crate) async fn try_play(&self, resume_first: bool) -> PlayAttempt {
        if self.is_released() || !self.state().is_playable() {
            return PlayAttempt::Unavailable;
        }

        let Some(_guard) = self.begin_play() else {
            return PlayAttempt::InFlight;
        };

        if resume_first {
            self.resume_context().await;
        }

        if self.sound.is_playing() {
            self.store.set_state(SessionState::Playing);
            return PlayAttempt::AlreadyPlaying;
        }

        match self.sound.play().await {
            Ok(()) if self.is_released() => PlayAttempt::Unavailable,
            Ok(()) => {
                self.store.set_state(SessionState::Playing);
                PlayAttempt::Started
            }
            Err(e) => PlayAttempt::Rejected(e),
        }
    }

    /// User-requested pause
    pub(crate) fn pause(&self) {
        self.store.set_should_be_playing(false);
        self.sound.pause();
        if self.state().is_playable() {
            self.store.set_state(SessionState::Paused);
        }
    }

    /// Read actual playback from the sound and correct the stored state
    pub(crate) fn observe_playing(&self) -> bool {
        let playing = self.sound.is_playing();
        let state = self.state();

        if playing && state != SessionState::Playing && state.is_playable() {
            self.store.set_state(SessionState::Playing);
        } else if !playing && state == SessionState::Playing {
            self.store.set_state(SessionState::Paused);
        }

        playing
    }

    /// Stop and unload the sound; only the first call does anything
    pub(crate) fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.store.set_should_be_playing(false);
        self.sound.stop();
        self.sound.unload();
        if self.store.state() != SessionState::Failed {
            self.store.set_state(SessionState::Stopped);
        }
        self.store.detach();

        info!("Background music released");
        true
    }
}

/// Holds at most one [`AudioSession`]
#[derive(Default)]
pub struct SessionSlot {
    current: Mutex<Option<Arc<AudioSession>>>,
    created: AtomicUsize,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing session, or create one
    ///
    /// A differing `config` on later calls is ignored. The second tuple
    /// element tells whether this call created the session.
    pub fn get_or_create(
        &self,
        config: SessionConfig,
        backend: &dyn SoundBackend,
        status_tx: &Arc<watch::Sender<PlaybackStatus>>,
    ) -> (Arc<AudioSession>, bool) {
        let mut current = lock(&self.current);

        if let Some(session) = current.as_ref() {
            if session.config() != &config {
                debug!("Session already exists, ignoring new config");
            }
            return (Arc::clone(session), false);
        }

        let session = AudioSession::open(config, backend, Arc::clone(status_tx));
        self.created.fetch_add(1, Ordering::Relaxed);
        *current = Some(Arc::clone(&session));
        (session, true)
    }

    pub fn current(&self) -> Option<Arc<AudioSession>> {
        lock(&self.current).clone()
    }

    /// Empty the slot so a fresh session can be created
    pub(crate) fn clear(&self) -> Option<Arc<AudioSession>> {
        lock(&self.current).take()
    }

    /// How many sessions this slot has ever created
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}
