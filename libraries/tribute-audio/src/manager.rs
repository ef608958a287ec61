//! Audio session manager - entry points for the page
//!
//! Ties the session slot, autoplay, the interaction gate, the continuity
//! monitor and the fade-out together. Views hold a clone of the manager and
//! only ever call the narrow entry points below; everything that mutates the
//! session goes through here.
//!
//! Timer-based entry points spawn Tokio tasks and must be called from within
//! a Tokio runtime.

use crate::{
    autoplay::attempt_autoplay,
    backend::SoundBackend,
    config::ControllerConfig,
    error::{AudioError, Result},
    fade::{self, FadeHandle},
    monitor::{ContinuityMonitor, MonitorHandle},
    session::{AudioSession, PlayAttempt, SessionSlot},
    state::lock,
    types::{GestureKind, PlaybackStatus, SessionState},
    unlock::{InteractionGate, UnlockOutcome},
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Result of a start cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Autoplay worked, music is audible
    Started,

    /// Autoplay was refused or disabled; waiting for a user gesture
    AwaitingGesture,

    /// The track could not be loaded
    Failed,

    /// A start cycle already ran
    AlreadyAttempted,

    /// The music was already faded out
    Ended,

    /// The manager was torn down
    Disposed,
}

struct ManagerInner {
    config: ControllerConfig,
    backend: Arc<dyn SoundBackend>,
    slot: SessionSlot,
    gate: InteractionGate,
    monitor: Mutex<Option<MonitorHandle>>,
    fade: Mutex<Option<FadeHandle>>,
    status_tx: Arc<watch::Sender<PlaybackStatus>>,
    start_attempted: AtomicBool,
    ending: AtomicBool,
    disposed: AtomicBool,
    manual_retries: AtomicU32,
}

impl ManagerInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn is_ending(&self) -> bool {
        self.ending.load(Ordering::Acquire)
    }

    fn on_state_change(&self, state: SessionState) {
        match state {
            SessionState::Playing => {
                self.gate.disarm();
            }
            SessionState::Failed => {
                warn!(
                    "Background music could not be loaded from {}",
                    self.config.source_url()
                );
                self.cancel_monitor();
                self.gate.disarm();
            }
            _ => {}
        }
    }

    fn ensure_monitor(&self, session: &Arc<AudioSession>) {
        if self.is_disposed() || self.is_ending() || session.state() == SessionState::Failed {
            return;
        }

        let mut monitor = lock(&self.monitor);
        if monitor.as_ref().is_some_and(MonitorHandle::is_running) {
            return;
        }

        *monitor = Some(
            ContinuityMonitor::new(Arc::clone(session), self.config.monitor_settings()).spawn(),
        );
    }

    fn cancel_monitor(&self) {
        let handle = lock(&self.monitor).take();
        if let Some(handle) = handle {
            debug!("Cancelling continuity monitor");
            handle.cancel();
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.cancel_monitor();
        let fade = lock(&self.fade).take();
        drop(fade);
        self.gate.disarm();

        if let Some(session) = self.slot.current() {
            session.release();
        }

        info!("Audio session manager disposed");
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Owner of the page's background music
///
/// Cheap to clone; all clones share one session. The session is torn down by
/// [`AudioSessionManager::dispose`] or when the last clone is dropped.
#[derive(Clone)]
pub struct AudioSessionManager {
    inner: Arc<ManagerInner>,
}

impl AudioSessionManager {
    pub fn new(config: ControllerConfig, backend: Arc<dyn SoundBackend>) -> Self {
        let (status_tx, _) = watch::channel(SessionState::Idle.status());
        let gate = InteractionGate::new(config.max_unlock_attempts, config.unlock_on_scroll);

        Self {
            inner: Arc::new(ManagerInner {
                config,
                backend,
                slot: SessionSlot::new(),
                gate,
                monitor: Mutex::new(None),
                fade: Mutex::new(None),
                status_tx: Arc::new(status_tx),
                start_attempted: AtomicBool::new(false),
                ending: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                manual_retries: AtomicU32::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ===== Entry points =====

    /// Start the background music (hero section mounted)
    ///
    /// Only the first call runs a start cycle; later calls return
    /// [`StartOutcome::AlreadyAttempted`] without touching the session.
    pub async fn on_music_start(&self) -> StartOutcome {
        if self.inner.is_disposed() {
            return StartOutcome::Disposed;
        }
        if self.inner.is_ending() {
            return StartOutcome::Ended;
        }
        if self.inner.start_attempted.swap(true, Ordering::AcqRel) {
            debug!("Music start already attempted");
            return StartOutcome::AlreadyAttempted;
        }

        self.start_cycle().await
    }

    async fn start_cycle(&self) -> StartOutcome {
        let inner = &self.inner;
        let (session, created) = inner.slot.get_or_create(
            inner.config.session_config(),
            inner.backend.as_ref(),
            &inner.status_tx,
        );
        if created {
            self.watch_session(&session);
        }

        if session.state() == SessionState::Failed {
            warn!(
                "Background music could not be loaded from {}",
                session.config().source_url
            );
            return StartOutcome::Failed;
        }

        session.set_should_be_playing(true);

        let started = if session.config().autoplay {
            attempt_autoplay(&session).await.started
        } else {
            debug!("Autoplay disabled, waiting for user interaction");
            false
        };

        if inner.is_disposed() {
            return StartOutcome::Disposed;
        }
        if inner.is_ending() {
            return StartOutcome::Ended;
        }

        if started {
            inner.ensure_monitor(&session);
            StartOutcome::Started
        } else if session.state() == SessionState::Failed {
            StartOutcome::Failed
        } else {
            inner.gate.arm();
            StartOutcome::AwaitingGesture
        }
    }

    fn watch_session(&self, session: &AudioSession) {
        let inner: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        session.store().observe(move |state| {
            if let Some(inner) = inner.upgrade() {
                inner.on_state_change(state);
            }
        });
    }

    /// Forward a platform gesture to the interaction gate
    pub async fn on_gesture(&self, kind: GestureKind) -> UnlockOutcome {
        if self.inner.is_disposed() {
            return UnlockOutcome::Ignored;
        }
        let Some(session) = self.inner.slot.current() else {
            return UnlockOutcome::Ignored;
        };

        let outcome = self.inner.gate.handle(kind, &session).await;
        if matches!(outcome, UnlockOutcome::Unlocked | UnlockOutcome::AlreadyPlaying) {
            session.set_should_be_playing(true);
            self.inner.ensure_monitor(&session);
        }
        outcome
    }

    /// Fade the music out and release it (closing section reached)
    ///
    /// Returns whether a fade was started. The monitor is cancelled and the
    /// gate disarmed before the first volume step so nothing restarts the
    /// track mid-fade. A session that failed to load is released at once.
    pub fn on_music_end(&self) -> bool {
        let inner = &self.inner;
        if inner.is_disposed() {
            return false;
        }
        let Some(session) = inner.slot.current() else {
            debug!("Music end requested before any session existed");
            return false;
        };
        if inner.ending.swap(true, Ordering::AcqRel) {
            return false;
        }

        inner.cancel_monitor();
        inner.gate.disarm();

        let Some(handle) = fade::fade_out_and_stop(
            Some(&session),
            inner.config.fade_duration(),
            inner.config.fade_step(),
        ) else {
            return false;
        };

        *lock(&inner.fade) = Some(handle);
        true
    }

    /// Alias of [`AudioSessionManager::on_music_end`]
    pub fn fade_out_and_stop(&self) -> bool {
        self.on_music_end()
    }

    /// Wait until a running fade has released the session
    ///
    /// The fade stays owned by the manager: dropping this future leaves it
    /// running, and [`AudioSessionManager::dispose`] still cancels it.
    pub async fn wait_for_fade(&self) {
        let finished = lock(&self.inner.fade).as_ref().map(FadeHandle::finished);
        if let Some(finished) = finished {
            finished.await;
        }
    }

    /// Status indicator button: pause when audible, play otherwise
    pub async fn toggle_play_pause(&self) -> Result<PlaybackStatus> {
        let inner = &self.inner;
        if inner.is_disposed() {
            return Err(AudioError::Disposed);
        }
        let session = inner.slot.current().ok_or(AudioError::NoSession)?;

        match session.state() {
            SessionState::Failed => return Err(AudioError::SessionFailed),
            SessionState::Stopped => return Err(AudioError::SessionEnded),
            _ if inner.is_ending() || session.is_released() => {
                return Err(AudioError::SessionEnded)
            }
            _ => {}
        }

        session.resume_context().await;

        if session.sound().is_playing() {
            session.pause();
            info!("Background music paused");
        } else {
            match session.try_play(false).await {
                PlayAttempt::Started | PlayAttempt::AlreadyPlaying => {
                    session.set_should_be_playing(true);
                    inner.gate.disarm();
                    inner.ensure_monitor(&session);
                    info!("Background music resumed");
                }
                PlayAttempt::Rejected(e) => debug!("Play request refused: {}", e),
                PlayAttempt::InFlight => debug!("Play request already outstanding"),
                PlayAttempt::Unavailable => return Err(AudioError::SessionEnded),
            }
        }

        Ok(session.status())
    }

    /// Manually restart after the track failed to load
    ///
    /// Releases the failed handle and runs a fresh start cycle. Allowed
    /// `max_manual_retries` times per manager; there is no automatic retry.
    pub async fn retry_after_failure(&self) -> Result<StartOutcome> {
        let inner = &self.inner;
        if inner.is_disposed() {
            return Err(AudioError::Disposed);
        }
        if inner.is_ending() {
            return Err(AudioError::SessionEnded);
        }

        let session = inner.slot.current().ok_or(AudioError::NoSession)?;
        if session.state() != SessionState::Failed {
            return Err(AudioError::NotFailed);
        }

        let limit = inner.config.max_manual_retries;
        let used = inner
            .manual_retries
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|_| AudioError::RetryExhausted { limit })?;

        info!(
            "Retrying background music after load failure ({}/{})",
            used + 1,
            limit
        );

        inner.cancel_monitor();
        inner.gate.disarm();
        if let Some(failed) = inner.slot.clear() {
            failed.release();
        }
        inner.start_attempted.store(true, Ordering::Release);

        Ok(self.start_cycle().await)
    }

    /// Page teardown; safe to call more than once
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    // ===== Read-only surface =====

    pub fn status(&self) -> PlaybackStatus {
        *self.inner.status_tx.borrow()
    }

    /// Push subscription for status changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn session_state(&self) -> SessionState {
        self.inner
            .slot
            .current()
            .map(|session| session.state())
            .unwrap_or_default()
    }

    pub fn session(&self) -> Option<Arc<AudioSession>> {
        self.inner.slot.current()
    }

    /// Sessions created over the manager's lifetime
    pub fn sessions_created(&self) -> usize {
        self.inner.slot.created()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    // ===== Introspection =====

    pub fn is_monitor_running(&self) -> bool {
        lock(&self.inner.monitor)
            .as_ref()
            .is_some_and(MonitorHandle::is_running)
    }

    pub fn monitor_ticks(&self) -> u64 {
        lock(&self.inner.monitor)
            .as_ref()
            .map_or(0, MonitorHandle::ticks)
    }

    pub fn monitor_restarts(&self) -> u64 {
        lock(&self.inner.monitor)
            .as_ref()
            .map_or(0, MonitorHandle::restarts)
    }

    pub fn is_fading(&self) -> bool {
        lock(&self.inner.fade)
            .as_ref()
            .is_some_and(FadeHandle::is_running)
    }

    /// Timer tasks (monitor and fade) still scheduled
    pub fn pending_timers(&self) -> usize {
        usize::from(self.is_monitor_running()) + usize::from(self.is_fading())
    }

    pub fn is_gate_armed(&self) -> bool {
        self.inner.gate.is_armed()
    }

    /// Gesture kinds currently registered with the gate
    pub fn gate_listeners(&self) -> Vec<GestureKind> {
        self.inner.gate.listeners()
    }

    /// How many times gesture listeners were (re)registered
    pub fn gate_registrations(&self) -> usize {
        self.inner.gate.registrations()
    }
}
