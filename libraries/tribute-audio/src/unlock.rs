//! Start playback from the first user gesture
//!
//! Browsers only allow audio after the user interacted with the page. When
//! autoplay is refused the gate registers gesture listeners. The first
//! qualifying gesture resumes the audio context and plays; success (by any
//! path) retires every listener.

use crate::session::{AudioSession, PlayAttempt};
use crate::state::lock;
use crate::types::GestureKind;
use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::{debug, info};

/// What a gesture did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Gate not armed, or this gesture kind is not registered
    Ignored,

    /// Another play request is still outstanding
    Busy,

    /// The session was already audible; listeners retired
    AlreadyPlaying,

    /// Playback started; listeners retired
    Unlocked,

    /// Play was refused; listeners stay armed for the next gesture
    Retrying { attempts: u32 },

    /// Attempt ceiling reached; listeners retired
    GaveUp,

    /// Session failed or ended; listeners retired
    Unavailable,
}

#[derive(Debug, Default)]
struct GateInner {
    listeners: BTreeSet<GestureKind>,
    failed_attempts: u32,
    registrations: usize,
}

/// Gesture listeners guarding the first playback
#[derive(Debug)]
pub struct InteractionGate {
    inner: Mutex<GateInner>,
    max_attempts: u32,
    unlock_on_scroll: bool,
}

impl InteractionGate {
    pub fn new(max_attempts: u32, unlock_on_scroll: bool) -> Self {
        Self {
            inner: Mutex::new(GateInner::default()),
            max_attempts: max_attempts.max(1),
            unlock_on_scroll,
        }
    }

    /// Register the gesture listeners, replacing any registered before
    pub fn arm(&self) {
        let mut inner = lock(&self.inner);
        inner.listeners.clear();
        inner.failed_attempts = 0;

        inner.listeners.extend(GestureKind::ACTIVATING);
        if self.unlock_on_scroll {
            inner.listeners.insert(GestureKind::Scroll);
        }
        inner.registrations += 1;

        debug!("Interaction gate armed for {:?}", inner.listeners);
    }

    /// Remove every listener; returns whether any were registered
    pub fn disarm(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.listeners.is_empty() {
            return false;
        }
        inner.listeners.clear();
        debug!("Interaction gate disarmed");
        true
    }

    pub fn is_armed(&self) -> bool {
        !lock(&self.inner).listeners.is_empty()
    }

    /// Currently registered gesture kinds
    pub fn listeners(&self) -> Vec<GestureKind> {
        lock(&self.inner).listeners.iter().copied().collect()
    }

    /// How many times the listener set has been (re)registered
    pub fn registrations(&self) -> usize {
        lock(&self.inner).registrations
    }

    fn accepts(&self, kind: GestureKind) -> bool {
        lock(&self.inner).listeners.contains(&kind)
    }

    /// Handle one user gesture
    pub async fn handle(&self, kind: GestureKind, session: &AudioSession) -> UnlockOutcome {
        if !self.accepts(kind) {
            return UnlockOutcome::Ignored;
        }

        match session.try_play(true).await {
            PlayAttempt::Started => {
                self.disarm();
                info!("Music started on user interaction ({:?})", kind);
                UnlockOutcome::Unlocked
            }
            PlayAttempt::AlreadyPlaying => {
                self.disarm();
                UnlockOutcome::AlreadyPlaying
            }
            PlayAttempt::InFlight => UnlockOutcome::Busy,
            PlayAttempt::Unavailable => {
                self.disarm();
                UnlockOutcome::Unavailable
            }
            PlayAttempt::Rejected(e) => self.record_failure(&e.to_string()),
        }
    }

    fn record_failure(&self, reason: &str) -> UnlockOutcome {
        let mut inner = lock(&self.inner);
        if inner.listeners.is_empty() {
            // Disarmed while the request was outstanding
            return UnlockOutcome::Ignored;
        }

        inner.failed_attempts += 1;
        if inner.failed_attempts >= self.max_attempts {
            inner.listeners.clear();
            debug!(
                "Giving up on gesture unlock after {} attempts ({})",
                inner.failed_attempts, reason
            );
            return UnlockOutcome::GaveUp;
        }

        debug!("Gesture play failed ({}), listeners stay armed", reason);
        UnlockOutcome::Retrying {
            attempts: inner.failed_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{AutoplayPolicy, SimulatedBackend, SimulatedScript};
    use crate::types::{PlaybackStatus, SessionConfig, SessionState};
    use crate::volume::Volume;
    use std::sync::Arc;
    use tokio::sync::watch;

    fn open(backend: &SimulatedBackend) -> Arc<AudioSession> {
        let config = SessionConfig {
            source_url: "/music/song.mp3".to_string(),
            volume: Volume::DEFAULT,
            looping: true,
            autoplay: true,
            streaming: true,
        };
        let tx = Arc::new(watch::channel(PlaybackStatus::default()).0);
        AudioSession::open(config, backend, tx)
    }

    #[test]
    fn arm_registers_activating_gestures() {
        let gate = InteractionGate::new(3, false);
        gate.arm();
        assert_eq!(
            gate.listeners(),
            vec![
                GestureKind::Click,
                GestureKind::PointerDown,
                GestureKind::TouchStart
            ]
        );

        let gate = InteractionGate::new(3, true);
        gate.arm();
        assert!(gate.listeners().contains(&GestureKind::Scroll));
    }

    #[test]
    fn rearming_replaces_listeners() {
        let gate = InteractionGate::new(3, false);
        gate.arm();
        gate.arm();
        assert_eq!(gate.listeners().len(), 3);
        assert_eq!(gate.registrations(), 2);
    }

    #[tokio::test]
    async fn unarmed_gate_ignores_gestures() {
        let backend = SimulatedBackend::default();
        let session = open(&backend);
        let gate = InteractionGate::new(3, false);

        let outcome = gate.handle(GestureKind::Click, &session).await;
        assert_eq!(outcome, UnlockOutcome::Ignored);
        assert_eq!(backend.play_calls(), 0);
    }

    #[tokio::test]
    async fn scroll_needs_opt_in() {
        let backend = SimulatedBackend::default();
        let session = open(&backend);
        let gate = InteractionGate::new(3, false);
        gate.arm();

        let outcome = gate.handle(GestureKind::Scroll, &session).await;
        assert_eq!(outcome, UnlockOutcome::Ignored);
        assert!(gate.is_armed());
    }

    #[tokio::test]
    async fn gesture_resumes_context_then_plays() {
        let backend = SimulatedBackend::new(SimulatedScript {
            context_suspended: true,
            ..SimulatedScript::default()
        });
        let session = open(&backend);
        let gate = InteractionGate::new(3, false);
        gate.arm();

        let outcome = gate.handle(GestureKind::TouchStart, &session).await;
        assert_eq!(outcome, UnlockOutcome::Unlocked);
        assert_eq!(session.state(), SessionState::Playing);
        assert!(!gate.is_armed());

        let sound = backend.last_sound().expect("sound");
        assert_eq!(sound.resume_calls(), 1);
        assert_eq!(sound.play_calls(), 1);
    }

    #[tokio::test]
    async fn resume_failure_is_swallowed() {
        let backend = SimulatedBackend::new(SimulatedScript {
            resume_fails: true,
            context_suspended: true,
            ..SimulatedScript::default()
        });
        let session = open(&backend);
        let gate = InteractionGate::new(3, false);
        gate.arm();

        // Context stays suspended, play is refused, gate stays armed
        let outcome = gate.handle(GestureKind::Click, &session).await;
        assert_eq!(outcome, UnlockOutcome::Retrying { attempts: 1 });
        assert!(gate.is_armed());
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let backend = SimulatedBackend::new(SimulatedScript {
            autoplay: AutoplayPolicy::BlockedUntilActivation,
            ..SimulatedScript::default()
        });
        let session = open(&backend);
        let gate = InteractionGate::new(2, false);
        gate.arm();

        assert_eq!(
            gate.handle(GestureKind::Click, &session).await,
            UnlockOutcome::Retrying { attempts: 1 }
        );
        assert_eq!(
            gate.handle(GestureKind::Click, &session).await,
            UnlockOutcome::GaveUp
        );
        assert!(!gate.is_armed());
        assert_eq!(
            gate.handle(GestureKind::Click, &session).await,
            UnlockOutcome::Ignored
        );
        assert_eq!(backend.play_calls(), 2);
    }

    #[tokio::test]
    async fn playing_session_only_retires_listeners() {
        let backend = SimulatedBackend::default();
        let session = open(&backend);
        session.try_play(false).await;

        let gate = InteractionGate::new(3, false);
        gate.arm();
        let outcome = gate.handle(GestureKind::PointerDown, &session).await;

        assert_eq!(outcome, UnlockOutcome::AlreadyPlaying);
        assert!(!gate.is_armed());
        assert_eq!(backend.play_calls(), 1);
    }
}
