//! Keep the background track playing
//!
//! There is no reliable "playback silently stopped" event on the web, so the
//! monitor polls. Each tick compares what the sound is actually doing with
//! what the controller intends, and restarts playback when they disagree.
//! Restarts are bounded: after `max_consecutive_failures` restarts that never
//! become audible the monitor ends itself and the music stays paused.

use crate::session::{AudioSession, PlayAttempt};
use crate::types::SessionState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Monitor tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Time between ticks
    pub interval: Duration,

    /// How long a restarted sound gets to become audible
    pub grace: Duration,

    /// Restarts in a row that may fail before giving up
    pub max_consecutive_failures: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            grace: Duration::from_secs(1),
            max_consecutive_failures: 3,
        }
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Playing as intended
    Healthy,

    /// Not supposed to be playing
    Idle,

    /// Supposed to play but the resource is not loaded yet
    AwaitingLoad,

    /// Another play request is outstanding
    Busy,

    /// Playback was restarted and is audible again
    Restarted,

    /// Restart did not produce audio
    RestartFailed { consecutive: u32 },

    /// Failure ceiling reached, monitor stops
    GaveUp,

    /// Session failed, stopped or was released, monitor stops
    SessionEnded,
}

impl TickOutcome {
    pub fn is_terminal(self) -> bool {
        matches!(self, TickOutcome::GaveUp | TickOutcome::SessionEnded)
    }
}

/// Polls one session and restarts it when needed
pub struct ContinuityMonitor {
    session: Arc<AudioSession>,
    settings: MonitorSettings,
    consecutive_failures: u32,
    ticks: Arc<AtomicU64>,
    restarts: Arc<AtomicU64>,
}

impl ContinuityMonitor {
    pub fn new(session: Arc<AudioSession>, settings: MonitorSettings) -> Self {
        Self {
            session,
            settings,
            consecutive_failures: 0,
            ticks: Arc::new(AtomicU64::new(0)),
            restarts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run one check
    pub async fn tick(&mut self) -> TickOutcome {
        let state = self.session.state();
        if self.session.is_released()
            || matches!(state, SessionState::Failed | SessionState::Stopped)
        {
            return TickOutcome::SessionEnded;
        }

        self.ticks.fetch_add(1, Ordering::Relaxed);

        if self.session.observe_playing() {
            self.consecutive_failures = 0;
            return TickOutcome::Healthy;
        }
        if !self.session.should_be_playing() {
            return TickOutcome::Idle;
        }
        if !self.session.sound().is_loaded() {
            return TickOutcome::AwaitingLoad;
        }

        debug!("Music should be playing but is not, restarting");

        match self.session.try_play(true).await {
            PlayAttempt::InFlight => TickOutcome::Busy,
            PlayAttempt::Unavailable => TickOutcome::SessionEnded,
            PlayAttempt::AlreadyPlaying => {
                self.consecutive_failures = 0;
                TickOutcome::Healthy
            }
            PlayAttempt::Started => {
                self.restarts.fetch_add(1, Ordering::Relaxed);
                time::sleep(self.settings.grace).await;
                if self.session.is_released() {
                    TickOutcome::SessionEnded
                } else if self.session.observe_playing() {
                    self.consecutive_failures = 0;
                    info!("Background music restarted");
                    TickOutcome::Restarted
                } else {
                    self.record_failure()
                }
            }
            PlayAttempt::Rejected(e) => {
                self.restarts.fetch_add(1, Ordering::Relaxed);
                debug!("Restart refused: {}", e);
                self.record_failure()
            }
        }
    }

    fn record_failure(&mut self) -> TickOutcome {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.settings.max_consecutive_failures {
            TickOutcome::GaveUp
        } else {
            TickOutcome::RestartFailed {
                consecutive: self.consecutive_failures,
            }
        }
    }

    /// Run the monitor on its own task until it ends or is cancelled
    pub fn spawn(mut self) -> MonitorHandle {
        let ticks = Arc::clone(&self.ticks);
        let restarts = Arc::clone(&self.restarts);
        let period = self.settings.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Continuity monitor started ({}ms interval)", period.as_millis());

            loop {
                ticker.tick().await;

                let outcome = self.tick().await;
                if !outcome.is_terminal() {
                    debug!("Monitor tick: {:?}", outcome);
                    continue;
                }

                if outcome == TickOutcome::GaveUp {
                    warn!(
                        "Continuity monitor giving up after {} failed restarts",
                        self.consecutive_failures
                    );
                } else {
                    debug!("Continuity monitor stopped: session ended");
                }
                return outcome;
            }
        });

        MonitorHandle {
            task,
            ticks,
            restarts,
        }
    }
}

/// Owner of a running monitor task
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct MonitorHandle {
    task: JoinHandle<TickOutcome>,
    ticks: Arc<AtomicU64>,
    restarts: Arc<AtomicU64>,
}

impl MonitorHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Checks performed so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Restart attempts issued so far
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{SimulatedBackend, SimulatedScript};
    use crate::types::{PlaybackStatus, SessionConfig};
    use crate::volume::Volume;
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

    async fn playing_session(backend: &SimulatedBackend) -> Arc<AudioSession> {
        let session = open(backend);
        session.set_should_be_playing(true);
        session.try_play(false).await;
        session
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_tick_resets_failures() {
        let backend = SimulatedBackend::default();
        let session = playing_session(&backend).await;
        let mut monitor = ContinuityMonitor::new(Arc::clone(&session), MonitorSettings::default());

        monitor.consecutive_failures = 2;
        assert_eq!(monitor.tick().await, TickOutcome::Healthy);
        assert_eq!(monitor.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_playback_is_restarted() {
        let backend = SimulatedBackend::default();
        let session = playing_session(&backend).await;
        let mut monitor = ContinuityMonitor::new(Arc::clone(&session), MonitorSettings::default());

        backend.last_sound().expect("sound").interrupt();
        assert_eq!(monitor.tick().await, TickOutcome::Restarted);
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(backend.play_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_by_user_is_left_alone() {
        let backend = SimulatedBackend::default();
        let session = playing_session(&backend).await;
        session.pause();
        let mut monitor = ContinuityMonitor::new(Arc::clone(&session), MonitorSettings::default());

        assert_eq!(monitor.tick().await, TickOutcome::Idle);
        assert_eq!(backend.play_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_restart_counts_as_failure() {
        let backend = SimulatedBackend::default();
        let session = playing_session(&backend).await;
        let sound = backend.last_sound().expect("sound");
        sound.interrupt();
        sound.stall_plays(true);

        let mut monitor = ContinuityMonitor::new(Arc::clone(&session), MonitorSettings::default());
        assert_eq!(
            monitor.tick().await,
            TickOutcome::RestartFailed { consecutive: 1 }
        );
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_ceiling() {
        let backend = SimulatedBackend::default();
        let session = playing_session(&backend).await;
        let sound = backend.last_sound().expect("sound");
        sound.interrupt();
        sound.fail_all_plays();

        let settings = MonitorSettings {
            max_consecutive_failures: 2,
            ..MonitorSettings::default()
        };
        let mut monitor = ContinuityMonitor::new(Arc::clone(&session), settings);
        assert_eq!(
            monitor.tick().await,
            TickOutcome::RestartFailed { consecutive: 1 }
        );
        assert_eq!(monitor.tick().await, TickOutcome::GaveUp);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_tick_is_not_a_restart() {
        let backend = SimulatedBackend::default();
        let session = playing_session(&backend).await;
        backend.last_sound().expect("sound").interrupt();

        let mut monitor = ContinuityMonitor::new(Arc::clone(&session), MonitorSettings::default());
        let restarts = Arc::clone(&monitor.restarts);
        let guard = session.begin_play().expect("play slot");

        assert_eq!(monitor.tick().await, TickOutcome::Busy);
        assert_eq!(restarts.load(Ordering::Relaxed), 0);
        assert_eq!(backend.play_calls(), 1);

        drop(guard);
        assert_eq!(monitor.tick().await, TickOutcome::Restarted);
        assert_eq!(restarts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn only_gave_up_and_ended_are_terminal() {
        assert!(TickOutcome::GaveUp.is_terminal());
        assert!(TickOutcome::SessionEnded.is_terminal());
        assert!(!TickOutcome::Busy.is_terminal());
        assert!(!TickOutcome::RestartFailed { consecutive: 2 }.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn awaits_load_before_restarting() {
        let backend = SimulatedBackend::new(SimulatedScript {
            deferred_load: true,
            ..SimulatedScript::default()
        });
        let session = open(&backend);
        session.set_should_be_playing(true);

        let mut monitor = ContinuityMonitor::new(Arc::clone(&session), MonitorSettings::default());
        assert_eq!(monitor.tick().await, TickOutcome::AwaitingLoad);
        assert_eq!(backend.play_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn released_session_ends_monitor() {
        let backend = SimulatedBackend::default();
        let session = playing_session(&backend).await;
        let monitor = ContinuityMonitor::new(Arc::clone(&session), MonitorSettings::default());
        let handle = monitor.spawn();

        session.release();
        time::sleep(Duration::from_secs(4)).await;
        assert!(!handle.is_running());
        assert_eq!(handle.ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticking() {
        let backend = SimulatedBackend::default();
        let session = playing_session(&backend).await;
        let handle = ContinuityMonitor::new(Arc::clone(&session), MonitorSettings::default()).spawn();

        time::sleep(Duration::from_millis(6500)).await;
        assert_eq!(handle.ticks(), 2);

        let ticks = Arc::clone(&handle.ticks);
        handle.cancel();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ticks.load(Ordering::Relaxed), 2);
    }
}
