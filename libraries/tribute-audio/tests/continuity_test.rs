//! Continuity monitor tests
//!
//! Verify that silently stopped playback is restarted, that restarts are
//! bounded, and that nothing is retried after a load failure.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tribute_audio::simulated::{SimulatedBackend, SimulatedScript};
use tribute_audio::{AudioSessionManager, ControllerConfig, SessionState, StartOutcome};

// ===== Helpers =====

fn setup(script: SimulatedScript) -> (AudioSessionManager, Arc<SimulatedBackend>) {
    let backend = Arc::new(SimulatedBackend::new(script));
    let manager = AudioSessionManager::new(ControllerConfig::default(), backend.clone());
    (manager, backend)
}

async fn playing() -> (AudioSessionManager, Arc<SimulatedBackend>) {
    let (manager, backend) = setup(SimulatedScript::default());
    assert_eq!(manager.on_music_start().await, StartOutcome::Started);
    (manager, backend)
}

// ===== Restarts =====

#[tokio::test(start_paused = true)]
async fn test_monitor_ticks_on_interval() {
    let (manager, _backend) = playing().await;

    sleep(Duration::from_millis(2900)).await;
    assert_eq!(manager.monitor_ticks(), 0);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.monitor_ticks(), 1);

    sleep(Duration::from_secs(6)).await;
    assert_eq!(manager.monitor_ticks(), 3);
    assert_eq!(manager.monitor_restarts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_interruption_is_restarted() {
    let (manager, backend) = playing().await;
    let sound = backend.last_sound().expect("sound");

    sound.interrupt();
    assert_eq!(manager.session_state(), SessionState::Playing);

    sleep(Duration::from_millis(4100)).await;
    assert_eq!(backend.play_calls(), 2);
    assert_eq!(manager.monitor_restarts(), 1);
    assert_eq!(manager.session_state(), SessionState::Playing);
    assert!(manager.is_monitor_running());
}

#[tokio::test(start_paused = true)]
async fn test_restarts_are_bounded() {
    let (manager, backend) = playing().await;
    let sound = backend.last_sound().expect("sound");
    sound.interrupt();
    sound.fail_all_plays();

    sleep(Duration::from_secs(60)).await;

    // One initial play plus exactly three restarts
    assert_eq!(backend.play_calls(), 4);
    assert_eq!(manager.monitor_restarts(), 3);
    assert!(!manager.is_monitor_running());
    assert_eq!(manager.pending_timers(), 0);
    assert_eq!(manager.session_state(), SessionState::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_restarts_are_bounded() {
    let (manager, backend) = playing().await;
    let sound = backend.last_sound().expect("sound");
    sound.interrupt();
    sound.stall_plays(true);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.play_calls(), 4);
    assert!(!manager.is_monitor_running());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_resets_counter() {
    let (manager, backend) = playing().await;
    let sound = backend.last_sound().expect("sound");
    sound.interrupt();
    sound.fail_next_plays(2);

    // Two failed restarts, the third succeeds
    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(backend.play_calls(), 4);
    assert_eq!(manager.session_state(), SessionState::Playing);

    // Counter was reset, so the monitor keeps going
    sound.interrupt();
    sound.fail_next_plays(2);
    sleep(Duration::from_secs(9)).await;
    assert!(manager.is_monitor_running());
    assert_eq!(manager.session_state(), SessionState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_restart_resumes_suspended_context() {
    let (manager, backend) = playing().await;
    let sound = backend.last_sound().expect("sound");
    sound.interrupt();
    sound.suspend_context();

    sleep(Duration::from_millis(4100)).await;
    assert_eq!(sound.resume_calls(), 1);
    assert_eq!(manager.session_state(), SessionState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_waits_for_first_playback() {
    let (manager, backend) = setup(SimulatedScript {
        autoplay: tribute_audio::simulated::AutoplayPolicy::BlockedUntilActivation,
        ..SimulatedScript::default()
    });
    assert_eq!(manager.on_music_start().await, StartOutcome::AwaitingGesture);

    sleep(Duration::from_secs(30)).await;
    assert!(!manager.is_monitor_running());
    assert_eq!(manager.monitor_ticks(), 0);
    assert_eq!(backend.play_calls(), 1);
}

// ===== Load failure =====

#[tokio::test(start_paused = true)]
async fn test_load_error_disables_monitoring() {
    let (manager, backend) = setup(SimulatedScript {
        load_failures: 1,
        ..SimulatedScript::default()
    });

    assert_eq!(manager.on_music_start().await, StartOutcome::Failed);
    assert_eq!(manager.session_state(), SessionState::Failed);
    assert_eq!(manager.status().label(), "Music Unavailable");

    sleep(Duration::from_secs(30)).await;
    assert_eq!(manager.monitor_ticks(), 0);
    assert!(!manager.is_monitor_running());
    assert!(!manager.is_gate_armed());
    assert_eq!(backend.play_calls(), 0);
    assert_eq!(backend.sounds_created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_load_error_never_starts_monitor() {
    let (manager, backend) = setup(SimulatedScript {
        deferred_load: true,
        load_failures: 1,
        ..SimulatedScript::default()
    });
    let start = tokio::spawn({
        let manager = manager.clone();
        async move { manager.on_music_start().await }
    });
    tokio::task::yield_now().await;
    assert_eq!(manager.session_state(), SessionState::Loading);

    backend.last_sound().expect("sound").finish_loading();
    assert_eq!(start.await.expect("start task"), StartOutcome::Failed);
    assert_eq!(manager.session_state(), SessionState::Failed);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(manager.monitor_ticks(), 0);
    assert!(!manager.is_monitor_running());
    assert_eq!(backend.play_calls(), 0);
}
