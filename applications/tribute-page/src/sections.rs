//! Page sections that drive the background music
//!
//! Each section holds a clone of the manager and only calls its narrow entry
//! points. Sections may be mounted more than once (re-renders); the
//! once-guards keep the music calls to a single invocation each.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tribute_audio::{AudioSessionManager, PlaybackStatus, StartOutcome};

/// Opening section; starts the music when first shown
pub struct HeroSection {
    manager: AudioSessionManager,
    started: AtomicBool,
}

impl HeroSection {
    pub fn new(manager: AudioSessionManager) -> Self {
        Self {
            manager,
            started: AtomicBool::new(false),
        }
    }

    /// Returns `None` on re-mounts
    pub async fn mount(&self) -> Option<StartOutcome> {
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("Hero section re-mounted, music already started");
            return None;
        }
        Some(self.manager.on_music_start().await)
    }
}

/// Last section; ends the music after a short delay
pub struct ClosingSection {
    manager: AudioSessionManager,
    delay: Duration,
    triggered: AtomicBool,
}

impl ClosingSection {
    pub fn new(manager: AudioSessionManager, delay: Duration) -> Self {
        Self {
            manager,
            delay,
            triggered: AtomicBool::new(false),
        }
    }

    /// Wait for the closing delay, then fade the music out
    pub async fn mount(&self) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }

        tokio::time::sleep(self.delay).await;
        info!("Closing section reached, fading out music");
        self.manager.on_music_end()
    }
}

#[derive(Serialize)]
struct StatusLine {
    label: &'static str,
    #[serde(flatten)]
    status: PlaybackStatus,
}

/// Floating music button
pub struct StatusIndicator {
    manager: AudioSessionManager,
    json: bool,
}

impl StatusIndicator {
    pub fn new(manager: AudioSessionManager, json: bool) -> Self {
        Self { manager, json }
    }

    /// Render every status change until the task is aborted
    pub fn spawn_watcher(&self) -> JoinHandle<()> {
        let mut rx = self.manager.subscribe();
        let json = self.json;

        tokio::spawn(async move {
            let status = *rx.borrow_and_update();
            render(status, json);
            while rx.changed().await.is_ok() {
                let status = *rx.borrow_and_update();
                render(status, json);
            }
        })
    }

    /// Button click
    pub async fn click(&self) {
        match self.manager.toggle_play_pause().await {
            Ok(status) => info!("Music button: {}", status.label()),
            Err(e) => warn!("Music button unavailable: {}", e),
        }
    }
}

pub fn render(status: PlaybackStatus, json: bool) {
    if !json {
        info!("Status: {}", status.label());
        return;
    }

    let line = StatusLine {
        label: status.label(),
        status,
    };
    match serde_json::to_string(&line) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Could not encode status: {}", e),
    }
}
