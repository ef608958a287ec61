//! One scripted visit to the tribute page

use crate::sections::{ClosingSection, HeroSection, StatusIndicator};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tribute_audio::simulated::{AutoplayPolicy, SimulatedBackend, SimulatedScript};
use tribute_audio::{AudioSessionManager, ControllerConfig, GestureKind};

/// How the simulated browser treats the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Policy {
    /// Autoplay allowed
    Allowed,
    /// Autoplay refused until the visitor interacts
    Blocked,
    /// The track cannot be decoded
    Broken,
}

/// What the visitor does during the run
#[derive(Debug, Clone)]
pub struct Visit {
    pub policy: Policy,
    pub suspended_context: bool,
    pub interrupt: bool,
    pub gesture: bool,
    pub toggle: bool,
    pub json: bool,
}

impl Visit {
    fn script(&self) -> SimulatedScript {
        SimulatedScript {
            autoplay: match self.policy {
                Policy::Blocked => AutoplayPolicy::BlockedUntilActivation,
                Policy::Allowed | Policy::Broken => AutoplayPolicy::Allowed,
            },
            load_failures: if self.policy == Policy::Broken {
                u32::MAX
            } else {
                0
            },
            context_suspended: self.suspended_context,
            ..SimulatedScript::default()
        }
    }
}

/// Counters printed at the end of a run
#[derive(Debug, Serialize)]
pub struct Summary {
    pub final_status: &'static str,
    pub sessions_created: usize,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub unload_calls: usize,
    pub volume_steps: usize,
}

pub async fn run(config: ControllerConfig, visit: &Visit) -> Summary {
    let backend = Arc::new(SimulatedBackend::new(visit.script()));
    let manager = AudioSessionManager::new(config.clone(), backend.clone());

    let indicator = StatusIndicator::new(manager.clone(), visit.json);
    let watcher = indicator.spawn_watcher();

    let hero = HeroSection::new(manager.clone());
    if let Some(outcome) = hero.mount().await {
        info!("Hero section mounted: {:?}", outcome);
    }
    // Re-render does not restart anything
    hero.mount().await;

    if visit.gesture {
        backend.grant_user_activation();
        let outcome = manager.on_gesture(GestureKind::Click).await;
        info!("Visitor clicked the page: {:?}", outcome);
    }

    if visit.interrupt {
        if let Some(sound) = backend.last_sound() {
            info!("Playback silently interrupted");
            sound.interrupt();
        }
        let settings = config.monitor_settings();
        tokio::time::sleep(settings.interval + settings.grace + Duration::from_millis(100)).await;
    }

    if visit.toggle {
        indicator.click().await;
        indicator.click().await;
    }

    let closing = ClosingSection::new(manager.clone(), config.closing_delay());
    closing.mount().await;
    manager.wait_for_fade().await;
    manager.dispose();

    tokio::task::yield_now().await;
    watcher.abort();

    let sound = backend.last_sound();
    Summary {
        final_status: manager.status().label(),
        sessions_created: manager.sessions_created(),
        play_calls: backend.play_calls(),
        pause_calls: sound.as_ref().map_or(0, |s| s.pause_calls()),
        unload_calls: backend.unload_calls(),
        volume_steps: sound.map_or(0, |s| s.volume_history().len()),
    }
}
