//! Tribute Audio - Background Music Control
//!
//! Keeps one looping background track playing on the birthday tribute page.
//!
//! This crate provides:
//! - A single audio session per page (re-entrant starts reuse it)
//! - Autoplay with a gesture-gated fallback when the browser refuses
//! - A continuity monitor that restarts silently stopped playback
//! - A linear fade-out that releases the session exactly once
//! - A read-only playback status for views, pushed over a `watch` channel
//!
//! # Architecture
//!
//! `tribute-audio` does not talk to any audio API directly. The platform
//! provides a [`SoundBackend`] that hands out [`Sound`] handles and reports
//! load/play events through an [`EventSink`]. [`simulated::SimulatedBackend`]
//! is a scriptable headless backend used by the tests and the demo page.
//!
//! # Example: Blocked Autoplay
//!
//! ```rust
//! use std::sync::Arc;
//! use tribute_audio::simulated::{AutoplayPolicy, SimulatedBackend, SimulatedScript};
//! use tribute_audio::{AudioSessionManager, ControllerConfig, GestureKind, StartOutcome};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let backend = Arc::new(SimulatedBackend::new(SimulatedScript {
//!         autoplay: AutoplayPolicy::BlockedUntilActivation,
//!         ..SimulatedScript::default()
//!     }));
//!     let manager = AudioSessionManager::new(ControllerConfig::default(), backend.clone());
//!
//!     // Hero section mounted
//!     assert_eq!(manager.on_music_start().await, StartOutcome::AwaitingGesture);
//!     assert_eq!(manager.status().label(), "Tap to Play");
//!
//!     // First click anywhere on the page
//!     backend.grant_user_activation();
//!     manager.on_gesture(GestureKind::Click).await;
//!     assert_eq!(manager.status().label(), "Music Playing");
//!
//!     manager.dispose();
//! }
//! ```
//!
//! # Example: Closing Section
//!
//! ```rust
//! use std::sync::Arc;
//! use tribute_audio::simulated::SimulatedBackend;
//! use tribute_audio::{AudioSessionManager, ControllerConfig, SessionState};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = ControllerConfig {
//!         fade_duration_ms: 100,
//!         fade_step_ms: 10,
//!         ..ControllerConfig::default()
//!     };
//!     let manager = AudioSessionManager::new(config, Arc::new(SimulatedBackend::default()));
//!     manager.on_music_start().await;
//!
//!     assert!(manager.on_music_end());
//!     manager.wait_for_fade().await;
//!     assert_eq!(manager.session_state(), SessionState::Stopped);
//! }
//! ```

mod autoplay;
mod backend;
mod config;
mod error;
mod events;
mod fade;
mod manager;
mod monitor;
mod session;
pub mod simulated;
pub mod state;
pub mod types;
mod unlock;
mod volume;

// Public exports
pub use autoplay::{attempt_autoplay, AutoplayOutcome};
pub use backend::{ContextState, Sound, SoundBackend, SoundOptions};
pub use config::ControllerConfig;
pub use error::{AudioError, Result, SoundError};
pub use events::{EventSink, SoundEvent};
pub use fade::{fade_out_and_stop, FadeHandle, FadePlan, DEFAULT_FADE_DURATION, DEFAULT_FADE_STEP};
pub use manager::{AudioSessionManager, StartOutcome};
pub use monitor::{ContinuityMonitor, MonitorHandle, MonitorSettings, TickOutcome};
pub use session::{AudioSession, SessionSlot};
pub use types::{GestureKind, PlaybackStatus, SessionConfig, SessionState};
pub use unlock::{InteractionGate, UnlockOutcome};
pub use volume::Volume;
