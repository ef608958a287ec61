//! Core types for background music control

use crate::volume::Volume;
use serde::{Deserialize, Serialize};

/// Lifecycle state of the background track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No sound handle requested yet
    #[default]
    Idle,

    /// Resource requested, not yet confirmed loaded
    Loading,

    /// Audible
    Playing,

    /// Loaded but silent (user pause, policy block, interruption)
    Paused,

    /// Stopped and released
    Stopped,

    /// Resource failed to load or decode
    Failed,
}

impl SessionState {
    /// Read-only projection handed to views
    pub fn status(self) -> PlaybackStatus {
        PlaybackStatus {
            is_loading: matches!(self, SessionState::Idle | SessionState::Loading),
            is_playing: self == SessionState::Playing,
            has_failed: self == SessionState::Failed,
        }
    }

    /// Whether the session can still be asked to play
    pub fn is_playable(self) -> bool {
        !matches!(self, SessionState::Stopped | SessionState::Failed)
    }
}

/// What views are allowed to see of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub is_loading: bool,
    pub is_playing: bool,
    pub has_failed: bool,
}

impl PlaybackStatus {
    /// Label for the status indicator button
    pub fn label(&self) -> &'static str {
        if self.has_failed {
            "Music Unavailable"
        } else if self.is_playing {
            "Music Playing"
        } else if self.is_loading {
            "Loading..."
        } else {
            "Tap to Play"
        }
    }
}

/// User gestures the page forwards to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GestureKind {
    Click,
    PointerDown,
    TouchStart,
    /// Softer trigger, only honoured when enabled in config
    Scroll,
}

impl GestureKind {
    /// Gestures that always count as user activation
    pub const ACTIVATING: [GestureKind; 3] = [
        GestureKind::Click,
        GestureKind::PointerDown,
        GestureKind::TouchStart,
    ];
}

/// Parameters for the single background track
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Fully resolved track URL
    pub source_url: String,

    /// Initial volume
    pub volume: Volume,

    /// Loop the track (always true for background music)
    pub looping: bool,

    /// Try to start without a user gesture
    pub autoplay: bool,

    /// Stream the file instead of decoding it up front
    pub streaming: bool,
}
