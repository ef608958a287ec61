//! Error types for background music control

use thiserror::Error;

/// Failures reported by the underlying sound primitive
///
/// These never reach views. The controller turns them into state
/// transitions or silent retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoundError {
    /// Autoplay policy refused to start playback without a user gesture
    #[error("Playback blocked by autoplay policy")]
    Blocked,

    /// Play was requested before the resource finished loading
    #[error("Sound is not loaded")]
    NotLoaded,

    /// The low-level audio context is suspended
    #[error("Audio context is suspended")]
    ContextSuspended,

    /// Any other playback rejection
    #[error("Playback error: {0}")]
    Playback(String),

    /// Resuming the audio context failed
    #[error("Audio context error: {0}")]
    Context(String),
}

/// Controller errors returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// No session has been created yet (music is still loading)
    #[error("No audio session exists yet")]
    NoSession,

    /// The session failed to load its resource
    #[error("Audio session failed to load")]
    SessionFailed,

    /// The session is fading out or already released
    #[error("Audio session has ended")]
    SessionEnded,

    /// The manager was torn down
    #[error("Audio session manager has been disposed")]
    Disposed,

    /// A manual retry was requested for a session that did not fail
    #[error("Audio session has not failed")]
    NotFailed,

    /// All manual retries after a load failure were used
    #[error("Manual retry limit reached ({limit})")]
    RetryExhausted { limit: u32 },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, AudioError>;
