//! Platform-agnostic sound primitive
//!
//! Abstracts the audio stack that actually plays the track (a browser audio
//! element, a native player, or [`crate::simulated::SimulatedBackend`]).
//! The controller never reaches past these traits.

use crate::error::SoundError;
use crate::events::EventSink;
use async_trait::async_trait;
use std::sync::Arc;

/// How the sound should be created
#[derive(Debug, Clone, PartialEq)]
pub struct SoundOptions {
    /// Initial linear volume in [0.0, 1.0]
    pub volume: f32,

    /// Restart from the beginning when the track ends
    pub looping: bool,

    /// Stream instead of decoding the whole file first
    pub streaming: bool,
}

/// State of the low-level audio context behind a sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Processing audio
    Running,

    /// Halted until resumed from a user gesture
    Suspended,

    /// The platform does not expose a context
    Unavailable,
}

/// Factory for sound handles
pub trait SoundBackend: Send + Sync {
    /// Begin loading `url`
    ///
    /// Returns immediately. The outcome of the load is reported later through
    /// `events` as [`crate::SoundEvent::Load`] or
    /// [`crate::SoundEvent::LoadError`].
    fn load(&self, url: &str, options: &SoundOptions, events: EventSink) -> Arc<dyn Sound>;
}

/// One loaded (or loading) sound
///
/// Implementors report lifecycle changes through the [`EventSink`] they were
/// given at load time.
#[async_trait]
pub trait Sound: Send + Sync {
    /// Request playback
    ///
    /// A policy refusal may be reported synchronously or after the platform's
    /// asynchronous start fails; both come back as `Err`.
    async fn play(&self) -> Result<(), SoundError>;

    fn pause(&self);

    fn stop(&self);

    /// Release the underlying resource
    fn unload(&self);

    fn volume(&self) -> f32;

    fn set_volume(&self, volume: f32);

    fn looping(&self) -> bool;

    fn set_looping(&self, looping: bool);

    /// Whether audio is actually coming out right now
    fn is_playing(&self) -> bool;

    /// Whether the resource finished loading
    fn is_loaded(&self) -> bool;

    /// State of the audio context, if the platform has one
    fn context_state(&self) -> ContextState {
        ContextState::Unavailable
    }

    /// Resume a suspended audio context
    async fn resume_context(&self) -> Result<(), SoundError> {
        Ok(())
    }
}
