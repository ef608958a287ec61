//! First playback attempt, made without a user gesture

use crate::session::{AudioSession, PlayAttempt};
use crate::types::SessionState;
use tracing::{debug, info};

/// Whether the programmatic start worked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoplayOutcome {
    pub started: bool,
}

/// Try to start the session once it has loaded
///
/// Loading is asynchronous, so the play request is held back until the sound
/// reports `Load` (or fails). A refusal after that is the normal case on most
/// browsers and is not an error: the caller arms the interaction gate instead.
/// The audio context is left alone here because resuming it without a
/// gesture fails anyway.
pub async fn attempt_autoplay(session: &AudioSession) -> AutoplayOutcome {
    if session.state() == SessionState::Loading {
        debug!("Autoplay waiting for the track to load");
    }

    match session.loaded().await {
        SessionState::Failed => {
            debug!("Skipping autoplay: session failed to load");
            return AutoplayOutcome { started: false };
        }
        SessionState::Stopped => return AutoplayOutcome { started: false },
        _ => {}
    }

    let started = match session.try_play(false).await {
        PlayAttempt::Started | PlayAttempt::AlreadyPlaying => {
            info!("Background music autoplay started");
            true
        }
        PlayAttempt::Rejected(e) => {
            debug!("Autoplay was prevented ({}), waiting for user interaction", e);
            false
        }
        PlayAttempt::InFlight | PlayAttempt::Unavailable => false,
    };

    AutoplayOutcome { started }
}
