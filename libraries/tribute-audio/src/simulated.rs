//! Headless sound backend
//!
//! Behaves like a browser audio stack closely enough to exercise the
//! controller: autoplay policy, suspended audio context, load failures,
//! silent interruptions. Nothing is decoded or played; every call is counted
//! so tests and the demo page can inspect what the controller did.

use crate::backend::{ContextState, Sound, SoundBackend, SoundOptions};
use crate::error::SoundError;
use crate::events::{EventSink, SoundEvent};
use crate::state::lock;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the simulated platform treats play requests without a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoplayPolicy {
    /// Play always allowed
    #[default]
    Allowed,

    /// Refused until [`SimulatedBackend::grant_user_activation`]
    BlockedUntilActivation,

    /// The first `n` play requests are refused
    BlockFirst(u32),
}

/// Script for a [`SimulatedBackend`]
#[derive(Debug, Clone, Default)]
pub struct SimulatedScript {
    pub autoplay: AutoplayPolicy,

    /// The first `n` loads report a decode failure
    pub load_failures: u32,

    /// Loads complete only when [`SimulatedSound::finish_loading`] is called
    pub deferred_load: bool,

    /// Sounds start with a suspended audio context
    pub context_suspended: bool,

    /// Time a context resume takes
    pub resume_delay: Duration,

    /// Context resumes always fail
    pub resume_fails: bool,
}

/// Scriptable [`SoundBackend`]
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    script: SimulatedScript,
    activated: Arc<AtomicBool>,
    loads: AtomicU32,
    sounds: Mutex<Vec<Arc<SimulatedSound>>>,
}

impl SimulatedBackend {
    pub fn new(script: SimulatedScript) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Mark the page as having received a user gesture
    pub fn grant_user_activation(&self) {
        self.activated.store(true, Ordering::Release);
    }

    pub fn sounds_created(&self) -> usize {
        lock(&self.sounds).len()
    }

    pub fn last_sound(&self) -> Option<Arc<SimulatedSound>> {
        lock(&self.sounds).last().cloned()
    }

    /// Play requests across every sound this backend created
    pub fn play_calls(&self) -> usize {
        lock(&self.sounds).iter().map(|s| s.play_calls()).sum()
    }

    pub fn unload_calls(&self) -> usize {
        lock(&self.sounds).iter().map(|s| s.unload_calls()).sum()
    }
}

impl SoundBackend for SimulatedBackend {
    fn load(&self, url: &str, options: &SoundOptions, events: EventSink) -> Arc<dyn Sound> {
        let index = self.loads.fetch_add(1, Ordering::AcqRel);
        let sound = Arc::new(SimulatedSound {
            url: url.to_string(),
            script: self.script.clone(),
            activated: Arc::clone(&self.activated),
            events,
            inner: Mutex::new(SimState {
                load_fails: index < self.script.load_failures,
                volume: options.volume.clamp(0.0, 1.0),
                looping: options.looping,
                context: if self.script.context_suspended {
                    ContextState::Suspended
                } else {
                    ContextState::Running
                },
                blocked_remaining: match self.script.autoplay {
                    AutoplayPolicy::BlockFirst(n) => n,
                    _ => 0,
                },
                ..SimState::default()
            }),
        });

        lock(&self.sounds).push(Arc::clone(&sound));

        if !self.script.deferred_load {
            sound.finish_loading();
        }
        sound
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PlayFailures {
    #[default]
    None,
    Next(u32),
    Always,
}

#[derive(Debug)]
struct SimState {
    loaded: bool,
    load_fails: bool,
    playing: bool,
    unloaded: bool,
    stall: bool,
    volume: f32,
    looping: bool,
    context: ContextState,
    blocked_remaining: u32,
    failures: PlayFailures,
    play_calls: usize,
    pause_calls: usize,
    stop_calls: usize,
    unload_calls: usize,
    resume_calls: usize,
    volume_history: Vec<f32>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            loaded: false,
            load_fails: false,
            playing: false,
            unloaded: false,
            stall: false,
            volume: 1.0,
            looping: false,
            context: ContextState::Running,
            blocked_remaining: 0,
            failures: PlayFailures::None,
            play_calls: 0,
            pause_calls: 0,
            stop_calls: 0,
            unload_calls: 0,
            resume_calls: 0,
            volume_history: Vec::new(),
        }
    }
}

/// Sound created by a [`SimulatedBackend`]
#[derive(Debug)]
pub struct SimulatedSound {
    url: String,
    script: SimulatedScript,
    activated: Arc<AtomicBool>,
    events: EventSink,
    inner: Mutex<SimState>,
}

impl SimulatedSound {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Complete a pending load, reporting success or the scripted failure
    pub fn finish_loading(&self) {
        let event = {
            let mut state = lock(&self.inner);
            if state.load_fails {
                SoundEvent::LoadError(format!("Failed to decode {}", self.url))
            } else {
                state.loaded = true;
                SoundEvent::Load
            }
        };
        self.events.emit(event);
    }

    /// Stop producing audio without reporting any event
    ///
    /// Models the platform silently halting playback (tab backgrounded,
    /// device change, phone call).
    pub fn interrupt(&self) {
        lock(&self.inner).playing = false;
    }

    /// Reject the next `n` play requests
    pub fn fail_next_plays(&self, n: u32) {
        lock(&self.inner).failures = PlayFailures::Next(n);
    }

    /// Reject every play request from now on
    pub fn fail_all_plays(&self) {
        lock(&self.inner).failures = PlayFailures::Always;
    }

    /// Accept play requests without ever becoming audible
    pub fn stall_plays(&self, stall: bool) {
        lock(&self.inner).stall = stall;
    }

    pub fn suspend_context(&self) {
        lock(&self.inner).context = ContextState::Suspended;
    }

    pub fn play_calls(&self) -> usize {
        lock(&self.inner).play_calls
    }

    pub fn pause_calls(&self) -> usize {
        lock(&self.inner).pause_calls
    }

    pub fn stop_calls(&self) -> usize {
        lock(&self.inner).stop_calls
    }

    pub fn unload_calls(&self) -> usize {
        lock(&self.inner).unload_calls
    }

    pub fn resume_calls(&self) -> usize {
        lock(&self.inner).resume_calls
    }

    /// Every value passed to `set_volume`, in order
    pub fn volume_history(&self) -> Vec<f32> {
        lock(&self.inner).volume_history.clone()
    }

    pub fn is_unloaded(&self) -> bool {
        lock(&self.inner).unloaded
    }

    fn check_play(&self, state: &mut SimState) -> Result<(), SoundError> {
        if state.unloaded {
            return Err(SoundError::Playback("sound was unloaded".to_string()));
        }
        if !state.loaded {
            return Err(SoundError::NotLoaded);
        }

        match state.failures {
            PlayFailures::Always => {
                return Err(SoundError::Playback("simulated playback failure".to_string()));
            }
            PlayFailures::Next(n) if n > 0 => {
                state.failures = PlayFailures::Next(n - 1);
                return Err(SoundError::Playback("simulated playback failure".to_string()));
            }
            _ => {}
        }

        if state.context == ContextState::Suspended {
            return Err(SoundError::ContextSuspended);
        }

        if self.activated.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.script.autoplay {
            AutoplayPolicy::Allowed => Ok(()),
            AutoplayPolicy::BlockedUntilActivation => Err(SoundError::Blocked),
            AutoplayPolicy::BlockFirst(_) if state.blocked_remaining > 0 => {
                state.blocked_remaining -= 1;
                Err(SoundError::Blocked)
            }
            AutoplayPolicy::BlockFirst(_) => Ok(()),
        }
    }
}

#[async_trait]
impl Sound for SimulatedSound {
    async fn play(&self) -> Result<(), SoundError> {
        let (result, audible) = {
            let mut state = lock(&self.inner);
            state.play_calls += 1;
            let result = self.check_play(&mut state);
            if result.is_ok() && !state.stall {
                state.playing = true;
            }
            (result, state.playing)
        };

        match &result {
            Ok(()) if audible => self.events.emit(SoundEvent::Play),
            Ok(()) => {}
            Err(e) => self.events.emit(SoundEvent::PlayError(e.to_string())),
        }
        result
    }

    fn pause(&self) {
        let was_playing = {
            let mut state = lock(&self.inner);
            state.pause_calls += 1;
            std::mem::replace(&mut state.playing, false)
        };
        if was_playing {
            self.events.emit(SoundEvent::Pause);
        }
    }

    fn stop(&self) {
        {
            let mut state = lock(&self.inner);
            state.stop_calls += 1;
            state.playing = false;
        }
        self.events.emit(SoundEvent::Stop);
    }

    fn unload(&self) {
        let mut state = lock(&self.inner);
        state.unload_calls += 1;
        state.unloaded = true;
        state.loaded = false;
        state.playing = false;
    }

    fn volume(&self) -> f32 {
        lock(&self.inner).volume
    }

    fn set_volume(&self, volume: f32) {
        let mut state = lock(&self.inner);
        state.volume = volume.clamp(0.0, 1.0);
        let volume = state.volume;
        state.volume_history.push(volume);
    }

    fn looping(&self) -> bool {
        lock(&self.inner).looping
    }

    fn set_looping(&self, looping: bool) {
        lock(&self.inner).looping = looping;
    }

    fn is_playing(&self) -> bool {
        let state = lock(&self.inner);
        state.playing && !state.unloaded
    }

    fn is_loaded(&self) -> bool {
        lock(&self.inner).loaded
    }

    fn context_state(&self) -> ContextState {
        lock(&self.inner).context
    }

    async fn resume_context(&self) -> Result<(), SoundError> {
        lock(&self.inner).resume_calls += 1;

        if !self.script.resume_delay.is_zero() {
            tokio::time::sleep(self.script.resume_delay).await;
        }
        if self.script.resume_fails {
            return Err(SoundError::Context("simulated resume failure".to_string()));
        }

        lock(&self.inner).context = ContextState::Running;
        Ok(())
    }
}
