//! Fade the background track out and release it
//!
//! Used when the page reaches its closing section. The ramp is linear over a
//! fixed duration, computed from the volume at the moment the fade starts, so
//! a session that is already quieter fades proportionally faster.

use crate::session::AudioSession;
use crate::types::SessionState;
use crate::volume::Volume;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Default fade length
pub const DEFAULT_FADE_DURATION: Duration = Duration::from_millis(2000);

/// Default time between volume steps
pub const DEFAULT_FADE_STEP: Duration = Duration::from_millis(50);

/// Linear ramp from the current volume to silence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadePlan {
    /// Volume when the fade started
    pub start: f32,

    /// Number of volume steps
    pub steps: u32,

    /// Volume removed per step
    pub volume_step: f32,

    pub step_interval: Duration,
}

impl FadePlan {
    pub fn new(current: Volume, total: Duration, step_interval: Duration) -> Self {
        let step_interval = step_interval.max(Duration::from_millis(1));
        let steps = total
            .as_nanos()
            .div_ceil(step_interval.as_nanos())
            .clamp(1, u128::from(u32::MAX)) as u32;
        let start = current.get();

        Self {
            start,
            steps,
            volume_step: start / steps as f32,
            step_interval,
        }
    }

    /// Target volume after `step` steps (exactly zero at the last one)
    pub fn volume_at(&self, step: u32) -> f32 {
        if step >= self.steps {
            0.0
        } else {
            (self.start - self.volume_step * step as f32).max(0.0)
        }
    }

    /// Every target volume in order, first step to last
    pub fn levels(&self) -> impl Iterator<Item = f32> + '_ {
        (1..=self.steps).map(move |step| self.volume_at(step))
    }

    pub fn duration(&self) -> Duration {
        self.step_interval * self.steps
    }
}

/// Start fading `session` out; no session means nothing to do
///
/// The returned handle owns the step timer. Once the volume reaches zero the
/// sound is stopped and released exactly once. A session that failed to load
/// has nothing audible to ramp down and is released on the spot.
pub fn fade_out_and_stop(
    session: Option<&Arc<AudioSession>>,
    total: Duration,
    step_interval: Duration,
) -> Option<FadeHandle> {
    let Some(session) = session else {
        debug!("No background music to fade out");
        return None;
    };
    if session.is_released() {
        return None;
    }
    if session.state() == SessionState::Failed {
        debug!("Releasing failed background music without a fade");
        session.release();
        return None;
    }

    let plan = FadePlan::new(session.volume(), total, step_interval);
    session.set_should_be_playing(false);

    Some(FadeHandle::spawn(Arc::clone(session), plan))
}

async fn run(session: Arc<AudioSession>, plan: FadePlan, done: watch::Sender<bool>) {
    info!(
        "Fading out background music from {:.3} over {}ms",
        plan.start,
        plan.duration().as_millis()
    );

    if plan.start > 0.0 {
        let mut ticker = time::interval_at(Instant::now() + plan.step_interval, plan.step_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for step in 1..=plan.steps {
            ticker.tick().await;

            let next = session.volume().get().min(plan.volume_at(step));
            session.sound().set_volume(next);
            if next <= 0.0 {
                break;
            }
        }
    }

    session.release();
    done.send_replace(true);
}

/// Owner of a running fade
///
/// Dropping the handle cancels the fade. Waiting goes through
/// [`FadeHandle::finished`], so a waiter never owns the task.
#[derive(Debug)]
pub struct FadeHandle {
    task: JoinHandle<()>,
    done: watch::Receiver<bool>,
}

impl FadeHandle {
    fn spawn(session: Arc<AudioSession>, plan: FadePlan) -> Self {
        let (done_tx, done) = watch::channel(false);
        Self {
            task: tokio::spawn(run(session, plan, done_tx)),
            done,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Resolves once the session was released or the fade was cancelled
    ///
    /// Dropping the returned future has no effect on the fade.
    pub fn finished(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut done = self.done.clone();
        async move {
            // An error means the task was aborted and dropped the sender
            if done.wait_for(|released| *released).await.is_err() {
                debug!("Fade cancelled before completion");
            }
        }
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for FadeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
