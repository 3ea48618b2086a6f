// Timed random draw over a loaded roster.
//
// A draw repeatedly picks a uniformly random attendee at a fixed interval
// until its duration elapses. The selected attendee and the in-progress
// flag are published through watch channels (single writer, any number of
// readers) and to registered observers at the moment they change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::attendee::Attendee;
use crate::clock::{DrawClock, TokioClock};
use crate::cue::{AudioCue, CuePlayer, SilentCuePlayer};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrawError {
    #[error("cannot draw from an empty roster")]
    EmptyRoster,

    #[error("a draw is already in progress")]
    AlreadyDrawing,

    #[error("draw duration and interval must be positive (got {duration:?} and {interval:?})")]
    InvalidTiming {
        duration: Duration,
        interval: Duration,
    },

    #[error("draw cancelled")]
    Cancelled,
}

impl DrawError {
    /// True for errors caused by calling the engine in the wrong state.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, DrawError::EmptyRoster | DrawError::AlreadyDrawing)
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Whether the engine is currently drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    Idle,
    Drawing,
}

/// Result of a completed draw.
#[derive(Debug, Clone, Serialize)]
pub struct DrawOutcome {
    /// The last attendee selected before the duration elapsed.
    pub winner: Attendee,
    /// Number of selections made.
    pub ticks: usize,
    pub finished_at: DateTime<Utc>,
}

/// Synchronous change listener. Called on the draw task at each mutation,
/// before the loop continues, so implementations must return quickly.
pub trait DrawObserver: Send + Sync {
    fn selected_attendee_changed(&self, _attendee: &Attendee) {}

    fn draw_in_progress_changed(&self, _in_progress: bool) {}
}

// ---------------------------------------------------------------------------
// DrawEngine
// ---------------------------------------------------------------------------

pub struct DrawEngine {
    roster: Vec<Attendee>,
    rng: Mutex<StdRng>,
    clock: Arc<dyn DrawClock>,
    cue_player: Arc<dyn CuePlayer>,
    observers: Vec<Arc<dyn DrawObserver>>,
    /// Claimed with a compare-exchange so only one draw runs at a time.
    drawing: AtomicBool,
    selected_tx: watch::Sender<Option<Attendee>>,
    in_progress_tx: watch::Sender<bool>,
}

impl DrawEngine {
    /// Engine with an OS-seeded RNG, the tokio clock and no audio.
    pub fn new(roster: Vec<Attendee>) -> Self {
        Self::with_rng(roster, StdRng::from_os_rng())
    }

    pub fn with_rng(roster: Vec<Attendee>, rng: StdRng) -> Self {
        let (selected_tx, _) = watch::channel(None);
        let (in_progress_tx, _) = watch::channel(false);
        DrawEngine {
            roster,
            rng: Mutex::new(rng),
            clock: Arc::new(TokioClock),
            cue_player: Arc::new(SilentCuePlayer),
            observers: Vec::new(),
            drawing: AtomicBool::new(false),
            selected_tx,
            in_progress_tx,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn DrawClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cue_player(mut self, player: Arc<dyn CuePlayer>) -> Self {
        self.cue_player = player;
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn DrawObserver>) {
        self.observers.push(observer);
    }

    pub fn roster(&self) -> &[Attendee] {
        &self.roster
    }

    /// Swap in a freshly loaded roster for a new session. The previous
    /// selection is cleared.
    pub fn replace_roster(&mut self, roster: Vec<Attendee>) {
        self.roster = roster;
        self.selected_tx.send_replace(None);
    }

    pub fn state(&self) -> DrawState {
        if self.drawing.load(Ordering::Acquire) {
            DrawState::Drawing
        } else {
            DrawState::Idle
        }
    }

    pub fn in_progress(&self) -> bool {
        *self.in_progress_tx.borrow()
    }

    pub fn selected_attendee(&self) -> Option<Attendee> {
        self.selected_tx.borrow().clone()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<Attendee>> {
        self.selected_tx.subscribe()
    }

    pub fn subscribe_in_progress(&self) -> watch::Receiver<bool> {
        self.in_progress_tx.subscribe()
    }

    /// Run a draw with no way to stop it early.
    pub async fn start_draw(
        &self,
        duration: Duration,
        interval: Duration,
        cue: Option<&AudioCue>,
    ) -> Result<DrawOutcome, DrawError> {
        self.start_draw_cancellable(duration, interval, cue, &CancellationToken::new())
            .await
    }

    /// Run a draw until `duration` has elapsed or `cancel` fires.
    ///
    /// Plays the cue, publishes `in_progress = true`, then selects a random
    /// attendee every `interval`. Elapsed time is checked after each wait, so
    /// a slow environment produces fewer selections rather than overrunning,
    /// and an interval longer than the duration still selects once.
    ///
    /// A second call while a draw is running fails with
    /// [`DrawError::AlreadyDrawing`]. The engine is back to idle on every
    /// exit path, including cancellation and dropping the future.
    pub async fn start_draw_cancellable(
        &self,
        duration: Duration,
        interval: Duration,
        cue: Option<&AudioCue>,
        cancel: &CancellationToken,
    ) -> Result<DrawOutcome, DrawError> {
        if self.roster.is_empty() {
            return Err(DrawError::EmptyRoster);
        }
        if duration.is_zero() || interval.is_zero() {
            return Err(DrawError::InvalidTiming { duration, interval });
        }
        if self
            .drawing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DrawError::AlreadyDrawing);
        }
        let _idle_on_exit = IdleGuard { engine: self };

        if let Some(cue) = cue {
            self.cue_player.play(cue.clone());
        }

        info!(
            "Draw started: {} attendees, duration {:?}, interval {:?}",
            self.roster.len(),
            duration,
            interval
        );
        self.publish_in_progress(true);

        let started = self.clock.now();
        let mut ticks = 0;
        let winner = loop {
            if cancel.is_cancelled() {
                info!("Draw cancelled after {} selections", ticks);
                return Err(DrawError::Cancelled);
            }

            let attendee = self.roster[self.sample_index()].clone();
            self.publish_selected(&attendee);
            ticks += 1;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Draw cancelled after {} selections", ticks);
                    return Err(DrawError::Cancelled);
                }
                _ = self.clock.sleep(interval) => {}
            }

            if self.clock.now().duration_since(started) >= duration {
                break attendee;
            }
        };

        info!("Draw finished after {} selections: {}", ticks, winner.name);
        Ok(DrawOutcome {
            winner,
            ticks,
            finished_at: Utc::now(),
        })
    }

    fn sample_index(&self) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(0..self.roster.len())
    }

    fn publish_selected(&self, attendee: &Attendee) {
        debug!("selected {}", attendee.name);
        self.selected_tx.send_replace(Some(attendee.clone()));
        for observer in &self.observers {
            observer.selected_attendee_changed(attendee);
        }
    }

    fn publish_in_progress(&self, in_progress: bool) {
        self.in_progress_tx.send_replace(in_progress);
        for observer in &self.observers {
            observer.draw_in_progress_changed(in_progress);
        }
    }
}

/// Returns the engine to idle when a draw exits, however it exits.
struct IdleGuard<'a> {
    engine: &'a DrawEngine,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        // Publish before releasing the claim so a following draw's `true`
        // can never be overwritten by this draw's `false`.
        self.engine.publish_in_progress(false);
        self.engine.drawing.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
