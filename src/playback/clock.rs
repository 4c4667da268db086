//! Playback clock state machine
//!
//! Drives a step cursor over a fixed-length trace. The clock itself holds no
//! timer: it is advanced by [`PlaybackClock::tick`], which the timer actor in
//! [`super::timer`] calls every `1000 / speed` milliseconds while playing.

use crate::error::{Result, ViewerError};
use crate::model::ComputationStep;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Default playback speed (one step per second)
pub const DEFAULT_SPEED: f64 = 1.0;

/// Speeds offered by the playback controls
pub const SPEED_PRESETS: &[f64] = &[0.5, 1.0, 2.0];

/// Slowest accepted speed (one step every 1000 s)
pub const MIN_SPEED: f64 = 0.001;

/// Fastest accepted speed (one step per millisecond)
pub const MAX_SPEED: f64 = 1000.0;

/// Tick period for a speed in steps per second
///
/// Fails with [`ViewerError::InvalidSpeed`] unless the speed lies in
/// [`MIN_SPEED`, `MAX_SPEED`].
///
/// # Example
/// ```
/// use layerscope::playback::tick_period;
/// use std::time::Duration;
/// assert_eq!(tick_period(2.0).unwrap(), Duration::from_millis(500));
/// assert!(tick_period(1e-30).is_err());
/// ```
pub fn tick_period(speed: f64) -> Result<Duration> {
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(ViewerError::InvalidSpeed { speed });
    }
    Duration::try_from_secs_f64(1.0 / speed).map_err(|_| ViewerError::InvalidSpeed { speed })
}

/// Playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No trace loaded, index undefined
    #[default]
    Idle,
    /// Trace loaded, index fixed, no timer running
    Stopped,
    /// Timer running, index advancing
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
        }
    }
}

/// Notification emitted whenever the cursor moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepChange {
    pub index: usize,
    /// Layer id of the step now under the cursor
    pub layer_id: String,
}

/// Point-in-time view of the clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub index: Option<usize>,
    pub len: usize,
    pub speed: f64,
}

/// Step cursor over a computation trace
///
/// The PlaybackClock handles:
/// - State transitions (load, clear, play, pause, toggle)
/// - Wrapping advance on every tick while playing
/// - Scrubbing to an arbitrary step in any loaded state
/// - Tick period derived from speed
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: PlaybackState,

    /// Cursor position; meaningless while idle
    cursor: usize,

    /// Layer id of every step, in trace order
    layer_ids: Vec<String>,

    /// Steps per second
    speed: f64,

    period: Duration,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    /// Create an idle clock at the default speed
    ///
    /// # Example
    /// ```
    /// use layerscope::playback::PlaybackClock;
    /// let clock = PlaybackClock::new();
    /// assert!(clock.is_idle());
    /// assert_eq!(clock.index(), None);
    /// ```
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            cursor: 0,
            layer_ids: Vec::new(),
            speed: DEFAULT_SPEED,
            period: Duration::from_secs(1),
        }
    }

    /// Create an idle clock at the given speed
    pub fn with_speed(speed: f64) -> Result<Self> {
        let mut clock = Self::new();
        clock.set_speed(speed)?;
        Ok(clock)
    }

    // ========================================================================
    // Trace Lifecycle
    // ========================================================================

    /// Load a trace by its step layer ids
    ///
    /// Forces the clock to Stopped at index 0 and returns the change for
    /// step 0. An empty trace leaves the clock Idle.
    pub fn load(&mut self, layer_ids: Vec<String>) -> Option<StepChange> {
        self.layer_ids = layer_ids;
        self.cursor = 0;
        if self.layer_ids.is_empty() {
            self.state = PlaybackState::Idle;
            tracing::debug!("[PLAYBACK] Empty trace, idle");
            return None;
        }
        self.state = PlaybackState::Stopped;
        tracing::debug!(steps = self.layer_ids.len(), "[PLAYBACK] Trace loaded");
        self.current_change()
    }

    /// Load a trace of computation steps
    ///
    /// # Example
    /// ```
    /// use layerscope::model::ComputationStep;
    /// use layerscope::playback::{PlaybackClock, PlaybackState};
    /// let steps = vec![
    ///     ComputationStep::new(0, "layer_1", "conv1"),
    ///     ComputationStep::new(1, "layer_2", "relu"),
    /// ];
    /// let mut clock = PlaybackClock::new();
    /// let change = clock.load_trace(&steps).unwrap();
    /// assert_eq!(change.layer_id, "layer_1");
    /// assert_eq!(clock.state(), PlaybackState::Stopped);
    /// ```
    pub fn load_trace(&mut self, steps: &[ComputationStep]) -> Option<StepChange> {
        self.load(steps.iter().map(|s| s.layer_id.clone()).collect())
    }

    /// Drop the trace: Idle, index reset
    pub fn clear(&mut self) {
        self.layer_ids.clear();
        self.cursor = 0;
        self.state = PlaybackState::Idle;
        tracing::debug!("[PLAYBACK] Trace cleared");
    }

    // ========================================================================
    // Transport Controls
    // ========================================================================

    /// Flip Stopped <-> Playing (no-op while idle)
    pub fn toggle_play(&mut self) -> PlaybackState {
        match self.state {
            PlaybackState::Stopped => self.play(),
            PlaybackState::Playing => self.pause(),
            PlaybackState::Idle => {
                tracing::debug!("[PLAYBACK] Nothing to play");
            }
        }
        self.state
    }

    /// Start advancing from the current index
    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Stopped => {
                self.state = PlaybackState::Playing;
                tracing::debug!(index = self.cursor, "[PLAYBACK] Play");
            }
            PlaybackState::Playing => {
                tracing::debug!("[PLAYBACK] Already playing");
            }
            PlaybackState::Idle => {
                tracing::warn!("[PLAYBACK] Cannot play without a trace");
            }
        }
    }

    /// Stop advancing, keeping the index
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Stopped;
            tracing::debug!(index = self.cursor, "[PLAYBACK] Paused");
        }
    }

    /// Jump directly to a step
    ///
    /// Legal while stopped or playing; the new index is authoritative and
    /// the next tick advances from it.
    ///
    /// # Example
    /// ```
    /// use layerscope::model::ComputationStep;
    /// use layerscope::playback::PlaybackClock;
    /// let steps: Vec<_> = (0..5)
    ///     .map(|i| ComputationStep::new(i, format!("layer_{}", i), "l"))
    ///     .collect();
    /// let mut clock = PlaybackClock::new();
    /// clock.load_trace(&steps);
    /// clock.play();
    /// assert_eq!(clock.scrub(2).unwrap().layer_id, "layer_2");
    /// assert_eq!(clock.tick().unwrap().index, 3);
    /// ```
    pub fn scrub(&mut self, index: usize) -> Result<StepChange> {
        if self.state == PlaybackState::Idle {
            return Err(ViewerError::NoTraceLoaded);
        }
        if index >= self.layer_ids.len() {
            return Err(ViewerError::StepOutOfRange {
                index,
                len: self.layer_ids.len(),
            });
        }
        self.cursor = index;
        tracing::debug!(index, "[PLAYBACK] Scrub");
        self.current_change().ok_or(ViewerError::NoTraceLoaded)
    }

    /// Change speed; takes effect from the next scheduled tick
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.period = tick_period(speed)?;
        self.speed = speed;
        tracing::debug!(speed, "[PLAYBACK] Speed changed");
        Ok(())
    }

    /// Advance one step, wrapping after the last
    ///
    /// Returns `None` (and does nothing) unless playing.
    pub fn tick(&mut self) -> Option<StepChange> {
        if self.state != PlaybackState::Playing || self.layer_ids.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.layer_ids.len();
        self.current_change()
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Current index (`None` while idle)
    pub fn index(&self) -> Option<usize> {
        (!self.is_idle()).then_some(self.cursor)
    }

    /// Layer id of the current step
    pub fn current_layer(&self) -> Option<&str> {
        self.index()
            .and_then(|i| self.layer_ids.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layer_ids.is_empty()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Time between ticks: `1000 / speed` milliseconds
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            index: self.index(),
            len: self.len(),
            speed: self.speed,
        }
    }

    fn current_change(&self) -> Option<StepChange> {
        self.current_layer().map(|id| StepChange {
            index: self.cursor,
            layer_id: id.to_string(),
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
