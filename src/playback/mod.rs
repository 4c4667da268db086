//! Step playback over a computation trace
//!
//! [`PlaybackClock`] is the pure state machine (Idle / Stopped / Playing);
//! [`PlaybackTimer`] runs it on a tokio task and emits [`StepChange`]
//! events as the cursor moves.

mod clock;
mod timer;

pub use clock::{
    tick_period, PlaybackClock, PlaybackSnapshot, PlaybackState, StepChange, DEFAULT_SPEED,
    MAX_SPEED, MIN_SPEED, SPEED_PRESETS,
};
pub use timer::{PlaybackTimer, EVENT_BUFFER};
