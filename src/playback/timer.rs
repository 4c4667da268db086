//! Playback timer actor
//!
//! A tokio task owns the [`PlaybackClock`] and the tick deadline. Controls
//! arrive as commands over an mpsc channel and are answered with a snapshot;
//! cursor moves go out on a bounded event channel. Aborting the task
//! (explicitly or by dropping the [`PlaybackTimer`]) cancels the pending
//! deadline, so no tick can fire after teardown.

use super::clock::{PlaybackClock, PlaybackSnapshot, StepChange};
use crate::error::{Result, ViewerError};
use crate::model::ComputationStep;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

const COMMAND_BUFFER: usize = 32;

/// Step changes held for a consumer that is not keeping up
///
/// Once full, further changes are dropped until the consumer drains the
/// channel. Snapshots returned by the controls always carry the real index.
pub const EVENT_BUFFER: usize = 64;

#[derive(Debug)]
enum Control {
    Load(Vec<String>),
    Clear,
    TogglePlay,
    Play,
    Pause,
    Scrub(usize),
    SetSpeed(f64),
    Snapshot,
}

#[derive(Debug)]
struct Command {
    control: Control,
    reply: oneshot::Sender<Result<PlaybackSnapshot>>,
}

/// Handle to a running playback task
#[derive(Debug)]
pub struct PlaybackTimer {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl PlaybackTimer {
    /// Spawn the playback task on the current runtime
    ///
    /// Returns the handle and the receiver of [`StepChange`] events. The
    /// receiver yields `None` once the task has been stopped. Must be called
    /// from within a tokio runtime.
    pub fn spawn(clock: PlaybackClock) -> (Self, mpsc::Receiver<StepChange>) {
        let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
        let (events, changes) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(run(clock, inbox, events));
        (Self { commands, task }, changes)
    }

    pub async fn load_trace(&self, steps: &[ComputationStep]) -> Result<PlaybackSnapshot> {
        let ids = steps.iter().map(|s| s.layer_id.clone()).collect();
        self.send(Control::Load(ids)).await
    }

    pub async fn clear_trace(&self) -> Result<PlaybackSnapshot> {
        self.send(Control::Clear).await
    }

    pub async fn toggle_play(&self) -> Result<PlaybackSnapshot> {
        self.send(Control::TogglePlay).await
    }

    pub async fn play(&self) -> Result<PlaybackSnapshot> {
        self.send(Control::Play).await
    }

    pub async fn pause(&self) -> Result<PlaybackSnapshot> {
        self.send(Control::Pause).await
    }

    pub async fn scrub(&self, index: usize) -> Result<PlaybackSnapshot> {
        self.send(Control::Scrub(index)).await
    }

    pub async fn set_speed(&self, speed: f64) -> Result<PlaybackSnapshot> {
        self.send(Control::SetSpeed(speed)).await
    }

    pub async fn snapshot(&self) -> Result<PlaybackSnapshot> {
        self.send(Control::Snapshot).await
    }

    /// Stop the task; any pending tick is discarded
    pub fn stop(self) {
        // Drop aborts the task.
    }

    async fn send(&self, control: Control) -> Result<PlaybackSnapshot> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command { control, reply })
            .await
            .map_err(|_| ViewerError::PlaybackClosed)?;
        answer.await.map_err(|_| ViewerError::PlaybackClosed)?
    }
}

impl Drop for PlaybackTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut clock: PlaybackClock,
    mut inbox: mpsc::Receiver<Command>,
    events: mpsc::Sender<StepChange>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            command = inbox.recv() => {
                let Some(Command { control, reply }) = command else {
                    break;
                };
                let outcome = apply(&mut clock, control, &events);

                // Starting arms the timer; stopping disarms it. A running
                // deadline is left alone so speed changes apply from the
                // tick after next and scrubs do not delay the next tick.
                if clock.is_playing() {
                    deadline.get_or_insert_with(|| Instant::now() + clock.period());
                } else {
                    deadline = None;
                }

                let _ = reply.send(outcome.map(|_| clock.snapshot()));
            }

            _ = wait(deadline) => {
                let fired = deadline.unwrap_or_else(Instant::now);
                if let Some(change) = clock.tick() {
                    publish(&events, change);
                }
                deadline = clock.is_playing().then(|| fired + clock.period());
            }
        }
    }

    tracing::debug!("[PLAYBACK] Timer task finished");
}

fn apply(
    clock: &mut PlaybackClock,
    control: Control,
    events: &mpsc::Sender<StepChange>,
) -> Result<()> {
    let change = match control {
        Control::Load(ids) => clock.load(ids),
        Control::Clear => {
            clock.clear();
            None
        }
        Control::TogglePlay => {
            clock.toggle_play();
            None
        }
        Control::Play => {
            clock.play();
            None
        }
        Control::Pause => {
            clock.pause();
            None
        }
        Control::Scrub(index) => Some(clock.scrub(index)?),
        Control::SetSpeed(speed) => {
            clock.set_speed(speed)?;
            None
        }
        Control::Snapshot => None,
    };

    if let Some(change) = change {
        publish(events, change);
    }
    Ok(())
}

fn publish(events: &mpsc::Sender<StepChange>, change: StepChange) {
    match events.try_send(change) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(change)) => {
            tracing::debug!(index = change.index, "[PLAYBACK] Event buffer full, dropping step change");
        }
    }
}

async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
