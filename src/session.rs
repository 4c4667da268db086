//! Viewer session
//!
//! Holds one viewer's state: the loaded structure with its layout, plus the
//! current trace with its playback timer and selection. The session owns
//! the timer task, so dropping the session cancels playback. Backend
//! failures never tear the session down; they leave the previous state in
//! place and set a single user-facing error string.

use crate::activation::ActivationMap;
use crate::backend::ModelBackend;
use crate::error::{Result, ViewerError};
use crate::layout::{compute_layout, Connection, LayoutResult};
use crate::model::{
    duplicate_ids, ComputationStep, LayerNode, ModelInfo, ModelStructure, UploadRequest,
    UploadResponse,
};
use crate::playback::{PlaybackClock, PlaybackSnapshot, PlaybackTimer, StepChange};
use crate::selection::Selection;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub struct ViewerSession {
    backend: Box<dyn ModelBackend>,
    models: Vec<ModelInfo>,

    model_id: Option<String>,
    structure: Option<ModelStructure>,
    layout: LayoutResult,
    loaded_at: Option<DateTime<Utc>>,

    trace: Vec<ComputationStep>,
    input_image: Option<String>,

    timer: PlaybackTimer,
    steps: mpsc::Receiver<StepChange>,
    /// Last snapshot reported by the timer, index kept current by step changes
    playback: PlaybackSnapshot,

    selection: Selection,
    error: Option<String>,
}

impl ViewerSession {
    /// Create a session and spawn its playback timer
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(backend: Box<dyn ModelBackend>) -> Self {
        Self::with_clock(backend, PlaybackClock::new())
    }

    /// Session whose playback starts at `speed`
    pub fn with_speed(backend: Box<dyn ModelBackend>, speed: f64) -> Result<Self> {
        Ok(Self::with_clock(backend, PlaybackClock::with_speed(speed)?))
    }

    fn with_clock(backend: Box<dyn ModelBackend>, clock: PlaybackClock) -> Self {
        let playback = clock.snapshot();
        let (timer, steps) = PlaybackTimer::spawn(clock);
        Self {
            backend,
            models: Vec::new(),
            model_id: None,
            structure: None,
            layout: LayoutResult::empty(),
            loaded_at: None,
            trace: Vec::new(),
            input_image: None,
            timer,
            steps,
            playback,
            selection: Selection::new(),
            error: None,
        }
    }

    // ========================================================================
    // Backend Operations
    // ========================================================================

    /// Refresh the list of available models
    pub async fn refresh_models(&mut self) -> Result<&[ModelInfo]> {
        let result = self.backend.list_models().await;
        let list = self.surface(result)?;
        self.models = list.models;
        self.error = None;
        Ok(&self.models)
    }

    /// Load a model's structure, replacing the current one
    ///
    /// On failure the previous structure, layout and trace stay in place.
    pub async fn load_model(&mut self, model_id: &str) -> Result<()> {
        let result = self.backend.load_model(model_id).await;
        let structure = self.surface(result)?;
        let installed = self.install(model_id, structure).await;
        self.surface(installed)
    }

    /// Run inference on the loaded model and load the trace for playback
    pub async fn run_inference(&mut self) -> Result<usize> {
        let model_id = match &self.model_id {
            Some(id) => id.clone(),
            None => return self.surface(Err(ViewerError::NoModelLoaded)),
        };
        let result = self.backend.run_inference(&model_id).await;
        let inference = self.surface(result)?;

        tracing::info!(
            model = %model_id,
            steps = inference.steps.len(),
            "Inference trace captured"
        );
        self.trace = inference.steps;
        self.input_image = inference.input_image;
        let loaded = self.timer.load_trace(&self.trace).await;
        let settled = self.settle(loaded);
        self.surface(settled)?;
        self.error = None;
        Ok(self.trace.len())
    }

    /// Upload a model file and make it the loaded model
    pub async fn upload(&mut self, request: &UploadRequest) -> Result<UploadResponse> {
        let result = self.backend.upload_model(request).await;
        let response = self.surface(result)?;

        let mut info = ModelInfo::new(&response.model_id, &response.name, &request.model_type);
        info.custom = true;
        self.models.retain(|m| m.id != response.model_id);
        self.models.push(info);
        let installed = self.install(&response.model_id, response.structure.clone()).await;
        self.surface(installed)?;
        Ok(response)
    }

    /// Delete an uploaded model; unloads it if it is the current one
    pub async fn delete(&mut self, model_id: &str) -> Result<()> {
        let result = self.backend.delete_model(model_id).await;
        self.surface(result)?;

        self.models.retain(|m| m.id != model_id);
        if self.model_id.as_deref() == Some(model_id) {
            let unloaded = self.unload().await;
            self.surface(unloaded)?;
        }
        self.error = None;
        Ok(())
    }

    async fn install(&mut self, model_id: &str, structure: ModelStructure) -> Result<()> {
        let duplicates = duplicate_ids(&structure.layers);
        if !duplicates.is_empty() {
            tracing::warn!(?duplicates, "Layer ids are not unique; lookups use the first match");
        }

        self.layout = compute_layout(&structure.layers);
        tracing::info!(
            model = %model_id,
            layers = structure.layer_count(),
            branch = %self.layout.branch,
            "Model loaded"
        );

        self.model_id = Some(model_id.to_string());
        self.structure = Some(structure);
        self.loaded_at = Some(Utc::now());
        self.reset_trace().await?;
        self.error = None;
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        self.model_id = None;
        self.structure = None;
        self.layout = LayoutResult::empty();
        self.loaded_at = None;
        self.reset_trace().await
    }

    async fn reset_trace(&mut self) -> Result<()> {
        self.trace.clear();
        self.input_image = None;
        let cleared = self.timer.clear_trace().await;
        self.settle(cleared)?;
        self.selection.clear();
        Ok(())
    }

    /// Record a failure as the session's error string
    fn surface<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!(code = e.error_code(), "{}", e);
            self.error = Some(e.friendly_message());
        }
        result
    }

    // ========================================================================
    // Selection & Playback
    // ========================================================================

    /// Pointer selection of a rendered layer
    pub fn select_layer(&mut self, layer_id: &str) {
        self.selection.select(layer_id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub async fn toggle_play(&mut self) -> Result<PlaybackSnapshot> {
        let result = self.timer.toggle_play().await;
        self.settle(result)
    }

    pub async fn play(&mut self) -> Result<PlaybackSnapshot> {
        let result = self.timer.play().await;
        self.settle(result)
    }

    pub async fn pause(&mut self) -> Result<PlaybackSnapshot> {
        let result = self.timer.pause().await;
        self.settle(result)
    }

    /// Jump to a trace step and make its layer active
    ///
    /// While playing, the next tick advances from `index`.
    pub async fn scrub(&mut self, index: usize) -> Result<StepChange> {
        let result = self.timer.scrub(index).await;
        self.settle(result)?;
        let step = self.trace.get(index).ok_or(ViewerError::StepOutOfRange {
            index,
            len: self.trace.len(),
        })?;
        let change = StepChange {
            index,
            layer_id: step.layer_id.clone(),
        };
        self.selection.follow(&change);
        Ok(change)
    }

    /// Change playback speed; the pending tick keeps its deadline
    pub async fn set_speed(&mut self, speed: f64) -> Result<()> {
        let result = self.timer.set_speed(speed).await;
        self.settle(result)?;
        Ok(())
    }

    /// Wait for the timer's next step change and apply it
    ///
    /// Changes left over from a previous trace are skipped. Cancel-safe, so
    /// it can race a shutdown signal in `select!`.
    pub async fn next_step(&mut self) -> Option<StepChange> {
        loop {
            let change = self.steps.recv().await?;
            if self.apply_step(&change) {
                return Some(change);
            }
        }
    }

    /// Take the timer's answer to a control as the new playback state
    ///
    /// Step changes the timer emitted before answering are applied first,
    /// so selection ends on the latest one.
    fn settle(&mut self, result: Result<PlaybackSnapshot>) -> Result<PlaybackSnapshot> {
        let snapshot = result?;
        while let Ok(change) = self.steps.try_recv() {
            self.apply_step(&change);
        }
        self.playback = snapshot;
        Ok(snapshot)
    }

    /// Apply a step change from the timer
    ///
    /// Changes that do not match the current trace (emitted before a reload)
    /// are ignored.
    fn apply_step(&mut self, change: &StepChange) -> bool {
        let current = self
            .trace
            .get(change.index)
            .is_some_and(|s| s.layer_id == change.layer_id);
        if current {
            self.selection.follow(change);
            self.playback.index = Some(change.index);
        } else {
            tracing::debug!(index = change.index, "Dropping stale step change");
        }
        current
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    pub fn structure(&self) -> Option<&ModelStructure> {
        self.structure.as_ref()
    }

    pub fn layout(&self) -> &LayoutResult {
        &self.layout
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn trace(&self) -> &[ComputationStep] {
        &self.trace
    }

    pub fn input_image(&self) -> Option<&str> {
        self.input_image.as_deref()
    }

    pub fn activation_map(&self) -> ActivationMap<'_> {
        ActivationMap::build(&self.trace)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn playback(&self) -> PlaybackSnapshot {
        self.playback
    }

    pub fn speed(&self) -> f64 {
        self.playback.speed
    }

    /// The active layer resolved against the tree (any depth)
    pub fn active_layer(&self) -> Option<&LayerNode> {
        let id = self.selection.active()?;
        self.structure.as_ref()?.find_layer(id)
    }

    /// Most recent trace step of the active layer
    pub fn active_step(&self) -> Option<&ComputationStep> {
        let id = self.selection.active()?;
        self.trace.iter().rev().find(|s| s.layer_id == id)
    }

    pub fn is_connection_active(&self, connection: &Connection) -> bool {
        connection.is_active(self.selection.active())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Compact parameter count for detail panels: `1.2M`, `3.4K`, `512`
pub fn format_params(count: i64) -> String {
    let n = count as f64;
    if n >= 1e6 {
        format!("{:.1}M", n / 1e6)
    } else if n >= 1e3 {
        format!("{:.1}K", n / 1e3)
    } else {
        count.to_string()
    }
}
