//! Selection/Interaction State
//!
//! Holds the single active layer id. Pointer clicks and playback steps both
//! write it; whichever arrives last wins. A click during playback is shown
//! until the next tick replaces it.

use crate::playback::StepChange;
use serde::Serialize;

/// What last set the active layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Pointer,
    Playback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    active: Option<String>,
    source: Option<SelectionSource>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct pointer selection on a rendered layer
    pub fn select(&mut self, layer_id: impl Into<String>) {
        let id = layer_id.into();
        tracing::debug!(layer = %id, "pointer selection");
        self.active = Some(id);
        self.source = Some(SelectionSource::Pointer);
    }

    /// Follow a playback step
    pub fn follow(&mut self, change: &StepChange) {
        self.active = Some(change.layer_id.clone());
        self.source = Some(SelectionSource::Playback);
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.source = None;
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn source(&self) -> Option<SelectionSource> {
        self.source
    }

    pub fn is_active(&self, layer_id: &str) -> bool {
        self.active.as_deref() == Some(layer_id)
    }
}
