//! Session Integration Tests
//!
//! End-to-end flows against the in-memory backend: load, layout, inference,
//! timer-driven playback and error surfacing.

use layerscope::backend::{MockBackend, ModelBackend};
use layerscope::layout::LayoutBranch;
use layerscope::model::{LayerNode, ModelStructure, UploadRequest};
use layerscope::playback::PlaybackState;
use layerscope::selection::SelectionSource;
use layerscope::{ViewerError, ViewerSession};
use std::time::Duration;

fn mock_session() -> ViewerSession {
    ViewerSession::new(Box::new(MockBackend::new()))
}

// === Load & Layout ===

#[tokio::test]
async fn test_models_then_load_each() {
    let mut session = mock_session();
    let ids: Vec<String> = session
        .refresh_models()
        .await
        .unwrap()
        .iter()
        .map(|m| m.id.clone())
        .collect();

    session.load_model(&ids[0]).await.unwrap();
    assert_eq!(session.layout().branch, LayoutBranch::Linear);

    session.load_model(&ids[1]).await.unwrap();
    assert_eq!(session.layout().branch, LayoutBranch::Grouped);
    assert_eq!(session.layout().groups.len(), 1);
    assert_eq!(session.layout().camera.position, [0.0, 0.0, 18.0]);
}

#[tokio::test]
async fn test_activation_map_built_from_trace() {
    let mut session = mock_session();
    session.load_model("tiny_resnet").await.unwrap();
    assert!(session.activation_map().is_empty());

    session.run_inference().await.unwrap();
    let map = session.activation_map();
    assert_eq!(map.len(), 17);
    let intensity = map.intensity("layer_1");
    assert!((0.0..=1.0).contains(&intensity));
    assert_eq!(map.intensity("not_a_layer"), 0.0);
}

// === Playback ===

/// True if no step change arrives within `wait`
async fn quiet_for(session: &mut ViewerSession, wait: Duration) -> bool {
    tokio::time::timeout(wait, session.next_step()).await.is_err()
}

#[tokio::test(start_paused = true)]
async fn test_timer_drives_selection_and_wraps() {
    let mut session = mock_session();
    session.load_model("mini_transformer").await.unwrap();
    session.set_speed(2.0).await.unwrap();
    let steps = session.run_inference().await.unwrap();
    assert_eq!(session.selection().active(), Some("layer_1"));

    session.play().await.unwrap();
    let mut seen = Vec::new();
    for _ in 0..steps {
        seen.push(session.next_step().await.unwrap().index);
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5, 0]);
    assert_eq!(session.selection().active(), Some("layer_1"));
    assert_eq!(session.selection().source(), Some(SelectionSource::Playback));
    assert_eq!(session.playback().state, PlaybackState::Playing);
    assert_eq!(session.playback().index, Some(0));

    assert_eq!(session.pause().await.unwrap().state, PlaybackState::Stopped);
    assert!(quiet_for(&mut session, Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn test_scrub_while_playing_continues_from_target() {
    let mut session = mock_session();
    session.load_model("tiny_resnet").await.unwrap();
    session.run_inference().await.unwrap();
    session.play().await.unwrap();

    for _ in 0..5 {
        session.next_step().await.unwrap();
    }
    assert_eq!(session.playback().state, PlaybackState::Playing);
    assert_eq!(session.playback().index, Some(5));

    let change = session.scrub(2).await.unwrap();
    assert_eq!(change.layer_id, "layer_3");
    assert_eq!(session.selection().active(), Some("layer_3"));
    assert_eq!(session.playback().index, Some(2));

    let next = session.next_step().await.unwrap();
    assert_eq!(next.index, 3);
    assert_eq!(session.active_layer().unwrap().name, "pool1");
}

#[tokio::test(start_paused = true)]
async fn test_pointer_selection_overridden_by_next_tick() {
    let mut session = mock_session();
    session.load_model("tiny_resnet").await.unwrap();
    session.run_inference().await.unwrap();
    session.play().await.unwrap();

    session.select_layer("layer_12");
    assert_eq!(session.active_layer().unwrap().name, "bn4");

    session.next_step().await.unwrap();
    assert_eq!(session.selection().active(), Some("layer_2"));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_from_previous_trace_are_dropped() {
    let mut session = mock_session();
    session.load_model("tiny_resnet").await.unwrap();
    session.run_inference().await.unwrap();
    session.play().await.unwrap();

    // Ticks pile up undrained, then the model is switched
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    session.load_model("mini_transformer").await.unwrap();
    assert_eq!(session.selection().active(), None);
    assert_eq!(session.playback().state, PlaybackState::Idle);

    session.run_inference().await.unwrap();
    assert_eq!(session.playback().state, PlaybackState::Stopped);
    assert_eq!(session.selection().active(), Some("layer_1"));

    session.play().await.unwrap();
    let change = session.next_step().await.unwrap();
    assert_eq!(change.index, 1);
    assert_eq!(change.layer_id, "layer_2");
}

#[tokio::test(start_paused = true)]
async fn test_session_playback_controls() {
    let mut session = mock_session();
    session.load_model("tiny_resnet").await.unwrap();
    session.run_inference().await.unwrap();

    assert_eq!(session.toggle_play().await.unwrap().state, PlaybackState::Playing);
    session.scrub(16).await.unwrap();
    let change = session.next_step().await.unwrap();
    assert_eq!(change.index, 0);
    assert_eq!(session.active_layer().unwrap().name, "conv1");

    assert!(matches!(
        session.scrub(17).await,
        Err(ViewerError::StepOutOfRange { index: 17, len: 17 })
    ));
    assert!(session.set_speed(-1.0).await.is_err());
    assert!(session.set_speed(1e-30).await.is_err());
    assert_eq!(session.speed(), 1.0);
    assert_eq!(session.playback().state, PlaybackState::Playing);

    assert_eq!(session.toggle_play().await.unwrap().state, PlaybackState::Stopped);
    assert!(quiet_for(&mut session, Duration::from_secs(5)).await);
}

// === Upload & Delete ===

#[tokio::test]
async fn test_upload_installs_structure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.pt");
    std::fs::write(&path, b"\x80\x02fake").unwrap();

    let mut session = mock_session();
    session.refresh_models().await.unwrap();
    let response = session
        .upload(&UploadRequest::new(&path, "Classifier"))
        .await
        .unwrap();

    assert_eq!(session.model_id(), Some(response.model_id.as_str()));
    assert_eq!(session.layout().positions.len(), 4);
    assert_eq!(session.models().len(), 3);
    assert!(session.models().iter().any(|m| m.custom));

    session.run_inference().await.unwrap();
    session.delete(&response.model_id).await.unwrap();
    assert!(session.structure().is_none());
    assert!(session.trace().is_empty());
    assert!(session.layout().is_empty());
    assert_eq!(session.models().len(), 2);
}

#[tokio::test]
async fn test_rejected_upload_surfaces_error() {
    let mut session = mock_session();
    session.load_model("tiny_resnet").await.unwrap();
    let err = session
        .upload(&UploadRequest::new("weights.safetensors", "W"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UPLOAD_REJECTED");
    assert!(session.error().is_some());
    assert_eq!(session.model_id(), Some("tiny_resnet"));
}

// === Error Surface ===

#[tokio::test]
async fn test_backend_outage_keeps_state() {
    let backend = MockBackend::new();
    backend
        .insert(
            "tiny_mlp",
            "MLP",
            ModelStructure::new("tiny_mlp", vec![LayerNode::new("a", "a", "Linear")]),
        )
        .await;
    let mut session = ViewerSession::new(Box::new(backend));
    session.load_model("tiny_mlp").await.unwrap();
    session.run_inference().await.unwrap();
    assert!(session.error().is_none());

    assert!(session.load_model("missing").await.is_err());
    let message = session.error().unwrap().to_string();
    assert!(!message.contains('\n'));
    assert_eq!(session.model_id(), Some("tiny_mlp"));
    assert_eq!(session.trace().len(), 1);

    // Next success clears the error
    session.run_inference().await.unwrap();
    assert!(session.error().is_none());
}

#[tokio::test]
async fn test_backend_trait_object() {
    let backend: Box<dyn ModelBackend> = Box::new(MockBackend::new());
    assert_eq!(backend.name(), "mock");
    let result = backend.run_inference("tiny_resnet").await.unwrap();
    assert_eq!(result.model_name, "tiny_resnet");
    assert_eq!(result.input_shape, vec![1, 3, 32, 32]);
}
