//! CLI Command Implementations
//!
//! Each command drives a [`ViewerSession`] and prints a text rendering of
//! the result. The `render_*` functions are pure so they can be tested
//! without a terminal.

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::activation::ActivationMap;
use crate::error::Result;
use crate::layout::{LayerStyle, LayoutResult};
use crate::model::{outline, ComputationStep, ModelInfo, ModelStructure, UploadRequest};
use crate::playback::StepChange;
use crate::session::{format_params, ViewerSession};

/// List the backend's models.
pub async fn list_models(session: &mut ViewerSession) -> Result<()> {
    let models = session.refresh_models().await?;
    print!("{}", render_models(models));
    Ok(())
}

/// Load a model and print its layer tree.
pub async fn show(session: &mut ViewerSession, model: &str) -> Result<()> {
    session.load_model(model).await?;
    if let Some(structure) = session.structure() {
        print!("{}", render_outline(structure));
    }
    Ok(())
}

/// Load a model and print its computed layout.
pub async fn layout(session: &mut ViewerSession, model: &str, json: bool) -> Result<()> {
    session.load_model(model).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(session.layout())?);
    } else {
        print!("{}", render_layout(session.layout()));
    }
    Ok(())
}

/// Run inference and print the trace.
pub async fn run(session: &mut ViewerSession, model: &str, json: bool) -> Result<()> {
    session.load_model(model).await?;
    session.run_inference().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(session.trace())?);
    } else {
        print!("{}", render_trace(session.trace()));
    }
    Ok(())
}

/// Run inference and replay the trace with the session's playback timer.
///
/// Prints the detail panel on every step change and stops after `loops`
/// full passes or on Ctrl-C.
pub async fn play(session: &mut ViewerSession, model: &str, speed: f64, loops: u32) -> Result<()> {
    session.load_model(model).await?;
    session.set_speed(speed).await?;
    let steps = session.run_inference().await?;
    let Some(first) = session.trace().first() else {
        println!("Trace is empty; nothing to play.");
        return Ok(());
    };

    // Step 0 is active as soon as the trace loads
    let first = StepChange {
        index: 0,
        layer_id: first.layer_id.clone(),
    };
    print!("{}", render_step_detail(session, &first));

    session.play().await?;
    info!(steps, speed, loops, "Playback started");

    let total = steps * loops as usize;
    let mut shown = 1;
    while shown < total {
        let change = tokio::select! {
            change = session.next_step() => change,
            _ = tokio::signal::ctrl_c() => {
                info!("Playback interrupted");
                None
            }
        };
        let Some(change) = change else {
            break;
        };
        print!("{}", render_step_detail(session, &change));
        shown += 1;
    }

    session.pause().await?;
    Ok(())
}

/// Upload a model file.
pub async fn upload(session: &mut ViewerSession, request: &UploadRequest) -> Result<()> {
    info!("Uploading model: {}", request.file.display());
    let response = session.upload(request).await?;
    println!("Uploaded '{}' as {}", response.name, response.model_id);
    print!("{}", render_outline(&response.structure));
    Ok(())
}

/// Delete an uploaded model.
pub async fn delete(session: &mut ViewerSession, model_id: &str) -> Result<()> {
    session.delete(model_id).await?;
    println!("Deleted model: {}", model_id);
    Ok(())
}

/// Build an upload request from CLI arguments.
pub fn upload_request(
    file: &Path,
    name: &str,
    model_type: &str,
    channels: u32,
    height: u32,
    width: u32,
) -> UploadRequest {
    let mut request = UploadRequest::new(file, name);
    request.model_type = model_type.to_string();
    request.input_channels = channels;
    request.input_height = height;
    request.input_width = width;
    request
}

// ============================================================================
// Rendering
// ============================================================================

pub fn render_models(models: &[ModelInfo]) -> String {
    let mut out = String::new();
    if models.is_empty() {
        out.push_str("No models available.\n");
        return out;
    }
    let _ = writeln!(out, "{:<24} {:<28} {:<12}", "ID", "NAME", "TYPE");
    let _ = writeln!(out, "{:-<66}", "");
    for model in models {
        let marker = if model.custom { " (custom)" } else { "" };
        let _ = writeln!(out, "{:<24} {:<28} {:<12}{}", model.id, model.name, model.kind, marker);
    }
    out
}

/// Indented pre-order outline of the layer tree
pub fn render_outline(structure: &ModelStructure) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  ({} layers, {} params)",
        structure.name,
        structure.layer_count(),
        format_params(structure.total_params)
    );
    for (depth, layer) in outline(&structure.layers) {
        let params = layer
            .param_count()
            .map(|n| format!("  [{}]", format_params(n)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}{} {} ({}){}",
            "  ".repeat(depth + 1),
            layer.id,
            layer.name,
            layer.kind,
            params
        );
    }
    out
}

pub fn render_layout(layout: &LayoutResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Branch: {}", layout.branch);
    if layout.is_empty() {
        out.push_str("No layers to lay out.\n");
    } else {
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>8} {:>8} {:>22}",
            "LAYER", "X", "Y", "Z", "SIZE"
        );
        for (id, p) in &layout.positions {
            let size = layout
                .size(id)
                .map(|s| format!("{:.2} x {:.2} x {:.2}", s[0], s[1], s[2]))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{:<12} {:>8.2} {:>8.2} {:>8.2} {:>22}",
                id, p[0], p[1], p[2], size
            );
        }
    }
    for group in &layout.groups {
        let _ = writeln!(
            out,
            "Group '{}' at ({:.2}, {:.2}, {:.2}) extent {:.2} x {:.2} x {:.2}",
            group.label,
            group.position[0],
            group.position[1],
            group.position[2],
            group.extent[0],
            group.extent[1],
            group.extent[2]
        );
    }
    let _ = writeln!(out, "Connections: {}", layout.connections.len());
    let _ = writeln!(
        out,
        "Camera: position ({:.1}, {:.1}, {:.1}) target ({:.1}, {:.1}, {:.1})",
        layout.camera.position[0],
        layout.camera.position[1],
        layout.camera.position[2],
        layout.camera.target[0],
        layout.camera.target[1],
        layout.camera.target[2]
    );
    out
}

pub fn render_trace(trace: &[ComputationStep]) -> String {
    let mut out = String::new();
    if trace.is_empty() {
        out.push_str("Empty trace.\n");
        return out;
    }
    let _ = writeln!(
        out,
        "{:>4}  {:<10} {:<22} {:<18} {:>9} {:>9}",
        "STEP", "LAYER", "NAME", "OUTPUT", "MEAN", "STD"
    );
    for step in trace {
        let (mean, std) = step
            .activation_stats
            .map(|s| (format!("{:.4}", s.mean), format!("{:.4}", s.std)))
            .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
        let _ = writeln!(
            out,
            "{:>4}  {:<10} {:<22} {:<18} {:>9} {:>9}",
            step.step_index,
            step.layer_id,
            step.layer_name,
            format!("{:?}", step.output_shape),
            mean,
            std
        );
    }
    out
}

/// Detail panel for the layer under the playback cursor
pub fn render_step_detail(session: &ViewerSession, change: &StepChange) -> String {
    let mut out = String::new();
    let total = session.trace().len();
    let _ = writeln!(out, "Step {}/{}", change.index + 1, total);

    match session.active_layer() {
        Some(layer) => {
            let style = LayerStyle::for_kind(&layer.kind);
            let _ = writeln!(out, "  Layer: {} ({}) {}", layer.name, layer.kind, style.color);
            if let Some(n) = layer.param_count() {
                let _ = writeln!(out, "  Params: {}", format_params(n));
            }
        }
        None => {
            let _ = writeln!(out, "  Layer: {} (not in tree)", change.layer_id);
        }
    }

    let activations = ActivationMap::build(session.trace());
    if let Some(step) = session.trace().get(change.index) {
        let _ = writeln!(
            out,
            "  Shape: {:?} -> {:?}",
            step.input_shape, step.output_shape
        );
        if let Some(stats) = step.activation_stats {
            let _ = writeln!(
                out,
                "  Activation: mean {:.4}  std {:.4}  min {:.4}  max {:.4}  intensity {:.2}",
                stats.mean,
                stats.std,
                stats.min,
                stats.max,
                activations.intensity(&step.layer_id)
            );
        }
    }

    let incoming: Vec<&str> = session
        .layout()
        .connections
        .iter()
        .filter(|c| session.is_connection_active(c))
        .map(|c| c.from_id.as_str())
        .collect();
    if !incoming.is_empty() {
        let _ = writeln!(out, "  Input from: {}", incoming.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::layout::compute_layout;
    use crate::model::LayerNode;

    fn session() -> ViewerSession {
        ViewerSession::new(Box::new(MockBackend::new()))
    }

    #[test]
    fn test_render_models_marks_custom() {
        let mut custom = ModelInfo::new("custom_1a2b3c4d", "Mine", "CNN");
        custom.custom = true;
        let text = render_models(&[ModelInfo::new("tiny_resnet", "Tiny ResNet", "CNN"), custom]);
        assert!(text.contains("tiny_resnet"));
        assert!(text.lines().any(|l| l.starts_with("custom_1a2b3c4d") && l.ends_with("(custom)")));
        assert_eq!(render_models(&[]), "No models available.\n");
    }

    #[test]
    fn test_render_outline_indents_children() {
        let structure = ModelStructure::new(
            "net",
            vec![LayerNode::new("a", "block", "Sequential")
                .with_children(vec![LayerNode::new("b", "block.0", "Linear").with_total_params(1_500)])],
        );
        let text = render_outline(&structure);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "  a block (Sequential)");
        assert_eq!(lines[2], "    b block.0 (Linear)  [1.5K]");
    }

    #[test]
    fn test_render_layout_empty() {
        let text = render_layout(&compute_layout(&[]));
        assert!(text.contains("No layers to lay out."));
        assert!(text.contains("Camera: position (0.0, 3.0, 30.0)"));
    }

    #[test]
    fn test_render_trace_empty() {
        assert_eq!(render_trace(&[]), "Empty trace.\n");
    }

    #[tokio::test]
    async fn test_step_detail_shows_active_layer() {
        let mut session = session();
        session.load_model("tiny_resnet").await.unwrap();
        session.run_inference().await.unwrap();
        let change = session.scrub(4).await.unwrap();

        let text = render_step_detail(&session, &change);
        assert!(text.starts_with("Step 5/17"));
        assert!(text.contains("Layer: conv2 (Conv2d)"));
        assert!(text.contains("Params: 4.6K"));
        assert!(text.contains("Input from: layer_4"));
    }

    #[test]
    fn test_upload_request_from_args() {
        let request = upload_request(Path::new("m.pt"), "M", "transformer", 1, 28, 28);
        assert_eq!(request.model_type, "transformer");
        assert_eq!(request.input_width, 28);
        assert!(request.validate().is_ok());
    }
}
