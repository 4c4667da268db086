//! Layerscope CLI
//!
//! Command-line interface for inspecting and replaying neural networks.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use layerscope::backend;
use layerscope::cli::commands;
use layerscope::cli::{Cli, Commands};
use layerscope::config::ViewerConfig;
use layerscope::{ViewerError, ViewerSession};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Layerscope v{}", env!("CARGO_PKG_VERSION"));

    let Some(command) = cli.command.take() else {
        println!("Layerscope v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for available commands");
        return Ok(());
    };

    let config = cli.resolve_config()?;
    let backend = backend::connect(&config, cli.mock)?;
    let mut session = ViewerSession::with_speed(backend, config.playback_speed)?;

    if let Err(e) = handle_command(command, &config, &mut session).await {
        eprintln!("Error: {}", e.friendly_message());
        for hint in e.recovery_suggestions() {
            eprintln!("  - {}", hint);
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn handle_command(
    cmd: Commands,
    config: &ViewerConfig,
    session: &mut ViewerSession,
) -> Result<(), ViewerError> {
    let pick = |model: Option<String>| model.unwrap_or_else(|| config.default_model.clone());

    match cmd {
        Commands::Models => commands::list_models(session).await,
        Commands::Show { model } => commands::show(session, &pick(model)).await,
        Commands::Layout { model, json } => commands::layout(session, &pick(model), json).await,
        Commands::Run { model, json } => commands::run(session, &pick(model), json).await,
        Commands::Play {
            model,
            speed,
            loops,
        } => {
            let speed = speed.unwrap_or(config.playback_speed);
            commands::play(session, &pick(model), speed, loops).await
        }
        Commands::Upload {
            file,
            name,
            model_type,
            input_channels,
            input_height,
            input_width,
        } => {
            let request = commands::upload_request(
                &file,
                &name,
                &model_type,
                input_channels,
                input_height,
                input_width,
            );
            commands::upload(session, &request).await
        }
        Commands::Delete { model_id } => commands::delete(session, &model_id).await,
    }
}
