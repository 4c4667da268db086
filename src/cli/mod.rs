//! CLI Module
//!
//! Command-line front end for inspecting models and replaying inference
//! step by step in the terminal.

pub mod commands;

use crate::config::ViewerConfig;
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Layerscope - neural network structure and activation viewer
#[derive(Parser, Debug)]
#[command(name = "layerscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Model backend base URL
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the built-in in-memory backend
    #[arg(long, global = true)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Resolve configuration: defaults, file, environment, then flags
    pub fn resolve_config(&self) -> Result<ViewerConfig> {
        let mut config = ViewerConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List models available on the backend
    #[command(name = "models")]
    Models,

    /// Print a model's layer tree
    #[command(name = "show")]
    Show {
        /// Model id (defaults to the configured model)
        model: Option<String>,
    },

    /// Print the computed diagram layout
    #[command(name = "layout")]
    Layout {
        model: Option<String>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run inference and print the computation trace
    #[command(name = "run")]
    Run {
        model: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Run inference and replay the trace step by step
    #[command(name = "play")]
    Play {
        model: Option<String>,

        /// Steps per second (0.5, 1, 2, ...)
        #[arg(short, long)]
        speed: Option<f64>,

        /// Full passes over the trace before stopping
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        loops: u32,
    },

    /// Upload a saved PyTorch model (.pt / .pth)
    #[command(name = "upload")]
    Upload {
        file: PathBuf,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// "cnn" or "transformer"
        #[arg(short = 't', long, default_value = "cnn")]
        model_type: String,

        #[arg(short = 'c', long, default_value_t = 3)]
        input_channels: u32,

        #[arg(short = 'H', long, default_value_t = 32)]
        input_height: u32,

        #[arg(short = 'W', long, default_value_t = 32)]
        input_width: u32,
    },

    /// Delete an uploaded model
    #[command(name = "delete")]
    Delete {
        model_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play() {
        let cli = Cli::parse_from(["layerscope", "--mock", "play", "mini_transformer", "-s", "2", "-l", "3"]);
        assert!(cli.mock);
        match cli.command {
            Some(Commands::Play { model, speed, loops }) => {
                assert_eq!(model.as_deref(), Some("mini_transformer"));
                assert_eq!(speed, Some(2.0));
                assert_eq!(loops, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_zero_loops_rejected() {
        assert!(Cli::try_parse_from(["layerscope", "play", "--loops", "0"]).is_err());
    }

    #[test]
    fn test_parse_upload_defaults() {
        let cli = Cli::parse_from(["layerscope", "upload", "net.pt", "--name", "Net", "-H", "28", "-W", "28", "-c", "1"]);
        match cli.command {
            Some(Commands::Upload {
                model_type,
                input_channels,
                input_height,
                ..
            }) => {
                assert_eq!(model_type, "cnn");
                assert_eq!(input_channels, 1);
                assert_eq!(input_height, 28);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_command_taken_before_config_resolves() {
        let mut cli = Cli::parse_from(["layerscope", "--mock", "--backend-url", "http://gpu:8000", "show"]);
        let command = cli.command.take();
        assert!(matches!(command, Some(Commands::Show { model: None })));
        assert!(cli.command.is_none());

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.backend_url, "http://gpu:8000");
        assert!(cli.mock);
    }

    #[test]
    fn test_flag_overrides_backend_url() {
        let cli = Cli::parse_from(["layerscope", "--backend-url", "http://gpu:8000", "models"]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.backend_url, "http://gpu:8000");
    }
}
