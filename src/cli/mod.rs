//! CLI module for smartmedia.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Smart Media - instruction-driven media processing
///
/// Upload an image, audio or video file with a plain-language instruction and
/// let an LLM agent pick the right tools (OCR, transcription, compression,
/// enhancement, summarization).
#[derive(Parser, Debug)]
#[command(name = "smartmedia")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SMARTMEDIA_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Process a local file with an instruction and print the JSON result
    Process {
        /// Path to an image, audio or video file
        file: String,

        /// What to do with it (e.g., "compress this image")
        instruction: String,
    },

    /// List the tools available to the agent
    Tools,

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from(["smartmedia", "-vv", "process", "photo.png", "compress this image"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Process { file, instruction } => {
                assert_eq!(file, "photo.png");
                assert_eq!(instruction, "compress this image");
            }
            other => panic!("Expected process command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["smartmedia", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            other => panic!("Expected serve command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
