//! Smart Media - instruction-driven media processing
//!
//! Accepts one media file (image, audio or video) plus a natural-language
//! instruction and lets an LLM agent decide which media tools to run.
//!
//! # Overview
//!
//! The agent can:
//! - Extract text from images (OCR)
//! - Transcribe speech from audio and video
//! - Compress videos and images
//! - Enhance image contrast and sharpness
//! - Summarize text produced by the other tools
//!
//! # Architecture
//!
//! - `config` - Configuration management and prompts
//! - `media` - File type detection, output naming, ffmpeg plumbing
//! - `tools` - The media tools and the catalog the agent chooses from
//! - `agent` - The model/tool dispatch loop
//! - `handler` - Per-request staging and response shaping
//! - `cli` - Command line interface and HTTP server
//!
//! # Example
//!
//! ```rust,no_run
//! use smartmedia::config::Settings;
//! use smartmedia::handler::RequestHandler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let handler = RequestHandler::from_settings(&settings)?;
//!
//!     let response = handler
//!         .handle_path("photo.png".as_ref(), "compress this image")
//!         .await?;
//!     println!("{:?}: {}", response.status, response.result);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod media;
pub mod openai;
pub mod tools;

pub use error::{MediaError, Result};
