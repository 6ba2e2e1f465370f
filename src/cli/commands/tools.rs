//! Tools command: list the agent's tool catalog.

use crate::cli::Output;
use crate::config::Settings;
use crate::openai::create_client;
use crate::tools::ToolCatalog;
use anyhow::Result;
use std::sync::Arc;

/// Print every registered tool with its description.
pub fn run_tools(settings: &Settings) -> Result<()> {
    let client = Arc::new(create_client()?);
    let catalog = ToolCatalog::register(settings, client)?;

    Output::header("Available Tools");
    println!();
    for spec in catalog.specs() {
        Output::tool(&spec.name, &spec.description);
    }

    Ok(())
}
