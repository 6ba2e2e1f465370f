//! Process command: run one local file through the agent.

use crate::agent::OutcomeStatus;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::handler::RequestHandler;
use anyhow::Result;

/// Process a local file and print the JSON response to stdout.
pub async fn run_process(file: &str, instruction: &str, settings: Settings) -> Result<()> {
    preflight::check(Operation::Process)?;
    for program in preflight::missing_programs(&settings) {
        Output::warning(&format!("{} not found; tools that need it will fail", program));
    }

    let path = Settings::expand_path(file);
    if !path.is_file() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let handler = RequestHandler::from_settings(&settings)?;

    let spinner = Output::spinner(&format!("Processing {}...", path.display()));
    let result = handler.handle_path(&path, instruction).await;
    spinner.finish_and_clear();

    let response = result?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.status == OutcomeStatus::Error {
        Output::error(&response.message);
    }

    Ok(())
}
