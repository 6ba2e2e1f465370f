//! CLI command implementations.

mod config;
mod doctor;
mod process;
mod serve;
mod tools;

pub use config::run_config;
pub use doctor::run_doctor;
pub use process::run_process;
pub use serve::{router, run_serve};
pub use tools::run_tools;
