mod cli;
mod commands;

use auto_apply::error::AppError;
use std::process::ExitCode;

pub fn run() -> Result<ExitCode, AppError> {
    cli::run()
}
