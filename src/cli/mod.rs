//! CLI module for moduledir
//!
//! Operates on the layout persisted under `data_dir`:
//! - init: create a fresh layout
//! - status/get/history: reads
//! - set/schedule/execute/cancel/register-key/pause/unpause: one mutation
//!   per invocation, saved only if it commits
//! - sign-permit/submit-permit: offline authorization, JSON on stdin

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    init, run, run_command, sign_permit, AnyPermit, Session, SignRequest, SubmitRequest,
};
pub use config::CliConfig;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
