//! Command dispatch: routes parsed CLI commands to their handlers.

pub mod config_cmd;
pub mod history;
pub mod live;
pub mod replay;
pub mod sensors;
pub mod util;
pub mod verify;
pub mod warnings;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an engine command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Replay(args) => replay::handle(&args, global),
        Command::Warnings(args) => warnings::handle(&args, global),
        Command::History(args) => history::handle(&args, global),
        Command::Verify(args) => verify::handle(&args, global),
        Command::Sensors(args) => sensors::handle(&args, global),
        Command::Live(args) => live::handle(&args, global).await,
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(_) => Ok(()),
    }
}
