//! Completions command - print a shell completion script

use crate::cli::args::{Cli, CompletionsArgs};
use crate::error::CarryallResult;
use clap::CommandFactory;
use std::io;

/// Execute the completions command
pub fn execute(args: CompletionsArgs) -> CarryallResult<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(args.shell, &mut command, name, &mut io::stdout());
    Ok(())
}
