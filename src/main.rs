use anyhow::Error;
use clap::Parser;

use crate::cli::Cli;
use crate::program::Program;

mod cli;
mod config;
mod grab;
mod logger;
mod program;
mod reddit;

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let program = Program::new(cli);
    program.run()
}
