use clap::{Parser, Subcommand};

use self::{evaluate::EvaluateArg, inspect::InspectArg, train::TrainArg};

mod evaluate;
mod inspect;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve ships through headless corridor generations
    Train(#[clap(flatten)] TrainArg),
    /// Fly a saved champion alone and report its score
    Evaluate(#[clap(flatten)] EvaluateArg),
    /// Print a summary of a saved champion file
    Inspect(#[clap(flatten)] InspectArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Evaluate(arg) => evaluate::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
    }
    Ok(())
}
