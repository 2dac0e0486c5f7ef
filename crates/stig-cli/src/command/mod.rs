use clap::{Parser, Subcommand};

use self::{
    evaluate::EvaluateArg, init::InitArg, inspect::InspectArg, motion::MotionArg,
    mutate::MutateArg, predict::PredictArg,
};

mod evaluate;
mod init;
mod inspect;
mod motion;
mod mutate;
mod predict;
mod show_config;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Create a randomly initialized brain
    Init(#[clap(flatten)] InitArg),
    /// Show the shape, weight statistics, and training record of a brain
    Inspect(#[clap(flatten)] InspectArg),
    /// Run a brain on a single frame
    Predict(#[clap(flatten)] PredictArg),
    /// Compare a brain's actions with a recorded human lap
    Evaluate(#[clap(flatten)] EvaluateArg),
    /// Replay a recorded lap through the motion detector
    Motion(#[clap(flatten)] MotionArg),
    /// Write a mutated copy of a brain
    Mutate(#[clap(flatten)] MutateArg),
    /// Print the configuration resolved from STIG_* environment variables
    Config,
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Init(arg) => init::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
        Mode::Predict(arg) => predict::run(&arg)?,
        Mode::Evaluate(arg) => evaluate::run(&arg)?,
        Mode::Motion(arg) => motion::run(&arg)?,
        Mode::Mutate(arg) => mutate::run(&arg)?,
        Mode::Config => show_config::run(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_cli_definition() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_init() {
        let args =
            CommandArgs::try_parse_from(["stig", "init", "--seed", "3", "--hidden-size", "8"])
                .unwrap();
        assert!(matches!(args.mode, Mode::Init(_)));
    }
}
