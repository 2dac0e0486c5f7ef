use std::path::{Path, PathBuf};

use anyhow::{bail, ensure};
use stig_brain::{DEFAULT_HIDDEN_SIZE, DEFAULT_INPUT_SIZE, PolicyNetwork, network};
use stig_training::TrainingRecord;

use crate::config::Settings;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InitArg {
    /// Output file path
    #[arg(long, default_value = "brain.bin")]
    output: PathBuf,
    /// Number of input features (frame pixels after downscaling)
    #[arg(long, default_value_t = DEFAULT_INPUT_SIZE)]
    input_size: usize,
    /// Number of hidden units
    #[arg(long, default_value_t = DEFAULT_HIDDEN_SIZE)]
    hidden_size: usize,
    /// RNG seed, overriding STIG_SEED
    #[arg(long)]
    seed: Option<u64>,
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

pub(crate) fn run(arg: &InitArg) -> anyhow::Result<()> {
    let InitArg {
        output,
        input_size,
        hidden_size,
        seed,
        force,
    } = arg;

    check_shape(*input_size, *hidden_size)?;
    if output.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            output.display()
        );
    }

    let mut rng = Settings::from_env().rng(*seed);
    let brain = PolicyNetwork::random(*input_size, *hidden_size, &mut rng);
    brain.save(output)?;
    discard_record(output)?;

    eprintln!("Brain initialized");
    eprintln!("  Path: {}", output.display());
    eprintln!("  Shape: {input_size} inputs, {hidden_size} hidden");
    eprintln!("  Parameters: {}", brain.parameters().count());
    Ok(())
}

/// Removes the training record of a brain file that was just replaced.
pub(crate) fn discard_record(brain_path: &Path) -> anyhow::Result<()> {
    let record_path = TrainingRecord::path_for(brain_path);
    if TrainingRecord::discard(&record_path)? {
        tracing::info!(path = %record_path.display(), "removed stale training record");
    }
    Ok(())
}

pub(crate) fn check_shape(input_size: usize, hidden_size: usize) -> anyhow::Result<()> {
    ensure!(
        input_size > 0 && hidden_size > 0,
        "network sizes must be non-zero"
    );
    ensure!(
        u32::try_from(input_size).is_ok()
            && u32::try_from(hidden_size).is_ok()
            && network::parameter_count(input_size, hidden_size).is_some(),
        "network shape {input_size}x{hidden_size} is too large"
    );
    Ok(())
}
