use std::path::PathBuf;

use anyhow::bail;
use stig_brain::PolicyNetwork;
use stig_training::Trainer;

use crate::config::Settings;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct MutateArg {
    /// Output file path
    output: PathBuf,
    /// Brain to mutate
    #[arg(long, default_value = "brain.bin")]
    brain: PathBuf,
    /// Noise standard deviation, overriding STIG_MUTATION_SCALE
    #[arg(long)]
    scale: Option<f32>,
    /// RNG seed, overriding STIG_SEED
    #[arg(long)]
    seed: Option<u64>,
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

pub(crate) fn run(arg: &MutateArg) -> anyhow::Result<()> {
    let MutateArg {
        output,
        brain,
        scale,
        seed,
        force,
    } = arg;
    if output.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            output.display()
        );
    }

    let settings = Settings::from_env();
    let mut config = settings.trainer_config(output.clone());
    if let Some(scale) = scale {
        config.mutation_scale = *scale;
    }
    let parent = PolicyNetwork::load(brain)?;
    let mut trainer = Trainer::new(parent, config, settings.rng(*seed));
    let candidate = trainer.propose()?;
    candidate.save(output)?;
    super::init::discard_record(output)?;

    eprintln!("Mutated brain saved");
    eprintln!("  From: {}", brain.display());
    eprintln!("  Path: {}", output.display());
    eprintln!("  Scale: {}", trainer.config().mutation_scale);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_mutate_writes_perturbed_copy() {
        let dir = tempfile::tempdir().unwrap();
        let brain = dir.path().join("brain.bin");
        let parent = PolicyNetwork::random(8, 2, &mut Pcg64Mcg::seed_from_u64(0));
        parent.save(&brain).unwrap();

        let output = dir.path().join("child.bin");
        let arg = MutateArg {
            output: output.clone(),
            brain: brain.clone(),
            scale: Some(0.5),
            seed: Some(1),
            force: false,
        };
        run(&arg).unwrap();
        let child = PolicyNetwork::load(&output).unwrap();
        assert_ne!(child, parent);
        assert_eq!(child.input_size(), 8);

        assert!(run(&arg).is_err());
    }

    #[test]
    fn test_mutate_in_place_removes_old_record() {
        let dir = tempfile::tempdir().unwrap();
        let brain = dir.path().join("brain.bin");
        PolicyNetwork::random(8, 2, &mut Pcg64Mcg::seed_from_u64(0))
            .save(&brain)
            .unwrap();
        let record_path = stig_training::TrainingRecord::path_for(&brain);
        std::fs::write(&record_path, "{}").unwrap();

        let arg = MutateArg {
            output: brain.clone(),
            brain: brain.clone(),
            scale: Some(0.5),
            seed: Some(1),
            force: true,
        };
        run(&arg).unwrap();
        assert!(!record_path.exists());
    }

    #[test]
    fn test_mutate_rejects_invalid_scale() {
        let dir = tempfile::tempdir().unwrap();
        let brain = dir.path().join("brain.bin");
        PolicyNetwork::random(8, 2, &mut Pcg64Mcg::seed_from_u64(0))
            .save(&brain)
            .unwrap();
        let arg = MutateArg {
            output: dir.path().join("child.bin"),
            brain,
            scale: Some(-1.0),
            seed: Some(1),
            force: false,
        };
        assert!(run(&arg).is_err());
        assert!(!dir.path().join("child.bin").exists());
    }
}
