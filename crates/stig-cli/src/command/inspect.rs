use std::path::PathBuf;

use stig_brain::{PolicyNetwork, summary::WeightSummary};
use stig_training::TrainingRecord;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Brain file to inspect
    #[arg(default_value = "brain.bin")]
    brain: PathBuf,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let InspectArg { brain: path } = arg;
    let brain = PolicyNetwork::load(path)?;

    println!("Brain: {}", path.display());
    println!(
        "  Shape: {} inputs, {} hidden",
        brain.input_size(),
        brain.hidden_size()
    );
    println!("  Parameters: {}", brain.parameters().count());
    println!("  Checksum: {:08x}", brain.checksum());
    println!();
    println!(
        "  {:<12} {:>8} {:>9} {:>9} {:>9} {:>9}",
        "Layer", "Count", "Min", "Max", "Mean", "StdDev"
    );
    for layer in brain.layers() {
        let Some(s) = WeightSummary::new(layer.values.iter().copied()) else {
            continue;
        };
        println!(
            "  {:<12} {:>8} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            layer.name, s.count, s.min, s.max, s.mean, s.std_dev
        );
    }

    let record_path = TrainingRecord::path_for(path);
    println!();
    match TrainingRecord::open_if_exists(&record_path)? {
        Some(record) => {
            println!("Training record: {}", record_path.display());
            println!("  Saved at: {}", record.saved_at);
            println!("  Episode: {}", record.episode);
            println!("  Best score: {}", record.best_score);
            println!("  Best result: {}", serde_json::to_string(&record.best_result)?);
            if !record.describes(&brain) {
                println!(
                    "  Warning: record belongs to another {}x{} network (checksum {:08x}, brain has {:08x})",
                    record.input_size,
                    record.hidden_size,
                    record.brain_checksum,
                    brain.checksum()
                );
            }
        }
        None => println!("No training record"),
    }
    Ok(())
}
