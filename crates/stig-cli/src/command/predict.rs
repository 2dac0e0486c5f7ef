use std::{fs, path::PathBuf};

use anyhow::Context as _;
use stig_brain::{PolicyNetwork, Steering, Throttle};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PredictArg {
    /// Image file (PNG or JPEG) to feed to the brain
    frame: PathBuf,
    /// Brain file path
    #[arg(long, default_value = "brain.bin")]
    brain: PathBuf,
}

pub(crate) fn run(arg: &PredictArg) -> anyhow::Result<()> {
    let PredictArg { frame, brain } = arg;
    let brain = PolicyNetwork::load(brain)?;
    let bytes =
        fs::read(frame).with_context(|| format!("Failed to read frame: {}", frame.display()))?;
    let prediction = brain
        .predict_probabilities(&bytes)
        .with_context(|| format!("Failed to run brain on {}", frame.display()))?;

    println!("Throttle:");
    for (throttle, p) in Throttle::ALL.iter().zip(prediction.throttle) {
        println!("  {:<10} {p:.4}", throttle.to_string());
    }
    println!("Steering:");
    for (steering, p) in Steering::ALL.iter().zip(prediction.steering) {
        println!("  {:<10} {p:.4}", steering.to_string());
    }
    println!("Action: {}", prediction.action());
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgb, RgbImage};
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_predict_on_frame_file() {
        let dir = tempfile::tempdir().unwrap();
        let brain = dir.path().join("brain.bin");
        PolicyNetwork::random(64, 4, &mut Pcg64Mcg::seed_from_u64(1))
            .save(&brain)
            .unwrap();
        let frame = dir.path().join("frame.png");
        RgbImage::from_pixel(8, 8, Rgb([10, 200, 30]))
            .save_with_format(&frame, ImageFormat::Png)
            .unwrap();

        run(&PredictArg {
            frame: frame.clone(),
            brain: brain.clone(),
        })
        .unwrap();

        fs::write(&frame, b"not an image").unwrap();
        assert!(run(&PredictArg { frame, brain }).is_err());
    }
}
