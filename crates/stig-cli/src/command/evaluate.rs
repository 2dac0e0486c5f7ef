use std::path::PathBuf;

use stig_brain::{HEAD_CLASSES, PolicyNetwork, Steering, Throttle};

use crate::dataset::{self, LabeledFrame};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvaluateArg {
    /// Directory of one recorded lap (`lap_<n>`)
    lap: PathBuf,
    /// Brain file path
    #[arg(long, default_value = "brain.bin")]
    brain: PathBuf,
}

/// How often a brain picks the same keys as the recorded driver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Agreement {
    pub(crate) frames: usize,
    pub(crate) skipped: usize,
    pub(crate) throttle: usize,
    pub(crate) steering: usize,
    pub(crate) both: usize,
    /// `[recorded][predicted]` counts in `Throttle::ALL` order.
    pub(crate) throttle_confusion: [[usize; HEAD_CLASSES]; HEAD_CLASSES],
    /// `[recorded][predicted]` counts in `Steering::ALL` order.
    pub(crate) steering_confusion: [[usize; HEAD_CLASSES]; HEAD_CLASSES],
}

pub(crate) fn evaluate_lap(
    brain: &PolicyNetwork,
    frames: &[LabeledFrame],
) -> anyhow::Result<Agreement> {
    let mut agreement = Agreement::default();
    for frame in frames {
        let bytes = frame.read()?;
        let predicted = match brain.predict(&bytes) {
            Ok(action) => action,
            Err(err) => {
                tracing::warn!(path = %frame.path.display(), %err, "skipping frame");
                agreement.skipped += 1;
                continue;
            }
        };
        let recorded = frame.action;

        agreement.frames += 1;
        agreement.throttle_confusion[recorded.throttle.index()][predicted.throttle.index()] += 1;
        agreement.steering_confusion[recorded.steering.index()][predicted.steering.index()] += 1;
        let throttle = recorded.throttle == predicted.throttle;
        let steering = recorded.steering == predicted.steering;
        agreement.throttle += usize::from(throttle);
        agreement.steering += usize::from(steering);
        agreement.both += usize::from(throttle && steering);
    }
    Ok(agreement)
}

pub(crate) fn run(arg: &EvaluateArg) -> anyhow::Result<()> {
    let EvaluateArg { lap, brain } = arg;
    let brain = PolicyNetwork::load(brain)?;
    let frames = dataset::read_lap(lap)?;
    let agreement = evaluate_lap(&brain, &frames)?;

    println!("Lap: {}", lap.display());
    println!(
        "  Frames: {} ({} skipped)",
        agreement.frames, agreement.skipped
    );
    println!(
        "  Throttle agreement: {:6.2}%",
        percent(agreement.throttle, agreement.frames)
    );
    println!(
        "  Steering agreement: {:6.2}%",
        percent(agreement.steering, agreement.frames)
    );
    println!(
        "  Both agreement:     {:6.2}%",
        percent(agreement.both, agreement.frames)
    );

    let throttle_labels = Throttle::ALL.map(|t| t.to_string());
    print_confusion("Throttle", &throttle_labels, &agreement.throttle_confusion);
    let steering_labels = Steering::ALL.map(|s| s.to_string());
    print_confusion("Steering", &steering_labels, &agreement.steering_confusion);
    Ok(())
}

fn print_confusion(
    head: &str,
    labels: &[String; HEAD_CLASSES],
    counts: &[[usize; HEAD_CLASSES]; HEAD_CLASSES],
) {
    println!();
    println!("  {head} (rows: recorded, columns: predicted)");
    print!("  {:<12}", "");
    for label in labels {
        print!(" {label:>10}");
    }
    println!();
    for (label, row) in labels.iter().zip(counts) {
        print!("  {label:<12}");
        for count in row {
            print!(" {count:>10}");
        }
        println!();
    }
}

#[expect(clippy::cast_precision_loss)]
fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}
