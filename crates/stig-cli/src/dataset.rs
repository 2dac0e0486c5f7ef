//! Recorded laps of human driving.
//!
//! A recording session stores each lap in its own directory (`lap_<n>`) with
//! one file per captured frame:
//!
//! ```text
//! frame_<unix-nanos>_<throttle>_<steering>.<png|jpeg|jpg>
//! ```
//!
//! An empty throttle label means no throttle key was held, and an empty
//! steering label means the wheel was straight, e.g. `frame_1718000000000000000__left.png`.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};
use stig_brain::{Action, Steering, Throttle};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpeg", "jpg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LabeledFrame {
    pub(crate) path: PathBuf,
    pub(crate) timestamp_nanos: u64,
    pub(crate) action: Action,
}

impl LabeledFrame {
    pub(crate) fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (timestamp_nanos, action) = parse_frame_name(name)?;
        Some(Self {
            path: path.to_owned(),
            timestamp_nanos,
            action,
        })
    }

    pub(crate) fn read(&self) -> anyhow::Result<Vec<u8>> {
        fs::read(&self.path)
            .with_context(|| format!("Failed to read frame: {}", self.path.display()))
    }

    /// Time since `origin`, saturating at zero.
    pub(crate) fn elapsed_since(&self, origin: &LabeledFrame) -> Duration {
        Duration::from_nanos(self.timestamp_nanos.saturating_sub(origin.timestamp_nanos))
    }
}

/// Lists the frames of one recorded lap, oldest first.
///
/// Files that do not follow the frame naming scheme are skipped.
pub(crate) fn read_lap(dir: &Path) -> anyhow::Result<Vec<LabeledFrame>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read lap directory: {}", dir.display()))?;

    let mut frames = vec![];
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to read lap directory: {}", dir.display()))?;
        let path = entry.path();
        match LabeledFrame::from_path(&path) {
            Some(frame) => frames.push(frame),
            None => tracing::debug!(path = %path.display(), "skipping non-frame file"),
        }
    }
    if frames.is_empty() {
        bail!("No recorded frames found in {}", dir.display());
    }

    frames.sort_by(|a, b| {
        a.timestamp_nanos
            .cmp(&b.timestamp_nanos)
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(frames)
}

fn parse_frame_name(name: &str) -> Option<(u64, Action)> {
    let (stem, extension) = name.rsplit_once('.')?;
    if !FRAME_EXTENSIONS
        .iter()
        .any(|ext| extension.eq_ignore_ascii_case(ext))
    {
        return None;
    }

    let mut fields = stem.strip_prefix("frame_")?.splitn(3, '_');
    let (Some(timestamp), Some(throttle), Some(steering)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return None;
    };
    if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let timestamp = timestamp.parse().ok()?;
    let action = Action::new(throttle_label(throttle)?, steering_label(steering)?);
    Some((timestamp, action))
}

fn throttle_label(label: &str) -> Option<Throttle> {
    match label.to_ascii_lowercase().as_str() {
        "" => Some(Throttle::Neutral),
        "accelerate" => Some(Throttle::Accelerate),
        "brake" => Some(Throttle::Brake),
        _ => None,
    }
}

fn steering_label(label: &str) -> Option<Steering> {
    match label.to_ascii_lowercase().as_str() {
        "" => Some(Steering::Straight),
        "left" => Some(Steering::Left),
        "right" => Some(Steering::Right),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32, value: u8) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([value; 3]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_name() {
        assert_eq!(
            parse_frame_name("frame_1718000000123456789_accelerate_left.png"),
            Some((
                1_718_000_000_123_456_789,
                Action::new(Throttle::Accelerate, Steering::Left)
            ))
        );
        assert_eq!(
            parse_frame_name("frame_5__.jpeg"),
            Some((5, Action::default()))
        );
        assert_eq!(
            parse_frame_name("frame_7_brake_.JPG"),
            Some((7, Action::new(Throttle::Brake, Steering::Straight)))
        );
        assert_eq!(
            parse_frame_name("frame_9__right.jpg"),
            Some((9, Action::new(Throttle::Neutral, Steering::Right)))
        );
    }

    #[test]
    fn test_parse_rejects_other_files() {
        for name in [
            "frame_1_accelerate_left.txt",
            "frame_1_accelerate.png",
            "frame__accelerate_left.png",
            "frame_x1_accelerate_left.png",
            "frame_1_boost_left.png",
            "frame_1_accelerate_left_extra.png",
            "snapshot_1_accelerate_left.png",
            ".DS_Store",
        ] {
            assert_eq!(parse_frame_name(name), None, "{name}");
        }
    }

    #[test]
    fn test_read_lap_sorts_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "frame_300__left.png",
            "frame_100_accelerate_.png",
            "frame_200_brake_right.png",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let frames = read_lap(dir.path()).unwrap();
        let stamps = frames.iter().map(|f| f.timestamp_nanos).collect::<Vec<_>>();
        assert_eq!(stamps, [100, 200, 300]);
        assert_eq!(
            frames[1].action,
            Action::new(Throttle::Brake, Steering::Right)
        );
        assert_eq!(
            frames[2].elapsed_since(&frames[0]),
            Duration::from_nanos(200)
        );
    }

    #[test]
    fn test_read_lap_requires_frames() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        assert!(read_lap(dir.path()).is_err());
        assert!(read_lap(&dir.path().join("missing")).is_err());
    }
}
