use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stig_brain::PolicyNetwork;

use crate::score::{EpisodeResult, Score};

/// Training progress saved next to the brain file.
///
/// The brain file alone does not say how good the network is. Without this
/// record a resumed run would accept the first candidate it tries, however
/// bad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub saved_at: DateTime<Utc>,
    /// Number of episodes run when the brain was saved.
    pub episode: u64,
    pub best_score: Score,
    pub best_result: EpisodeResult,
    pub input_size: usize,
    pub hidden_size: usize,
    /// [`PolicyNetwork::checksum`] of the brain this record was written for.
    pub brain_checksum: u32,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum RecordError {
    #[display("failed to access training record {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("invalid training record {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl TrainingRecord {
    /// Location of the record belonging to `brain_path` (`brain.bin` → `brain.json`).
    #[must_use]
    pub fn path_for(brain_path: &Path) -> PathBuf {
        brain_path.with_extension("json")
    }

    /// Whether this record was written for exactly `brain`.
    #[must_use]
    pub fn describes(&self, brain: &PolicyNetwork) -> bool {
        (self.input_size, self.hidden_size) == (brain.input_size(), brain.hidden_size())
            && self.brain_checksum == brain.checksum()
    }

    pub fn open(path: &Path) -> Result<Self, RecordError> {
        let json = fs::read_to_string(path).map_err(|source| RecordError::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| RecordError::Json {
            path: path.to_owned(),
            source,
        })
    }

    /// Like [`open`](Self::open), but a missing file is `Ok(None)`.
    pub fn open_if_exists(path: &Path) -> Result<Option<Self>, RecordError> {
        match Self::open(path) {
            Ok(record) => Ok(Some(record)),
            Err(RecordError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes the record at `path`. Returns whether one existed.
    pub fn discard(path: &Path) -> Result<bool, RecordError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RecordError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| RecordError::Json {
            path: path.to_owned(),
            source,
        })?;
        fs::write(path, json).map_err(|source| RecordError::Io {
            path: path.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    fn record() -> TrainingRecord {
        TrainingRecord {
            saved_at: Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap(),
            episode: 42,
            best_score: Score::Finished(-109_214.0),
            best_result: EpisodeResult::Finished {
                race_time_ms: 109_214,
            },
            input_size: 4800,
            hidden_size: 64,
            brain_checksum: 0x1234_5678,
        }
    }

    #[test]
    fn test_path_for() {
        assert_eq!(
            TrainingRecord::path_for(Path::new("out/brain.bin")),
            Path::new("out/brain.json")
        );
        assert_eq!(
            TrainingRecord::path_for(Path::new("brain")),
            Path::new("brain.json")
        );
    }

    #[test]
    fn test_save_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.json");
        record().save(&path).unwrap();
        assert_eq!(TrainingRecord::open(&path).unwrap(), record());
    }

    #[test]
    fn test_open_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.json");
        assert!(TrainingRecord::open_if_exists(&path).unwrap().is_none());

        fs::write(&path, "{ not json").unwrap();
        let err = TrainingRecord::open_if_exists(&path).unwrap_err();
        assert!(matches!(err, RecordError::Json { .. }));
    }

    #[test]
    fn test_discard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.json");
        record().save(&path).unwrap();
        assert!(TrainingRecord::discard(&path).unwrap());
        assert!(!path.exists());
        assert!(!TrainingRecord::discard(&path).unwrap());
    }

    #[test]
    fn test_describes_only_its_brain() {
        let mut rng = Pcg64Mcg::seed_from_u64(4);
        let brain = PolicyNetwork::random(16, 4, &mut rng);
        let other = PolicyNetwork::random(16, 4, &mut rng);
        let record = TrainingRecord {
            input_size: 16,
            hidden_size: 4,
            brain_checksum: brain.checksum(),
            ..record()
        };
        assert!(record.describes(&brain));
        assert!(!record.describes(&other));
        assert!(!self::record().describes(&brain));
    }
}
