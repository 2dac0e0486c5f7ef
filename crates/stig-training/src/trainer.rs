//! (1+1) hill climbing over network weights.

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use rand::Rng;
use stig_brain::{BrainFileError, MutateError, PolicyNetwork};

use crate::{
    episode::{EpisodeError, RunEpisode},
    record::{RecordError, TrainingRecord},
    score::{DEFAULT_STUCK_PENALTY, EpisodeResult, EpisodeScorer, Score},
};

/// Standard deviation of the Gaussian noise added to every weight.
pub const DEFAULT_MUTATION_SCALE: f32 = 0.02;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub mutation_scale: f32,
    pub stuck_penalty: f64,
    /// Where the best network is written whenever it improves.
    pub brain_path: PathBuf,
    /// Stop after this many episodes in this run. `None` trains until cancelled.
    pub max_episodes: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            mutation_scale: DEFAULT_MUTATION_SCALE,
            stuck_penalty: DEFAULT_STUCK_PENALTY,
            brain_path: PathBuf::from("brain.bin"),
            max_episodes: None,
        }
    }
}

/// What the trainer did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// The candidate became the new best.
    Improved {
        score: Score,
        previous: Option<Score>,
        saved: bool,
    },
    /// The candidate was not strictly better and was discarded.
    Rejected { score: Score, best: Score },
    /// The episode produced no result; nothing changed.
    Unscored,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TrainError {
    #[display("{_0}")]
    Mutate(MutateError),
    #[display("{_0}")]
    Episode(EpisodeError),
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SaveError {
    #[display("{_0}")]
    Brain(BrainFileError),
    #[display("{_0}")]
    Record(RecordError),
}

/// Keeps the best network found so far and proposes mutated candidates.
///
/// The trainer only ever holds one network. Each step mutates it, runs the
/// candidate for one episode, and swaps it in if the episode scored strictly
/// better than the best so far.
#[derive(Debug)]
pub struct Trainer<R> {
    config: TrainerConfig,
    scorer: EpisodeScorer,
    best: Arc<PolicyNetwork>,
    best_score: Option<Score>,
    best_result: Option<EpisodeResult>,
    episodes: u64,
    rng: R,
}

impl<R> Trainer<R>
where
    R: Rng,
{
    pub fn new(best: PolicyNetwork, config: TrainerConfig, rng: R) -> Self {
        Self {
            scorer: EpisodeScorer::new(config.stuck_penalty),
            config,
            best: Arc::new(best),
            best_score: None,
            best_result: None,
            episodes: 0,
            rng,
        }
    }

    /// Resumes from the brain at `config.brain_path` if it exists, otherwise
    /// starts from random weights of the given shape and saves them there.
    ///
    /// The training record next to a saved brain restores the best score. An
    /// unreadable record is ignored; an unreadable brain is an error.
    pub fn open(
        config: TrainerConfig,
        input_size: usize,
        hidden_size: usize,
        mut rng: R,
    ) -> Result<Self, BrainFileError> {
        let path = config.brain_path.clone();
        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                input_size,
                hidden_size,
                "no saved brain, starting from random weights"
            );
            let brain = PolicyNetwork::random(input_size, hidden_size, &mut rng);
            let trainer = Self::new(brain, config, rng);
            if let Err(err) = trainer.save() {
                tracing::warn!(%err, "failed to save initial brain");
            }
            return Ok(trainer);
        }

        let brain = PolicyNetwork::load(&path)?;
        tracing::info!(
            path = %path.display(),
            input_size = brain.input_size(),
            hidden_size = brain.hidden_size(),
            "loaded saved brain"
        );
        let record = TrainingRecord::open_if_exists(&TrainingRecord::path_for(&path))
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring unreadable training record");
                None
            });
        let trainer = Self::new(brain, config, rng);
        Ok(match record {
            Some(record) => trainer.with_record(record),
            None => trainer,
        })
    }

    /// Restores the best score and episode count from a previous run.
    ///
    /// A record written for any other network is ignored.
    #[must_use]
    pub fn with_record(mut self, record: TrainingRecord) -> Self {
        if !record.describes(&self.best) {
            tracing::warn!(
                record_input = record.input_size,
                record_hidden = record.hidden_size,
                record_checksum = record.brain_checksum,
                brain_input = self.best.input_size(),
                brain_hidden = self.best.hidden_size(),
                brain_checksum = self.best.checksum(),
                "training record does not match brain, starting without a best score"
            );
            return self;
        }
        tracing::info!(
            episode = record.episode,
            best = %record.best_score,
            saved_at = %record.saved_at,
            "resuming training"
        );
        self.best_score = Some(record.best_score);
        self.best_result = Some(record.best_result);
        self.episodes = record.episode;
        self
    }

    /// Shared handle to the current best network.
    #[must_use]
    pub fn best(&self) -> Arc<PolicyNetwork> {
        Arc::clone(&self.best)
    }

    #[must_use]
    pub fn best_score(&self) -> Option<Score> {
        self.best_score
    }

    #[must_use]
    pub fn best_result(&self) -> Option<EpisodeResult> {
        self.best_result
    }

    /// Total episodes run, including those restored from a record.
    #[must_use]
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Produces a mutated copy of the best network.
    pub fn propose(&mut self) -> Result<PolicyNetwork, MutateError> {
        self.best.mutate(self.config.mutation_scale, &mut self.rng)
    }

    /// Scores `candidate`'s episode and keeps it if strictly better.
    ///
    /// A new best is saved immediately. Save failures are logged and do not
    /// undo the replacement.
    pub fn consider(&mut self, candidate: PolicyNetwork, result: EpisodeResult) -> Decision {
        let score = self.scorer.score(&result);
        if let Some(best) = self.best_score
            && !score.is_better_than(Some(best))
        {
            tracing::info!(episode = self.episodes, %score, %best, "candidate rejected");
            return Decision::Rejected { score, best };
        }

        let previous = self.best_score.replace(score);
        self.best = Arc::new(candidate);
        self.best_result = Some(result);
        tracing::info!(
            episode = self.episodes,
            %score,
            previous = ?previous,
            outcome = result.outcome(),
            "new best network"
        );

        let saved = match self.save() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "failed to save best network");
                false
            }
        };
        Decision::Improved {
            score,
            previous,
            saved,
        }
    }

    /// Writes the best network and its training record.
    pub fn save(&self) -> Result<(), SaveError> {
        let path = &self.config.brain_path;
        self.best.save(path).map_err(SaveError::Brain)?;
        if let (Some(best_score), Some(best_result)) = (self.best_score, self.best_result) {
            let record = TrainingRecord {
                saved_at: Utc::now(),
                episode: self.episodes,
                best_score,
                best_result,
                input_size: self.best.input_size(),
                hidden_size: self.best.hidden_size(),
                brain_checksum: self.best.checksum(),
            };
            record
                .save(&TrainingRecord::path_for(path))
                .map_err(SaveError::Record)?;
        }
        tracing::debug!(path = %path.display(), "saved best network");
        Ok(())
    }

    /// Runs one mutate, evaluate, select cycle.
    ///
    /// Episodes that end without a usable result are skipped. Fatal episode
    /// errors are returned.
    pub async fn step<E>(&mut self, runner: &mut E) -> Result<Decision, TrainError>
    where
        E: RunEpisode,
    {
        let candidate = self.propose().map_err(TrainError::Mutate)?;
        self.episodes += 1;
        tracing::info!(
            episode = self.episodes,
            best = ?self.best_score,
            "starting episode"
        );

        match runner.run_episode(&candidate).await {
            Ok(result) => Ok(self.consider(candidate, result)),
            Err(err) if !err.is_fatal() => {
                tracing::warn!(episode = self.episodes, %err, "episode discarded");
                Ok(Decision::Unscored)
            }
            Err(err) => Err(TrainError::Episode(err)),
        }
    }

    /// Repeats [`step`](Self::step) until `max_episodes` is reached or an
    /// error occurs.
    ///
    /// To stop on a signal, race this future against it; the best network on
    /// disk is always the last improvement.
    pub async fn run<E>(&mut self, runner: &mut E) -> Result<(), TrainError>
    where
        E: RunEpisode,
    {
        let mut run = 0_u64;
        while self.config.max_episodes.is_none_or(|max| run < max) {
            self.step(runner).await?;
            run += 1;
        }
        tracing::info!(
            episodes = run,
            best = ?self.best_score,
            "training finished"
        );
        Ok(())
    }
}
