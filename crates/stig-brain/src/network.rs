//! Fixed-topology feed-forward policy network.
//!
//! # Weight Layout
//!
//! Matrices are stored as flat row-major vectors:
//!
//! | Parameter | Shape                   | Index of `[r][c]`      |
//! |-----------|-------------------------|------------------------|
//! | `W1`      | `input_size × hidden`   | `r * hidden + c`       |
//! | `B1`      | `hidden`                |                        |
//! | `W2T`     | `hidden × 3`            | `r * 3 + c`            |
//! | `B2T`     | `3`                     |                        |
//! | `W2S`     | `hidden × 3`            | `r * 3 + c`            |
//! | `B2S`     | `3`                     |                        |
//!
//! This order is also the canonical parameter order used by mutation (noise is
//! drawn in this order, so a seeded generator reproduces the same mutant) and
//! by the brain file.
//!
//! # Initialization
//!
//! Every weight is drawn independently from `U(-0.1, 0.1)`; all biases start
//! at zero.
//!
//! # Mutation
//!
//! [`PolicyNetwork::mutate`] is the only exploration operator: it returns a new
//! network with `N(0, scale²)` noise added to every weight and bias. The source
//! network is never modified.

use rand::Rng;
use rand_distr::Normal;
use stig_vision::{DecodeError, FeatureExtractor};

use crate::action::{Action, Steering, Throttle};

/// Number of classes of each output head.
pub const HEAD_CLASSES: usize = 3;

/// Half-width of the uniform weight initialization range.
pub const INIT_WEIGHT_RANGE: f32 = 0.1;

/// Feature count of an 80x60 capture.
pub const DEFAULT_INPUT_SIZE: usize = 80 * 60;

pub const DEFAULT_HIDDEN_SIZE: usize = 64;

/// Inference failed because the frame could not be decoded.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("prediction failed: {_0}")]
pub struct PredictionError(DecodeError);

/// The requested mutation scale is not a valid standard deviation.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("invalid mutation scale {scale}: must be finite and non-negative")]
pub struct MutateError {
    scale: f32,
}

/// A named parameter block of a network, in canonical order.
#[derive(Debug, Clone, Copy)]
pub struct Layer<'a> {
    pub name: &'static str,
    pub values: &'a [f32],
}

#[derive(Debug, Clone, PartialEq)]
struct Head {
    // hidden_size × HEAD_CLASSES, row-major
    weights: Vec<f32>,
    bias: [f32; HEAD_CLASSES],
}

impl Head {
    fn random<R>(hidden_size: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            weights: random_weights(hidden_size * HEAD_CLASSES, rng),
            bias: [0.0; HEAD_CLASSES],
        }
    }

    fn logits(&self, hidden: &[f32]) -> [f32; HEAD_CLASSES] {
        let mut logits = self.bias;
        for (h, row) in hidden.iter().zip(self.weights.chunks_exact(HEAD_CLASSES)) {
            for (logit, w) in logits.iter_mut().zip(row) {
                *logit += h * w;
            }
        }
        logits
    }
}

/// Class probabilities of both heads for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Probabilities in [`Throttle::ALL`] order.
    pub throttle: [f32; HEAD_CLASSES],
    /// Probabilities in [`Steering::ALL`] order.
    pub steering: [f32; HEAD_CLASSES],
}

impl Prediction {
    /// Picks the most probable class of each head.
    #[must_use]
    pub fn action(&self) -> Action {
        let throttle = Throttle::ALL[argmax(&self.throttle)];
        let steering = Steering::ALL[argmax(&self.steering)];
        Action::new(throttle, steering)
    }
}

/// A one-hidden-layer network with a throttle head and a steering head.
///
/// `input_size` and `hidden_size` are fixed for the lifetime of the value.
/// [`Clone`] produces a deep copy that shares nothing with the source.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyNetwork {
    input_size: usize,
    hidden_size: usize,
    // input_size × hidden_size, row-major
    w1: Vec<f32>,
    b1: Vec<f32>,
    throttle: Head,
    steering: Head,
}

impl PolicyNetwork {
    /// Creates a randomly initialized network.
    ///
    /// # Panics
    ///
    /// Panics if either size is zero or does not fit in a `u32`.
    pub fn random<R>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        assert!(input_size > 0 && hidden_size > 0, "network sizes must be non-zero");
        assert!(
            u32::try_from(input_size).is_ok() && u32::try_from(hidden_size).is_ok(),
            "network sizes must fit in u32"
        );
        Self {
            input_size,
            hidden_size,
            w1: random_weights(input_size * hidden_size, rng),
            b1: vec![0.0; hidden_size],
            throttle: Head::random(hidden_size, rng),
            steering: Head::random(hidden_size, rng),
        }
    }

    /// Rebuilds a network from parameters in canonical order.
    ///
    /// Returns `None` if `parameters` does not hold exactly
    /// [`parameter_count`] values for the given shape.
    pub(crate) fn from_parameters(
        input_size: usize,
        hidden_size: usize,
        parameters: &[f32],
    ) -> Option<Self> {
        if input_size == 0
            || hidden_size == 0
            || parameters.len() != parameter_count(input_size, hidden_size)?
        {
            return None;
        }

        let (w1, rest) = parameters.split_at(input_size * hidden_size);
        let (b1, rest) = rest.split_at(hidden_size);
        let (w2t, rest) = rest.split_at(hidden_size * HEAD_CLASSES);
        let (b2t, rest) = rest.split_at(HEAD_CLASSES);
        let (w2s, b2s) = rest.split_at(hidden_size * HEAD_CLASSES);

        Some(Self {
            input_size,
            hidden_size,
            w1: w1.to_vec(),
            b1: b1.to_vec(),
            throttle: Head {
                weights: w2t.to_vec(),
                bias: b2t.try_into().ok()?,
            },
            steering: Head {
                weights: w2s.to_vec(),
                bias: b2s.try_into().ok()?,
            },
        })
    }

    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// The extractor that produces inputs of the size this network expects.
    #[must_use]
    pub fn feature_extractor(&self) -> FeatureExtractor {
        FeatureExtractor::new(self.input_size)
    }

    /// Returns every parameter block in canonical order.
    #[must_use]
    pub fn layers(&self) -> [Layer<'_>; 6] {
        [
            Layer {
                name: "w1",
                values: &self.w1,
            },
            Layer {
                name: "b1",
                values: &self.b1,
            },
            Layer {
                name: "w2_throttle",
                values: &self.throttle.weights,
            },
            Layer {
                name: "b2_throttle",
                values: &self.throttle.bias,
            },
            Layer {
                name: "w2_steering",
                values: &self.steering.weights,
            },
            Layer {
                name: "b2_steering",
                values: &self.steering.bias,
            },
        ]
    }

    /// Iterates over all parameters in canonical order.
    pub fn parameters(&self) -> impl Iterator<Item = f32> + '_ {
        self.layers()
            .into_iter()
            .flat_map(|layer| layer.values.iter().copied())
    }

    fn parameters_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.w1
            .iter_mut()
            .chain(&mut self.b1)
            .chain(&mut self.throttle.weights)
            .chain(&mut self.throttle.bias)
            .chain(&mut self.steering.weights)
            .chain(&mut self.steering.bias)
    }

    /// Returns a perturbed copy with `N(0, scale²)` noise on every parameter.
    ///
    /// A scale of zero yields an exact copy.
    pub fn mutate<R>(&self, scale: f32, rng: &mut R) -> Result<Self, MutateError>
    where
        R: Rng + ?Sized,
    {
        let normal = Normal::new(0.0, scale)
            .ok()
            .filter(|_| scale.is_finite())
            .ok_or(MutateError { scale })?;

        let mut mutant = self.clone();
        for w in mutant.parameters_mut() {
            *w += rng.sample(normal);
        }
        Ok(mutant)
    }

    /// Runs the forward pass on an already extracted feature vector.
    ///
    /// Missing trailing features count as zero and extra ones are ignored,
    /// mirroring the extractor's pad/truncate policy.
    #[must_use]
    pub fn forward(&self, features: &[f32]) -> Prediction {
        let mut hidden = self.b1.clone();
        for (x, row) in features.iter().zip(self.w1.chunks_exact(self.hidden_size)) {
            for (h, w) in hidden.iter_mut().zip(row) {
                *h += x * w;
            }
        }
        for h in &mut hidden {
            *h = h.max(0.0);
        }

        Prediction {
            throttle: softmax(self.throttle.logits(&hidden)),
            steering: softmax(self.steering.logits(&hidden)),
        }
    }

    /// Decodes `frame` and returns both heads' class probabilities.
    pub fn predict_probabilities(&self, frame: &[u8]) -> Result<Prediction, PredictionError> {
        let features = self
            .feature_extractor()
            .extract(frame)
            .map_err(PredictionError)?;
        Ok(self.forward(&features))
    }

    /// Decodes `frame` and returns the chosen action.
    pub fn predict(&self, frame: &[u8]) -> Result<Action, PredictionError> {
        Ok(self.predict_probabilities(frame)?.action())
    }
}

/// Number of parameters of a network with the given shape, or `None` on
/// overflow.
#[must_use]
pub fn parameter_count(input_size: usize, hidden_size: usize) -> Option<usize> {
    let w1 = input_size.checked_mul(hidden_size)?;
    let head = hidden_size.checked_mul(HEAD_CLASSES)?.checked_add(HEAD_CLASSES)?;
    w1.checked_add(hidden_size)?.checked_add(head.checked_mul(2)?)
}

/// Numerically stable softmax: the maximum logit is subtracted before
/// exponentiation.
#[must_use]
pub fn softmax<const N: usize>(logits: [f32; N]) -> [f32; N] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out = logits.map(|l| (l - max).exp());
    let sum = out.iter().sum::<f32>();
    for p in &mut out {
        *p /= sum;
    }
    out
}

/// Index of the largest value; the first one wins ties. Returns `0` for an
/// empty slice.
#[must_use]
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn random_weights<R>(len: usize, rng: &mut R) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    (0..len)
        .map(|_| rng.random_range(-INIT_WEIGHT_RANGE..=INIT_WEIGHT_RANGE))
        .collect()
}
