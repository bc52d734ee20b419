//! Weighted categorical sampling.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::fmt;

/// Reasons a set of weighted choices cannot be sampled from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplerError {
    /// No choices at all
    #[error("no choices to sample from")]
    Empty,

    /// A weight is negative, NaN or infinite
    #[error("weight {weight} at position {position} is not a finite non-negative number")]
    InvalidWeight { position: usize, weight: f64 },

    /// Every weight is zero
    #[error("all weights are zero")]
    ZeroTotal,
}

/// Draws items with probability proportional to their weight.
///
/// Weights need not sum to one. Equal weights give the uniform case.
#[derive(Clone)]
pub struct WeightedSampler<T> {
    items: Vec<T>,
    weights: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl<T> WeightedSampler<T> {
    /// Build a sampler from `(item, weight)` pairs.
    pub fn new(pairs: impl IntoIterator<Item = (T, f64)>) -> Result<Self, SamplerError> {
        let (items, weights): (Vec<T>, Vec<f64>) = pairs.into_iter().unzip();

        if items.is_empty() {
            return Err(SamplerError::Empty);
        }
        if let Some((position, &weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(SamplerError::InvalidWeight { position, weight });
        }
        if weights.iter().all(|w| *w == 0.0) {
            return Err(SamplerError::ZeroTotal);
        }

        let index =
            WeightedIndex::new(weights.iter().copied()).map_err(|_| SamplerError::ZeroTotal)?;

        Ok(Self {
            items,
            weights,
            index,
        })
    }

    /// Build a sampler where every item is equally likely.
    pub fn uniform(items: Vec<T>) -> Result<Self, SamplerError> {
        Self::new(items.into_iter().map(|item| (item, 1.0)))
    }

    /// Draw the position of one item.
    pub fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.index.sample(rng)
    }

    /// Draw one item.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.items[self.sample_index(rng)]
    }

    /// Item at a previously drawn position.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Number of choices.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no choices. Always false for a constructed sampler.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Expected frequency of the item at `index`.
    pub fn probability(&self, index: usize) -> f64 {
        let total: f64 = self.weights.iter().sum();
        self.weights.get(index).map(|w| w / total).unwrap_or(0.0)
    }
}

impl<T: fmt::Debug> fmt::Debug for WeightedSampler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightedSampler")
            .field("items", &self.items)
            .field("weights", &self.weights)
            .finish()
    }
}
