//! Weighted random sampling with replacement from a dynamic discrete
//! distribution.
//!
//! Given a vector of nonnegative `f64` weights, element i is drawn with
//! probability `weights[i] / Σweights`. Individual weights update in
//! O(1), append is amortized O(1), positional deletion is O(n), and a
//! draw costs time logarithmic in the dynamic range of the positive
//! weights plus an expected constant number of rejection rounds.
//!
//! Internally, elements are grouped into power-of-two weight levels; a
//! draw selects a level by cumulative sum and then runs
//! acceptance–rejection among that level's members. See [`core`] for
//! the data structure itself, which can be driven with any
//! [`rand::Rng`]. [`WeightedSampler`] bundles the table with a seeded
//! `ChaCha8` generator for reproducible use.
//!
//! Zero weights are valid and mean "held but never drawn". Weights below
//! the IEEE-754 normal range are not supported.
//!
//! ```
//! use leveled_sampler::WeightedSampler;
//!
//! let mut sampler = WeightedSampler::new(vec![1.0, 2.0, 4.0], Some(42)).unwrap();
//! let drawn = sampler.draw().unwrap();
//! assert!(drawn < 3);
//!
//! sampler.set(0, 10.0).unwrap();
//! sampler.append(0.5).unwrap();
//! ```

#![allow(clippy::redundant_pub_crate)]

pub mod core;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::core::{
    chi_squared_from_counts, sample, sample_n, ChiSquaredResult, LevelTable, SamplerError,
};

/// Expected counts below this are excluded from the chi-squared
/// statistic, per the usual validity assumption of the test.
const MIN_EXPECTED_CHI2: f64 = 5.0;

/// A dynamic weighted sampler bundling the level table with a seeded
/// random number generator (`ChaCha8` for reproducibility).
///
/// All mutators and accessors delegate to the underlying
/// [`LevelTable`]; [`draw`](Self::draw) consumes the internal generator.
/// For reproducible sequences, construct with a seed or call
/// [`seed`](Self::seed).
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    /// The level table holding weights and bucket state.
    table: LevelTable,
    /// Internal random number generator.
    rng: ChaCha8Rng,
}

impl WeightedSampler {
    /// Create a sampler from a weight vector.
    ///
    /// With `seed = None` the generator is seeded from system entropy.
    ///
    /// # Errors
    ///
    /// [`SamplerError::NegativeWeight`] or
    /// [`SamplerError::NonFiniteWeight`] if any weight is invalid.
    pub fn new(weights: Vec<f64>, seed: Option<u64>) -> Result<Self, SamplerError> {
        let table = LevelTable::new(weights)?;
        let rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        Ok(Self { table, rng })
    }

    /// Reseed the internal random number generator.
    pub fn seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Number of elements, including zero-weight ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the sampler holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// All weights in element-index order.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        self.table.weights()
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.table.total_weight()
    }

    /// The underlying level table.
    #[must_use]
    pub const fn table(&self) -> &LevelTable {
        &self.table
    }

    /// The weight at `index`.
    ///
    /// # Errors
    ///
    /// [`SamplerError::IndexOutOfRange`] outside `[0, len)`.
    pub fn get(&self, index: usize) -> Result<f64, SamplerError> {
        self.table.get(index)
    }

    /// Replace the weight at `index`, returning the signed change.
    ///
    /// Setting a weight to zero excludes the element from draws without
    /// shifting any indices; use [`delete_at`](Self::delete_at) to
    /// actually remove it.
    ///
    /// # Errors
    ///
    /// [`SamplerError::IndexOutOfRange`], [`SamplerError::NegativeWeight`],
    /// or [`SamplerError::NonFiniteWeight`].
    pub fn set(&mut self, index: usize, weight: f64) -> Result<f64, SamplerError> {
        self.table.set(index, weight)
    }

    /// Append a new element, returning its index.
    ///
    /// # Errors
    ///
    /// [`SamplerError::NegativeWeight`] or
    /// [`SamplerError::NonFiniteWeight`].
    pub fn append(&mut self, weight: f64) -> Result<usize, SamplerError> {
        self.table.append(weight)
    }

    /// Append every weight from an iterator.
    ///
    /// # Errors
    ///
    /// [`SamplerError::NegativeWeight`] or
    /// [`SamplerError::NonFiniteWeight`]; weights before the offending
    /// one remain appended.
    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, weights: I) -> Result<(), SamplerError> {
        for w in weights {
            self.table.append(w)?;
        }
        Ok(())
    }

    /// Delete the element at `index`, shifting later indices down.
    /// Returns the new length.
    ///
    /// # Errors
    ///
    /// [`SamplerError::IndexOutOfRange`].
    pub fn delete_at(&mut self, index: usize) -> Result<usize, SamplerError> {
        self.table.delete_at(index)
    }

    /// Remove and return the last weight.
    ///
    /// # Errors
    ///
    /// [`SamplerError::IndexOutOfRange`] when the sampler is empty.
    pub fn pop(&mut self) -> Result<f64, SamplerError> {
        let last = self
            .len()
            .checked_sub(1)
            .ok_or(SamplerError::IndexOutOfRange { index: 0, len: 0 })?;
        let weight = self.table.get(last)?;
        self.table.delete_at(last)?;
        Ok(weight)
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Draw one element index with probability proportional to its
    /// weight.
    ///
    /// # Errors
    ///
    /// [`SamplerError::EmptyDistribution`] when no element has positive
    /// weight.
    pub fn draw(&mut self) -> Result<usize, SamplerError> {
        sample(&self.table, &mut self.rng)
    }

    /// Draw `n` element indices with replacement.
    ///
    /// # Errors
    ///
    /// [`SamplerError::EmptyDistribution`] when no element has positive
    /// weight.
    pub fn draw_n(&mut self, n: usize) -> Result<Vec<usize>, SamplerError> {
        sample_n(&self.table, n, &mut self.rng)
    }

    /// Run a chi-squared goodness-of-fit self-test.
    ///
    /// Takes `num_samples` draws through the real sampling path and
    /// tests the observed counts against the expected multinomial
    /// `w_i / Σw`. Elements whose expected count falls below the usual
    /// chi-squared validity threshold of five are excluded from the
    /// statistic.
    ///
    /// # Errors
    ///
    /// [`SamplerError::EmptyDistribution`] when no element has positive
    /// weight.
    pub fn test_distribution(
        &mut self,
        num_samples: usize,
    ) -> Result<ChiSquaredResult, SamplerError> {
        let weights = self.table.weights().to_vec();
        let total = self.table.total_weight();

        let mut observed = vec![0usize; weights.len()];
        for _ in 0..num_samples {
            let index = sample(&self.table, &mut self.rng)?;
            observed[index] += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = num_samples as f64;
        let mut included_observed = Vec::new();
        let mut included_weights = Vec::new();
        for (index, &w) in weights.iter().enumerate() {
            if w / total * n >= MIN_EXPECTED_CHI2 {
                included_observed.push(observed[index]);
                included_weights.push(w);
            }
        }
        let included_total: usize = included_observed.iter().sum();

        Ok(chi_squared_from_counts(
            &included_observed,
            &included_weights,
            included_total,
        ))
    }
}
