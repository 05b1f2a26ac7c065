//! Table of levels: sampler state, maintenance, and public mutators.
//!
//! The [`LevelTable`] owns the weights vector, the ordered level sequence,
//! the parallel positions vector, and the running total. Levels are kept
//! in descending order of bounds so the cumulative scan in
//! [`crate::core::sample`] adds the largest contributions first, which
//! bounds the relative error of the threshold comparison.
//!
//! Maintenance keeps the level sequence contiguous by exponent: extension
//! prepends or appends runs of empty levels when a weight lands outside
//! the covered range, and trimming drops empty leading and trailing
//! levels after a removal (interior empties are retained so offsets stay
//! in lockstep with exponents).

use crate::core::{floor_log2, log_bounds, Level, SamplerError, NO_POSITION};

/// Weighted random sampling state over a dynamic set of `f64` weights.
///
/// Element i is drawn with probability `weights[i] / total_weight`.
/// Individual weights update in O(1), append is amortized O(1), and
/// positional deletion is O(n). Zero weights are held but never drawn.
///
/// Mutation is single-owner: the table presents no internal
/// synchronization, and callers that share it across threads must
/// serialize every call sequence containing a mutator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelTable {
    /// Element weights in index order.
    weights: Vec<f64>,
    /// Levels in descending order of bounds, contiguous by exponent.
    levels: Vec<Level>,
    /// Offset of each element inside its level's member list, or
    /// [`NO_POSITION`] for zero weights.
    positions: Vec<usize>,
    /// Running total of all weights.
    sum: f64,
    /// Exponent k such that `levels[0]` is `[2^(k-1), 2^k)`; `None` iff
    /// `levels` is empty.
    max_log2_upper: Option<i32>,
}

impl LevelTable {
    /// Build a table from an initial weight vector.
    ///
    /// An empty or all-zero vector produces a table with no levels that
    /// still owns its weights and positions. Otherwise a single scan
    /// finds the positive minimum and maximum, the level sequence is
    /// allocated to cover their exponent span, and one placement pass
    /// files every nonzero weight. Total work is Θ(n + log d) for
    /// dynamic range d.
    ///
    /// # Errors
    ///
    /// [`SamplerError::NegativeWeight`] or
    /// [`SamplerError::NonFiniteWeight`] if any input weight is invalid;
    /// nothing is constructed in that case.
    pub fn new(weights: Vec<f64>) -> Result<Self, SamplerError> {
        for &w in &weights {
            validate_weight(w)?;
        }

        let positions = vec![NO_POSITION; weights.len()];
        let mut w_min = f64::INFINITY;
        let mut w_max = 0.0_f64;
        for &w in &weights {
            if w > 0.0 {
                w_min = w_min.min(w);
                w_max = w_max.max(w);
            }
        }

        let mut table = Self {
            weights,
            levels: Vec::new(),
            positions,
            sum: 0.0,
            max_log2_upper: None,
        };
        if w_max == 0.0 {
            return Ok(table);
        }

        let upper = floor_log2(w_max) + 1;
        let num_levels = (upper - floor_log2(w_min)) as usize;
        table.levels = (0..num_levels)
            .map(|i| Level::with_exponent(upper - 1 - i as i32))
            .collect();
        table.max_log2_upper = Some(upper);

        for index in 0..table.weights.len() {
            let w = table.weights[index];
            if w > 0.0 {
                let Some(dst) = table.level_offset(w) else {
                    unreachable!("constructed levels must cover weight {w}");
                };
                table.levels[dst].add(index, &table.weights, &mut table.positions);
                table.sum += w;
            }
        }
        Ok(table)
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    /// Number of elements, including zero-weight ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the table holds no elements at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// All weights in element-index order.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Running total of all weights.
    #[must_use]
    pub const fn total_weight(&self) -> f64 {
        self.sum
    }

    /// The level sequence, in descending order of bounds.
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Per-element offsets into level member lists ([`NO_POSITION`] for
    /// zero weights).
    #[must_use]
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Exponent of the front level's upper bound, or `None` when there
    /// are no levels.
    #[must_use]
    pub const fn max_log2_upper(&self) -> Option<i32> {
        self.max_log2_upper
    }

    /// The weight at `index`.
    ///
    /// # Errors
    ///
    /// [`SamplerError::IndexOutOfRange`] outside `[0, len)`.
    pub fn get(&self, index: usize) -> Result<f64, SamplerError> {
        self.weights
            .get(index)
            .copied()
            .ok_or(SamplerError::IndexOutOfRange {
                index,
                len: self.weights.len(),
            })
    }

    /// The level a positive weight would currently file into, if the
    /// covered range includes it.
    #[must_use]
    pub fn level_for_weight(&self, weight: f64) -> Option<&Level> {
        self.level_offset(weight).map(|offset| &self.levels[offset])
    }

    /// The level with exactly the bounds `(lo, 2·lo)`, if present.
    #[must_use]
    pub fn level_with_bounds(&self, lo: f64) -> Option<&Level> {
        self.level_for_weight(lo)
            .filter(|level| level.bounds().0 == lo)
    }

    // -------------------------------------------------------------------------
    // Mutators
    // -------------------------------------------------------------------------

    /// Replace the weight at `index`, returning the signed change
    /// `new − old`.
    ///
    /// Relocation between levels removes from the source level, writes
    /// the weight, adds to the destination level (extending the level
    /// sequence first when the destination exponent lies outside the
    /// covered range), and bumps the running total exactly once by the
    /// delta. A write that keeps the element in its current level takes
    /// the same remove-then-add path, so `(max, num_max)` stay exact in
    /// every case, including a decrease away from a tied maximum.
    ///
    /// # Errors
    ///
    /// [`SamplerError::IndexOutOfRange`], [`SamplerError::NegativeWeight`],
    /// or [`SamplerError::NonFiniteWeight`]; the table is unchanged on
    /// error.
    pub fn set(&mut self, index: usize, weight: f64) -> Result<f64, SamplerError> {
        if index >= self.weights.len() {
            return Err(SamplerError::IndexOutOfRange {
                index,
                len: self.weights.len(),
            });
        }
        validate_weight(weight)?;

        let old = self.weights[index];
        let delta = weight - old;
        match (old > 0.0, weight > 0.0) {
            (false, false) => {
                self.weights[index] = weight;
            }
            (true, true) => {
                let Some(src) = self.level_offset(old) else {
                    unreachable!("positive weight {old} not covered by any level");
                };
                self.levels[src].remove(index, &self.weights, &mut self.positions);
                self.weights[index] = weight;
                self.place(index);
                self.sum += delta;
                self.trim_if_ragged();
            }
            (false, true) => {
                self.weights[index] = weight;
                self.place(index);
                self.sum += weight;
            }
            (true, false) => {
                let Some(src) = self.level_offset(old) else {
                    unreachable!("positive weight {old} not covered by any level");
                };
                self.levels[src].remove(index, &self.weights, &mut self.positions);
                self.weights[index] = weight;
                self.sum -= old;
                self.trim_if_ragged();
            }
        }
        Ok(delta)
    }

    /// Append a new element, returning its index.
    ///
    /// # Errors
    ///
    /// [`SamplerError::NegativeWeight`] or
    /// [`SamplerError::NonFiniteWeight`]; nothing is appended on error.
    pub fn append(&mut self, weight: f64) -> Result<usize, SamplerError> {
        validate_weight(weight)?;
        let index = self.weights.len();
        self.weights.push(weight);
        if weight > 0.0 {
            self.place(index);
            self.sum += weight;
        } else {
            self.positions.push(NO_POSITION);
        }
        Ok(index)
    }

    /// Delete the element at `index`, shifting every later index down by
    /// one. Returns the new length.
    ///
    /// The shift renumbers member entries in every level, so the walk is
    /// O(n) overall.
    ///
    /// # Errors
    ///
    /// [`SamplerError::IndexOutOfRange`]; the table is unchanged on
    /// error.
    pub fn delete_at(&mut self, index: usize) -> Result<usize, SamplerError> {
        if index >= self.weights.len() {
            return Err(SamplerError::IndexOutOfRange {
                index,
                len: self.weights.len(),
            });
        }

        let old = self.weights[index];
        if old > 0.0 {
            let Some(src) = self.level_offset(old) else {
                unreachable!("positive weight {old} not covered by any level");
            };
            self.levels[src].remove(index, &self.weights, &mut self.positions);
            self.sum -= old;
        }
        self.weights.remove(index);
        self.positions.remove(index);
        for level in &mut self.levels {
            level.shift_indices_above(index);
        }
        self.trim_if_ragged();
        Ok(self.weights.len())
    }

    /// Remove every element, leaving an empty table.
    pub fn clear(&mut self) {
        self.weights.clear();
        self.positions.clear();
        self.levels.clear();
        self.sum = 0.0;
        self.max_log2_upper = None;
    }

    /// Recompute every level sum and the running total from the weights.
    ///
    /// Long mutation sequences accumulate rounding drift in the running
    /// sums; this resets them to one rounding error per addition.
    pub fn refresh_sums(&mut self) {
        let mut total = 0.0;
        for level in &mut self.levels {
            total += level.refresh_sum(&self.weights);
        }
        self.sum = total;
    }

    // -------------------------------------------------------------------------
    // Level maintenance
    // -------------------------------------------------------------------------

    /// Offset into `levels` where a positive weight belongs, or `None`
    /// when the weight is zero, there are no levels, or its exponent
    /// falls outside the covered range.
    fn level_offset(&self, weight: f64) -> Option<usize> {
        let upper = self.max_log2_upper?;
        if weight <= 0.0 {
            return None;
        }
        let offset = i64::from(upper) - 1 - i64::from(floor_log2(weight));
        if (0..self.levels.len() as i64).contains(&offset) {
            Some(offset as usize)
        } else {
            None
        }
    }

    /// File element `index` (whose weight is already written) into its
    /// level, extending the level sequence first when needed.
    fn place(&mut self, index: usize) {
        let weight = self.weights[index];
        if self.level_offset(weight).is_none() {
            let (lo, hi) = log_bounds(weight);
            self.extend_levels(lo, hi);
        }
        let Some(dst) = self.level_offset(weight) else {
            unreachable!("extension must cover weight {weight}");
        };
        self.levels[dst].add(index, &self.weights, &mut self.positions);
    }

    /// Grow the level sequence so the interval `[lo, hi)` is present.
    ///
    /// Creates the initial level when the sequence is empty; otherwise
    /// prepends or appends the run of empty levels between the current
    /// front or back and the target. The target interval must not
    /// already lie inside the covered exponent range.
    fn extend_levels(&mut self, lo: f64, hi: f64) {
        assert!(
            lo > 0.0 && hi == 2.0 * lo,
            "level bounds must satisfy hi = 2*lo, got [{lo}, {hi})"
        );
        let target_exp = floor_log2(lo);

        let Some(upper) = self.max_log2_upper else {
            self.levels.push(Level::new(lo));
            self.max_log2_upper = Some(target_exp + 1);
            return;
        };

        let front_exp = upper - 1;
        let back_exp = upper - self.levels.len() as i32;
        if target_exp > front_exp {
            for exp in front_exp + 1..=target_exp {
                self.levels.insert(0, Level::with_exponent(exp));
            }
            self.max_log2_upper = Some(target_exp + 1);
        } else if target_exp < back_exp {
            for exp in (target_exp..back_exp).rev() {
                self.levels.push(Level::with_exponent(exp));
            }
        } else {
            unreachable!("level [{lo}, {hi}) is already present");
        }
    }

    /// Trim empty leading and trailing levels when a removal has left
    /// the front or back unpopulated.
    fn trim_if_ragged(&mut self) {
        let ragged = self.levels.first().is_some_and(|l| !l.is_populated())
            || self.levels.last().is_some_and(|l| !l.is_populated());
        if ragged {
            self.trim_levels();
        }
    }

    /// Slice the level sequence to the inclusive span of populated
    /// levels, keeping interior empties. Clears everything when no level
    /// is populated.
    fn trim_levels(&mut self) {
        let first = self.levels.iter().position(|l| l.is_populated());
        let last = self.levels.iter().rposition(|l| l.is_populated());
        let (Some(first), Some(last)) = (first, last) else {
            self.levels.clear();
            self.max_log2_upper = None;
            return;
        };
        self.levels.truncate(last + 1);
        self.levels.drain(..first);
        if let Some(upper) = self.max_log2_upper {
            self.max_log2_upper = Some(upper - first as i32);
        }
    }
}

/// Reject negative, NaN, and infinite weights before any state change.
fn validate_weight(weight: f64) -> Result<(), SamplerError> {
    if weight < 0.0 {
        return Err(SamplerError::NegativeWeight(weight));
    }
    if !weight.is_finite() {
        return Err(SamplerError::NonFiniteWeight(weight));
    }
    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::core::check_consistency;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Set(usize, f64),
        Append(f64),
        Delete(usize),
    }

    fn weight_strategy() -> impl Strategy<Value = f64> {
        prop_oneof![
            2 => Just(0.0),
            8 => 0.001_f64..100.0,
        ]
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<usize>(), weight_strategy()).prop_map(|(i, w)| Op::Set(i, w)),
            weight_strategy().prop_map(Op::Append),
            any::<usize>().prop_map(Op::Delete),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn table_stays_consistent_under_random_ops(
            initial in proptest::collection::vec(weight_strategy(), 0..20),
            ops in proptest::collection::vec(op_strategy(), 0..40),
        ) {
            let mut table = LevelTable::new(initial).unwrap();
            for op in ops {
                match op {
                    Op::Set(i, w) if table.len() > 0 => {
                        table.set(i % table.len(), w).unwrap();
                    }
                    Op::Append(w) => {
                        table.append(w).unwrap();
                    }
                    Op::Delete(i) if table.len() > 0 => {
                        table.delete_at(i % table.len()).unwrap();
                    }
                    _ => {}
                }
                let problems = check_consistency(&table);
                prop_assert!(problems.is_empty(), "inconsistencies: {problems:?}");
            }
        }

        #[test]
        fn running_total_tracks_weights(
            initial in proptest::collection::vec(weight_strategy(), 1..20),
            updates in proptest::collection::vec((any::<usize>(), weight_strategy()), 1..60),
        ) {
            let mut table = LevelTable::new(initial).unwrap();
            for (i, w) in updates {
                table.set(i % table.len(), w).unwrap();
            }
            let true_sum: f64 = table.weights().iter().sum();
            let tolerance = 1e-9 * true_sum.abs().max(1.0);
            prop_assert!((table.total_weight() - true_sum).abs() < tolerance);
        }
    }
}
