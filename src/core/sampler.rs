//! Drawing algorithm for the leveled sampler.
//!
//! A draw proceeds in two stages:
//!
//! 1. Pick a level with probability proportional to its weight sum by
//!    scanning the cumulative sums against a scaled uniform draw.
//! 2. Inside the chosen level, pick a uniformly random member and accept
//!    it with probability `weight / level.max`, repeating on rejection.
//!
//! Stage 1 costs one pass over the levels, i.e. `⌈log2 d⌉ + 1` steps for
//! dynamic range d. Stage 2 accepts with probability above one half per
//! round because all member weights lie within a factor of two of the
//! level maximum, so the expected number of rounds is below two.
//!
//! The fractional residue of the stage-1 draw is uniform on [0, 1)
//! conditional on the level choice, so it serves as the first
//! acceptance uniform without touching the generator again.

use rand::Rng;

use crate::core::{LevelTable, SamplerError};

/// Draw one element index with probability proportional to its weight.
///
/// # Errors
///
/// [`SamplerError::EmptyDistribution`] when no element has positive
/// weight.
pub fn sample<R: Rng>(table: &LevelTable, rng: &mut R) -> Result<usize, SamplerError> {
    if table.levels().is_empty() {
        return Err(SamplerError::EmptyDistribution);
    }

    let total = table.total_weight();
    let target = rng.gen::<f64>() * total;

    // Stage 1: cumulative scan, largest bounds first. Empty interior
    // levels contribute zero and never terminate the walk.
    let mut cumulative = 0.0;
    let mut chosen = None;
    for level in table.levels() {
        cumulative += level.sum();
        if cumulative > target {
            chosen = Some((level, cumulative));
            break;
        }
    }
    // Rounding can exhaust the walk with target at the very top of the
    // range; fall back to the last populated level.
    let (level, cumulative) = match chosen {
        Some(pair) => pair,
        None => {
            let level = table
                .levels()
                .iter()
                .rev()
                .find(|l| l.is_populated())
                .ok_or(SamplerError::EmptyDistribution)?;
            (level, total)
        }
    };

    // Conditional residue of the stage-1 draw, uniform on [0, 1) given
    // the chosen level.
    let span = level.sum();
    let mut r = (target - (cumulative - span)) / span;
    if !(0.0..1.0).contains(&r) {
        r = rng.gen();
    }

    // Stage 2: acceptance-rejection among the level's members.
    let members = level.members();
    let max = level.max_weight();
    loop {
        let candidate = members[rng.gen_range(0..members.len())];
        if table.weights()[candidate] > r * max {
            return Ok(candidate);
        }
        r = rng.gen();
    }
}

/// Draw `n` element indices with replacement.
///
/// # Errors
///
/// [`SamplerError::EmptyDistribution`] when no element has positive
/// weight.
pub fn sample_n<R: Rng>(
    table: &LevelTable,
    n: usize,
    rng: &mut R,
) -> Result<Vec<usize>, SamplerError> {
    (0..n).map(|_| sample(table, rng)).collect()
}
