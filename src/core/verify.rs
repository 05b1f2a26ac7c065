//! Structural consistency checks for a [`LevelTable`].
//!
//! The checker recomputes every derived quantity from the weights vector
//! and reports each disagreement as a human-readable string; an empty
//! report means the table is consistent. The test suite runs it after
//! every mutation, and it is cheap enough to call from application code
//! when chasing a suspected bookkeeping bug.

use crate::core::{lower_pow2, pow2, LevelTable, NO_POSITION};

/// Relative tolerance for comparing running sums against recomputed
/// values.
const SUM_TOLERANCE: f64 = 1e-9;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < SUM_TOLERANCE * b.abs().max(1.0)
}

/// Check every structural invariant of `table`, returning one message
/// per inconsistency found. An empty vector means the table is
/// consistent.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn check_consistency(table: &LevelTable) -> Vec<String> {
    let mut problems = Vec::new();
    let weights = table.weights();
    let positions = table.positions();
    let levels = table.levels();

    if weights.len() != positions.len() {
        problems.push(format!(
            "weights length {} differs from positions length {}",
            weights.len(),
            positions.len()
        ));
        return problems;
    }

    // Level geometry: valid power-of-two bounds, descending and
    // contiguous by exponent.
    for (offset, level) in levels.iter().enumerate() {
        let (lo, hi) = level.bounds();
        if lo <= 0.0 || lower_pow2(lo) != lo {
            problems.push(format!("level {offset}: lower bound {lo} is not a power of two"));
        }
        if hi != 2.0 * lo {
            problems.push(format!("level {offset}: bounds [{lo}, {hi}) are not an octave"));
        }
        if offset + 1 < levels.len() {
            let (next_lo, _) = levels[offset + 1].bounds();
            if lo != 2.0 * next_lo {
                problems.push(format!(
                    "levels {offset} and {} are not contiguous: lo {lo} vs {next_lo}",
                    offset + 1
                ));
            }
        }
    }

    match table.max_log2_upper() {
        None => {
            if !levels.is_empty() {
                problems.push("upper exponent unset while levels exist".to_string());
            }
        }
        Some(upper) => match levels.first() {
            None => problems.push(format!(
                "upper exponent {upper} set while no levels exist"
            )),
            Some(front) => {
                if front.bounds().0 != pow2(upper - 1) {
                    problems.push(format!(
                        "upper exponent {upper} disagrees with front bounds {:?}",
                        front.bounds()
                    ));
                }
            }
        },
    }

    if let (Some(front), Some(back)) = (levels.first(), levels.last()) {
        if !front.is_populated() {
            problems.push("front level is empty".to_string());
        }
        if !back.is_populated() {
            problems.push("back level is empty".to_string());
        }
    }

    // Element placement: zero weights nowhere, positive weights in
    // exactly one level at the recorded offset.
    for (index, &w) in weights.iter().enumerate() {
        let appearances: usize = levels
            .iter()
            .map(|l| l.members().iter().filter(|&&m| m == index).count())
            .sum();
        if w == 0.0 {
            if positions[index] != NO_POSITION {
                problems.push(format!(
                    "zero-weight element {index} has position {}",
                    positions[index]
                ));
            }
            if appearances != 0 {
                problems.push(format!(
                    "zero-weight element {index} appears in {appearances} level(s)"
                ));
            }
        } else {
            if appearances != 1 {
                problems.push(format!(
                    "element {index} appears in {appearances} level(s), expected 1"
                ));
                continue;
            }
            let Some(level) = levels.iter().find(|l| l.members().contains(&index)) else {
                continue;
            };
            if !level.contains(w) {
                problems.push(format!(
                    "element {index} weight {w} outside its level bounds {:?}",
                    level.bounds()
                ));
            }
            let offset = positions[index];
            if level.members().get(offset) != Some(&index) {
                problems.push(format!(
                    "element {index} recorded at offset {offset}, member list disagrees"
                ));
            }
        }
    }

    // Per-level derived values.
    let mut level_sum_total = 0.0;
    for (offset, level) in levels.iter().enumerate() {
        let true_sum: f64 = level.members().iter().map(|&m| weights[m]).sum();
        let true_max = level
            .members()
            .iter()
            .map(|&m| weights[m])
            .fold(0.0_f64, f64::max);
        let true_num_max = level
            .members()
            .iter()
            .filter(|&&m| weights[m] == true_max && true_max > 0.0)
            .count();

        if !close(level.sum(), true_sum) {
            problems.push(format!(
                "level {offset}: running sum {} but members sum to {true_sum}",
                level.sum()
            ));
        }
        if level.max_weight() != true_max {
            problems.push(format!(
                "level {offset}: max {} but members max is {true_max}",
                level.max_weight()
            ));
        }
        if level.num_max() != true_num_max {
            problems.push(format!(
                "level {offset}: num_max {} but {true_num_max} member(s) tie the max",
                level.num_max()
            ));
        }
        level_sum_total += level.sum();
    }

    // Table total against both the level sums and the raw weights.
    if !close(table.total_weight(), level_sum_total) {
        problems.push(format!(
            "table total {} but level sums total {level_sum_total}",
            table.total_weight()
        ));
    }
    let weight_total: f64 = weights.iter().sum();
    if !close(table.total_weight(), weight_total) {
        problems.push(format!(
            "table total {} but weights sum to {weight_total}",
            table.total_weight()
        ));
    }

    problems
}
