//! Chi-squared goodness-of-fit machinery for distribution testing.
//!
//! Used by [`crate::WeightedSampler::test_distribution`] and the test
//! suite to check that observed draw counts match the expected
//! multinomial `w_i / Σw`. The survival function is evaluated through
//! the regularized incomplete gamma function: a power series for small
//! arguments and a Lentz continued fraction otherwise, with ln Γ by the
//! Lanczos approximation.

/// Iteration cap for the series and continued-fraction evaluations.
const MAX_ITERATIONS: usize = 200;

/// Relative convergence threshold.
const EPSILON: f64 = 1e-14;

/// Smallest magnitude admitted into the Lentz recurrence.
const TINY: f64 = 1e-300;

/// Result of a chi-squared goodness-of-fit test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquaredResult {
    /// The chi-squared statistic Σ (observed − expected)² / expected.
    pub chi_squared: f64,
    /// Degrees of freedom (number of categories − 1).
    pub degrees_of_freedom: usize,
    /// Probability of observing a statistic at least this extreme under
    /// the null hypothesis.
    pub p_value: f64,
    /// Number of samples the observed counts were drawn from.
    pub num_samples: usize,
}

impl ChiSquaredResult {
    /// Whether the test fails to reject the null hypothesis at
    /// significance level `alpha`.
    #[must_use]
    pub fn passes(&self, alpha: f64) -> bool {
        self.p_value > alpha
    }
}

/// Run a chi-squared test of observed counts against expected
/// frequencies proportional to `weights`.
///
/// Categories are compared against `weights[i] / Σweights · num_samples`.
/// Fewer than two categories, a non-positive weight total, or zero
/// samples yield the degenerate passing result.
#[must_use]
pub fn chi_squared_from_counts(
    observed: &[usize],
    weights: &[f64],
    num_samples: usize,
) -> ChiSquaredResult {
    debug_assert_eq!(observed.len(), weights.len());

    let total_weight: f64 = weights.iter().sum();
    if observed.len() < 2 || total_weight <= 0.0 || num_samples == 0 {
        return ChiSquaredResult {
            chi_squared: 0.0,
            degrees_of_freedom: 0,
            p_value: 1.0,
            num_samples,
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let n = num_samples as f64;
    let mut chi_squared = 0.0;
    for (&obs, &w) in observed.iter().zip(weights) {
        let expected = w / total_weight * n;
        if expected > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let diff = obs as f64 - expected;
            chi_squared += diff * diff / expected;
        }
    }

    let degrees_of_freedom = observed.len() - 1;
    let p_value = chi_squared_sf(chi_squared, degrees_of_freedom);
    ChiSquaredResult {
        chi_squared,
        degrees_of_freedom,
        p_value,
        num_samples,
    }
}

/// Survival function of the chi-squared distribution with `df` degrees
/// of freedom: `P(X ≥ x)`.
#[must_use]
pub fn chi_squared_sf(x: f64, df: usize) -> f64 {
    if df == 0 || x <= 0.0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let a = df as f64 / 2.0;
    regularized_gamma_upper(a, x / 2.0)
}

/// Regularized upper incomplete gamma function Q(a, x).
fn regularized_gamma_upper(a: f64, x: f64) -> f64 {
    debug_assert!(a > 0.0 && x >= 0.0);
    if x == 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        1.0 - lower_gamma_series(a, x)
    } else {
        upper_gamma_continued_fraction(a, x)
    }
}

/// P(a, x) by its power series; converges quickly for x < a + 1.
fn lower_gamma_series(a: f64, x: f64) -> f64 {
    let mut term_denominator = a;
    let mut term = 1.0 / a;
    let mut sum = term;
    for _ in 0..MAX_ITERATIONS {
        term_denominator += 1.0;
        term *= x / term_denominator;
        sum += term;
        if term.abs() < sum.abs() * EPSILON {
            break;
        }
    }
    sum * (a * x.ln() - x - ln_gamma(a)).exp()
}

/// Q(a, x) by the Lentz continued fraction; converges for x ≥ a + 1.
fn upper_gamma_continued_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=MAX_ITERATIONS {
        #[allow(clippy::cast_precision_loss)]
        let i = i as f64;
        let numerator = -i * (i - a);
        b += 2.0;
        d = numerator * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + numerator / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    (a * x.ln() - x - ln_gamma(a)).exp() * h
}

/// Lanczos approximation of ln Γ(x); relative error below 2e-10 for
/// positive x.
fn ln_gamma(x: f64) -> f64 {
    #[allow(clippy::excessive_precision)]
    const COEFFICIENTS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    const G: f64 = 7.0;

    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS[1..].iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let i = i as f64;
        sum += c / (x + i + 1.0);
    }

    let t = x + G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}
