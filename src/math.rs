//! Special functions and combinatorics used by the model priors.
//!
//! Everything here works in log space; the counts involved (Bell numbers,
//! subset counts) overflow `f64` quickly once the number of comparisons
//! grows past a few dozen.

use std::f64::consts::{LN_2, PI};

use crate::error::{McmcError, Result};

/// Natural log of the gamma function (Lanczos approximation, g = 7).
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    if x < 0.5 {
        (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut ag = 0.99999999999980993_f64;
        for (i, &c) in COEFFS.iter().enumerate() {
            ag += c / (x + i as f64 + 1.0);
        }
        let t = x + 7.5;
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + ag.ln()
    }
}

/// Numerically stable `ln(exp(a) + exp(b))`.
pub fn ln_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Table of `ln S(n, k)` for `k` in `0..=n` (Stirling numbers of the second kind).
pub fn ln_stirling2_row(n: usize) -> Vec<f64> {
    let mut row = vec![f64::NEG_INFINITY; n + 1];
    row[0] = 0.0;
    for m in 1..=n {
        // walk k downwards so row[k - 1] still holds S(m - 1, k - 1)
        for k in (1..=m).rev() {
            let stay = if k < m {
                (k as f64).ln() + row[k]
            } else {
                f64::NEG_INFINITY
            };
            row[k] = ln_add_exp(stay, row[k - 1]);
        }
        row[0] = f64::NEG_INFINITY;
    }
    row
}

/// Table of `ln c(n, k)` for `k` in `0..=n` (unsigned Stirling numbers of
/// the first kind: permutations of `n` items with `k` cycles).
pub fn ln_stirling1_row(n: usize) -> Vec<f64> {
    let mut row = vec![f64::NEG_INFINITY; n + 1];
    row[0] = 0.0;
    for m in 1..=n {
        // c(m, k) = (m - 1) c(m - 1, k) + c(m - 1, k - 1)
        for k in (1..=m).rev() {
            let stay = if k < m {
                ((m - 1) as f64).ln() + row[k]
            } else {
                f64::NEG_INFINITY
            };
            row[k] = ln_add_exp(stay, row[k - 1]);
        }
        row[0] = f64::NEG_INFINITY;
    }
    row
}

/// `ln S(n, k)`: the number of ways to partition `n` items into `k` non-empty blocks.
pub fn ln_stirling2(n: usize, k: usize) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_stirling2_row(n)[k]
}

/// `ln B(n)`: the number of partitions of `n` items.
pub fn ln_bell(n: usize) -> f64 {
    ln_stirling2_row(n)
        .into_iter()
        .fold(f64::NEG_INFINITY, ln_add_exp)
}

/// `ln(2^n - 2)`, the number of ordered, non-trivial two-block splits of `n` items.
pub fn ln_ordered_splits(n: usize) -> f64 {
    if n < 2 {
        return f64::NEG_INFINITY;
    }
    (n as f64) * LN_2 + (-(2.0_f64).powi(1 - n as i32)).ln_1p()
}

/// Log probability of a partition with block sizes `multiplicities` under a
/// Chinese restaurant process with concentration `alpha`.
pub fn crp_ln_probability(multiplicities: &[usize], alpha: f64) -> f64 {
    let n: usize = multiplicities.iter().sum();
    let k = multiplicities.len() as f64;
    let blocks: f64 = multiplicities
        .iter()
        .map(|&size| ln_gamma(size as f64))
        .sum();
    k * alpha.ln() + blocks + ln_gamma(alpha) - ln_gamma(alpha + n as f64)
}

/// Converts log weights into probabilities that sum to one.
///
/// The maximum is subtracted before exponentiating so very negative
/// log-likelihoods do not underflow to an all-zero vector.
pub fn normalize_log_weights(ln_weights: &[f64]) -> Vec<f64> {
    let max = ln_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = ln_weights.iter().map(|&w| (w - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Expected number of occupied categories of a Dirichlet process with
/// concentration `alpha` over `n` elements.
pub fn dp_expected_categories(alpha: f64, n: usize) -> f64 {
    (0..n).map(|i| alpha / (alpha + i as f64)).sum()
}

/// Probability of `k` occupied categories, for `k` in `1..=n` (index
/// `k - 1`), of a Dirichlet process with concentration `alpha` over `n`
/// elements: `c(n, k) alpha^k / (alpha (alpha + 1) ... (alpha + n - 1))`.
pub fn dp_category_count_probabilities(alpha: f64, n: usize) -> Vec<f64> {
    let row = ln_stirling1_row(n);
    let ln_rising = ln_gamma(alpha + n as f64) - ln_gamma(alpha);
    (1..=n)
        .map(|k| (row[k] + k as f64 * alpha.ln() - ln_rising).exp())
        .collect()
}

/// [`dp_category_count_probabilities`] averaged over `samples` draws of the
/// concentration from `draw_alpha`.
pub fn dp_mixed_category_count_probabilities(
    mut draw_alpha: impl FnMut() -> f64,
    n: usize,
    samples: usize,
) -> Vec<f64> {
    let mut totals = vec![0.0; n];
    for _ in 0..samples {
        let probs = dp_category_count_probabilities(draw_alpha(), n);
        for (total, p) in totals.iter_mut().zip(probs) {
            *total += p;
        }
    }
    totals.into_iter().map(|t| t / samples.max(1) as f64).collect()
}

/// Finds the concentration whose expected number of categories over `n`
/// elements equals `expected`. Bisection on `ln(alpha)`.
pub fn dp_concentration_for_expected_categories(expected: f64, n: usize) -> Result<f64> {
    if n < 2 || !(expected > 1.0 && expected < n as f64) {
        return Err(McmcError::config(format!(
            "expected number of categories must lie strictly between 1 and {n}, got {expected}"
        )));
    }
    let (mut lo, mut hi) = ((1e-10_f64).ln(), (1e10_f64).ln());
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if dp_expected_categories(mid.exp(), n) < expected {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    Ok((0.5 * (lo + hi)).exp())
}
