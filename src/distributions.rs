/*!
Prior distributions for the model parameters and a small categorical
distribution used to pick operators.

Continuous priors are a closed set: gamma (exponential is gamma with shape 1),
beta and uniform. Each one knows its log density, its support, its first two
moments and how to draw from a [`RandomStream`].

# Examples

```rust
use popdiv_mcmc::distributions::ContinuousDistribution;
use popdiv_mcmc::rng::RandomStream;

let prior = ContinuousDistribution::gamma(10.0, 0.1).unwrap();
assert!((prior.mean() - 1.0).abs() < 1e-12);

let mut rng = RandomStream::new(42);
let x = prior.draw(&mut rng);
assert!(prior.ln_pdf(x).is_finite());
```
*/

use std::fmt;

use rand_distr::{Beta, Gamma};

use crate::error::{McmcError, Result};
use crate::math::ln_gamma;
use crate::rng::RandomStream;

/// A trait for discrete distributions whose state is represented as an index.
pub trait DiscreteDistribution {
    /// Samples an index from the distribution.
    fn sample(&self, rng: &mut RandomStream) -> usize;
    /// Evaluates the log-probability of the given index.
    fn log_prob(&self, index: usize) -> f64;
}

/// A prior over a scalar parameter.
#[derive(Debug, Clone)]
pub enum ContinuousDistribution {
    Gamma {
        shape: f64,
        scale: f64,
        sampler: Gamma<f64>,
    },
    Beta {
        alpha: f64,
        beta: f64,
        sampler: Beta<f64>,
    },
    Uniform {
        min: f64,
        max: f64,
    },
}

fn positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(McmcError::config(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

impl ContinuousDistribution {
    /// Gamma distribution with the given shape and scale (mean `shape * scale`).
    pub fn gamma(shape: f64, scale: f64) -> Result<Self> {
        let shape = positive("gamma shape", shape)?;
        let scale = positive("gamma scale", scale)?;
        let sampler = Gamma::new(shape, scale)
            .map_err(|e| McmcError::config(format!("invalid gamma distribution: {e}")))?;
        Ok(ContinuousDistribution::Gamma {
            shape,
            scale,
            sampler,
        })
    }

    /// Exponential distribution with the given rate, stored as gamma(1, 1/rate).
    pub fn exponential(rate: f64) -> Result<Self> {
        let rate = positive("exponential rate", rate)?;
        Self::gamma(1.0, 1.0 / rate)
    }

    pub fn beta(alpha: f64, beta: f64) -> Result<Self> {
        let alpha = positive("beta alpha", alpha)?;
        let beta = positive("beta beta", beta)?;
        let sampler = Beta::new(alpha, beta)
            .map_err(|e| McmcError::config(format!("invalid beta distribution: {e}")))?;
        Ok(ContinuousDistribution::Beta {
            alpha,
            beta,
            sampler,
        })
    }

    pub fn uniform(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(McmcError::config(format!(
                "uniform distribution needs finite min < max, got [{min}, {max}]"
            )));
        }
        Ok(ContinuousDistribution::Uniform { min, max })
    }

    /// Log density at `x`; `-inf` outside the support.
    pub fn ln_pdf(&self, x: f64) -> f64 {
        match *self {
            ContinuousDistribution::Gamma { shape, scale, .. } => {
                if x <= 0.0 {
                    return f64::NEG_INFINITY;
                }
                (shape - 1.0) * x.ln() - x / scale - ln_gamma(shape) - shape * scale.ln()
            }
            ContinuousDistribution::Beta { alpha, beta, .. } => {
                if !(0.0..=1.0).contains(&x) {
                    return f64::NEG_INFINITY;
                }
                let lhs = if alpha == 1.0 { 0.0 } else { (alpha - 1.0) * x.ln() };
                let rhs = if beta == 1.0 {
                    0.0
                } else {
                    (beta - 1.0) * (1.0 - x).ln()
                };
                lhs + rhs + ln_gamma(alpha + beta) - ln_gamma(alpha) - ln_gamma(beta)
            }
            ContinuousDistribution::Uniform { min, max } => {
                if (min..=max).contains(&x) {
                    -(max - min).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    pub fn draw(&self, rng: &mut RandomStream) -> f64 {
        match self {
            ContinuousDistribution::Gamma { sampler, .. } => rng.sample(sampler),
            ContinuousDistribution::Beta { sampler, .. } => rng.sample(sampler),
            ContinuousDistribution::Uniform { min, max } => rng.uniform_range(*min, *max),
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            ContinuousDistribution::Gamma { shape, scale, .. } => shape * scale,
            ContinuousDistribution::Beta { alpha, beta, .. } => alpha / (alpha + beta),
            ContinuousDistribution::Uniform { min, max } => 0.5 * (min + max),
        }
    }

    pub fn variance(&self) -> f64 {
        match *self {
            ContinuousDistribution::Gamma { shape, scale, .. } => shape * scale * scale,
            ContinuousDistribution::Beta { alpha, beta, .. } => {
                let total = alpha + beta;
                alpha * beta / (total * total * (total + 1.0))
            }
            ContinuousDistribution::Uniform { min, max } => (max - min).powi(2) / 12.0,
        }
    }

    /// Closed bounds of the support, used to reflect window moves.
    pub fn support(&self) -> (f64, f64) {
        match *self {
            ContinuousDistribution::Gamma { .. } => (0.0, f64::INFINITY),
            ContinuousDistribution::Beta { .. } => (0.0, 1.0),
            ContinuousDistribution::Uniform { min, max } => (min, max),
        }
    }

    /// True for priors whose support is the positive half-line.
    pub fn is_positive(&self) -> bool {
        matches!(self, ContinuousDistribution::Gamma { .. })
    }

    /// True for priors whose support lies inside `[0, 1]`.
    pub fn is_unit_interval(&self) -> bool {
        let (lo, hi) = self.support();
        lo >= 0.0 && hi <= 1.0
    }
}

impl fmt::Display for ContinuousDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContinuousDistribution::Gamma { shape, scale, .. } => {
                write!(f, "gamma(shape = {shape}, scale = {scale})")
            }
            ContinuousDistribution::Beta { alpha, beta, .. } => {
                write!(f, "beta(alpha = {alpha}, beta = {beta})")
            }
            ContinuousDistribution::Uniform { min, max } => write!(f, "uniform({min}, {max})"),
        }
    }
}

/**
A categorical distribution over `0..probs.len()`.

The probabilities are normalized on construction. Sampling walks the
cumulative probabilities and returns the first index whose cumulative value
is at least the uniform draw.

# Examples

```rust
use popdiv_mcmc::distributions::{Categorical, DiscreteDistribution};
use popdiv_mcmc::rng::RandomStream;

let cat = Categorical::new(&[0.2, 0.3, 0.5]).unwrap();
let mut rng = RandomStream::new(3);
let index = cat.sample(&mut rng);
assert!(index < 3);
assert!((cat.log_prob(2) - 0.5_f64.ln()).abs() < 1e-12);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    pub probs: Vec<f64>,
    cumulative: Vec<f64>,
}

impl Categorical {
    /// Creates a new categorical distribution from non-negative weights.
    pub fn new(weights: &[f64]) -> Result<Self> {
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(McmcError::config(format!(
                "categorical weights must be finite and non-negative, got {weights:?}"
            )));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(McmcError::config("categorical weights sum to zero"));
        }
        let probs: Vec<f64> = weights.iter().map(|w| w / total).collect();
        let cumulative = probs
            .iter()
            .scan(0.0, |acc, p| {
                *acc += p;
                Some(*acc)
            })
            .collect();
        Ok(Self { probs, cumulative })
    }
}

impl DiscreteDistribution for Categorical {
    fn sample(&self, rng: &mut RandomStream) -> usize {
        let u = rng.uniform();
        self.cumulative
            .iter()
            .zip(&self.probs)
            .position(|(&c, &p)| u <= c && p > 0.0)
            .unwrap_or_else(|| self.probs.iter().rposition(|&p| p > 0.0).unwrap_or(0))
    }

    fn log_prob(&self, index: usize) -> f64 {
        self.probs
            .get(index)
            .map_or(f64::NEG_INFINITY, |p| p.ln())
    }
}

#[cfg(test)]
mod distributions_tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn gamma_ln_pdf_matches_closed_form() {
        let g = ContinuousDistribution::gamma(2.0, 0.5).unwrap();
        // x * exp(-x / 0.5) / (Gamma(2) * 0.5^2)
        let x: f64 = 0.7;
        let expected = (x * (-x / 0.5).exp() / 0.25).ln();
        assert_abs_diff_eq!(g.ln_pdf(x), expected, epsilon = 1e-10);
        assert_eq!(g.ln_pdf(0.0), f64::NEG_INFINITY);
        assert_eq!(g.ln_pdf(-1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn exponential_is_gamma_with_unit_shape() {
        let e = ContinuousDistribution::exponential(4.0).unwrap();
        assert_abs_diff_eq!(e.mean(), 0.25);
        assert_abs_diff_eq!(e.ln_pdf(0.5), 4.0_f64.ln() - 2.0, epsilon = 1e-10);
    }

    #[test]
    fn beta_ln_pdf_and_edges() {
        let b = ContinuousDistribution::beta(2.0, 3.0).unwrap();
        // 12 x (1 - x)^2
        let x: f64 = 0.3;
        assert_abs_diff_eq!(b.ln_pdf(x), (12.0 * x * 0.49).ln(), epsilon = 1e-10);
        let flat = ContinuousDistribution::beta(1.0, 1.0).unwrap();
        assert_abs_diff_eq!(flat.ln_pdf(0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(flat.ln_pdf(1.0), 0.0, epsilon = 1e-12);
        assert_eq!(b.ln_pdf(1.2), f64::NEG_INFINITY);
    }

    #[test]
    fn invalid_parameters_are_config_errors() {
        assert!(ContinuousDistribution::gamma(0.0, 1.0).is_err());
        assert!(ContinuousDistribution::gamma(1.0, f64::NAN).is_err());
        assert!(ContinuousDistribution::beta(-1.0, 1.0).is_err());
        assert!(ContinuousDistribution::uniform(1.0, 1.0).is_err());
        assert!(Categorical::new(&[0.0, 0.0]).is_err());
        assert!(Categorical::new(&[1.0, -1.0]).is_err());
    }

    #[test]
    fn draws_match_moments() {
        let mut rng = RandomStream::new(42);
        let g = ContinuousDistribution::gamma(10.0, 0.1).unwrap();
        let n = 50_000;
        let xs: Vec<f64> = (0..n).map(|_| g.draw(&mut rng)).collect();
        let mean = xs.iter().sum::<f64>() / n as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        assert_abs_diff_eq!(mean, g.mean(), epsilon = 0.01);
        assert_abs_diff_eq!(var, g.variance(), epsilon = 0.005);
    }

    #[test]
    fn categorical_skips_zero_weights() {
        let cat = Categorical::new(&[0.0, 1.0, 0.0, 3.0]).unwrap();
        let mut rng = RandomStream::new(5);
        let mut counts = [0usize; 4];
        for _ in 0..20_000 {
            counts[cat.sample(&mut rng)] += 1;
        }
        assert_eq!(counts[0], 0);
        assert_eq!(counts[2], 0);
        let p1 = counts[1] as f64 / 20_000.0;
        assert!((p1 - 0.25).abs() < 0.015, "p1 = {p1}");
        assert_eq!(cat.log_prob(7), f64::NEG_INFINITY);
    }
}
