//! Seams between the sampler and the outside world: the per-comparison
//! likelihood consumed by the chain, and the chain stepping interface.

use crate::comparison::Comparison;
use crate::error::Result;

/// What the likelihood sees of one comparison.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonView<'a> {
    /// Index of the comparison in configuration order.
    pub index: usize,
    pub comparison: &'a Comparison,
    /// Height of the event the comparison is mapped to (or a candidate height).
    pub height: f64,
    /// Ancestral frequency, resolved whether shared or per comparison.
    pub freq_1: f64,
}

/**
Log-likelihood of one comparison's data given its parameters.

The chain treats this as a black box. Implementations are called from
worker threads when more than one thread is configured, so they must be
`Sync`, and they must be pure: the same view always yields the same value.

Closures work out of the box:

```rust
use popdiv_mcmc::core::{ComparisonLikelihood, ComparisonView};

let likelihood = |view: &ComparisonView<'_>| -(view.height - 1.0).powi(2);
fn takes<L: ComparisonLikelihood>(_: &L) {}
takes(&likelihood);
```
*/
pub trait ComparisonLikelihood: Sync {
    fn ln_likelihood(&self, view: &ComparisonView<'_>) -> f64;
}

impl<F> ComparisonLikelihood for F
where
    F: Fn(&ComparisonView<'_>) -> f64 + Sync,
{
    fn ln_likelihood(&self, view: &ComparisonView<'_>) -> f64 {
        self(view)
    }
}

/// A likelihood that is identically one, for sampling from the prior.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorOnly;

impl ComparisonLikelihood for PriorOnly {
    fn ln_likelihood(&self, _view: &ComparisonView<'_>) -> f64 {
        0.0
    }
}

/// Result of one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub generation: usize,
    /// Index of the operator in the schedule.
    pub operator: usize,
    pub accepted: bool,
    /// `min(1, exp(ln acceptance ratio))`.
    pub acceptance_probability: f64,
}

pub trait MarkovChain {
    type State;

    /// Does one iteration of the chain.
    fn step(&mut self) -> Result<StepOutcome>;

    /// Current state without stepping.
    fn current_state(&self) -> &Self::State;
}
