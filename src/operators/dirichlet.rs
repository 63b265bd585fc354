//! Gibbs reassignment of comparisons to events under a Dirichlet-process
//! prior, using auxiliary categories for unoccupied events (Neal 2000,
//! algorithm 8).

use crate::core::ComparisonLikelihood;
use crate::distributions::{Categorical, DiscreteDistribution};
use crate::error::{McmcError, Result, Site};
use crate::evaluator::LikelihoodEvaluator;
use crate::math::normalize_log_weights;
use crate::model::ModelState;
use crate::rng::RandomStream;

use super::{Proposal, Touched};

enum Candidate {
    Existing(usize),
    New(f64),
}

/// Sweeps every comparison once, in index order.
pub(super) fn gibbs_sweep<L: ComparisonLikelihood>(
    auxiliary_categories: usize,
    state: &mut ModelState,
    rng: &mut RandomStream,
    evaluator: &LikelihoodEvaluator<L>,
) -> Result<Proposal> {
    let alpha = state
        .concentration()
        .map(|c| c.value())
        .ok_or_else(|| McmcError::config("Dirichlet-process Gibbs move without a Dirichlet-process prior"))?;
    let ln_auxiliary_weight = (alpha / auxiliary_categories as f64).ln();

    for i in 0..state.number_of_comparisons() {
        let partition = state.partition();
        let current = partition.event_of(i);
        let mut counts = partition.multiplicities();
        counts[current] -= 1;

        let mut candidates = Vec::with_capacity(counts.len() + auxiliary_categories);
        let mut heights = Vec::with_capacity(counts.len() + auxiliary_categories);
        let mut ln_weights = Vec::with_capacity(counts.len() + auxiliary_categories);
        for (event, &n) in counts.iter().enumerate() {
            if n > 0 {
                candidates.push(Candidate::Existing(event));
                heights.push(partition.height(event));
                ln_weights.push((n as f64).ln());
            }
        }

        // a comparison alone in its event keeps that event as one auxiliary category
        let mut fresh = auxiliary_categories;
        if counts[current] == 0 {
            candidates.push(Candidate::Existing(current));
            heights.push(partition.height(current));
            ln_weights.push(ln_auxiliary_weight);
            fresh -= 1;
        }
        for _ in 0..fresh {
            let h = state.height_prior().draw(rng);
            candidates.push(Candidate::New(h));
            heights.push(h);
            ln_weights.push(ln_auxiliary_weight);
        }

        let ln_likelihoods = evaluator.at_heights(state, i, &heights);
        for (w, lnl) in ln_weights.iter_mut().zip(&ln_likelihoods) {
            if !lnl.is_finite() {
                return Err(McmcError::NonFinite {
                    quantity: "ln likelihood",
                    value: *lnl,
                    generation: 0,
                    site: Site::new().with_comparison(state.comparisons()[i].label()),
                });
            }
            *w += lnl;
        }

        let choice = Categorical::new(&normalize_log_weights(&ln_weights))?.sample(rng);
        let partition = state.partition_mut();
        match candidates[choice] {
            Candidate::Existing(event) => partition.assign(i, event),
            Candidate::New(height) => {
                partition.assign_new_event(i, height);
            }
        }
        partition.canonicalize();
    }
    Ok(Proposal::gibbs(Touched::All))
}
