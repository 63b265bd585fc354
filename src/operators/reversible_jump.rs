//! Split/merge moves over partitions with a uniform prior.
//!
//! A split picks a shared event and an ordered, non-trivial subset of its
//! comparisons; the subset moves to a new event whose height is drawn from
//! the height prior. A merge picks an ordered pair of events and folds the
//! first into the second. Each move's Hastings ratio accounts for the
//! other's proposal probability, including the forced choice of move type in
//! the all-shared and all-separate states.

use std::f64::consts::LN_2;

use crate::distributions::{Categorical, DiscreteDistribution};
use crate::error::Result;
use crate::math::{ln_gamma, ln_ordered_splits, normalize_log_weights};
use crate::model::ModelState;
use crate::rng::RandomStream;

use super::{Proposal, Touched};

fn ln_binomial(n: usize, k: usize) -> f64 {
    ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
}

/// Uniform draw over the `2^n - 2` ordered non-trivial subsets of `0..n`.
fn random_ordered_split(n: usize, rng: &mut RandomStream) -> Result<Vec<usize>> {
    let ln_sizes: Vec<f64> = (1..n).map(|k| ln_binomial(n, k)).collect();
    let size = 1 + Categorical::new(&normalize_log_weights(&ln_sizes))?.sample(rng);
    Ok(rng.random_subset_indices(n, size))
}

pub(super) fn split_or_merge(state: &mut ModelState, rng: &mut RandomStream) -> Result<Proposal> {
    let n = state.number_of_comparisons();
    if n < 2 {
        return Ok(Proposal::unchanged());
    }
    let partition = state.partition();
    let split = if partition.is_fully_shared() {
        true
    } else if partition.is_fully_general() {
        false
    } else {
        rng.uniform() < 0.5
    };
    if split {
        split_event(state, rng)
    } else {
        Ok(merge_events(state, rng))
    }
}

fn split_event(state: &mut ModelState, rng: &mut RandomStream) -> Result<Proposal> {
    let n = state.number_of_comparisons();
    let events_before = state.partition().number_of_events();
    let shared = state.partition().shared_events();
    let event = shared[rng.uniform_index(shared.len())];
    let members = state.partition().comparisons_in(event);
    let moving: Vec<usize> = random_ordered_split(members.len(), rng)?
        .into_iter()
        .map(|k| members[k])
        .collect();

    let height = state.height_prior().draw(rng);
    let ln_height_density = state.height_prior().ln_pdf(height);
    state.partition_mut().split(&moving, height);
    let events_after = events_before + 1;

    let mut ln_hastings = ln_ordered_splits(members.len()) + (shared.len() as f64).ln()
        - (events_after as f64).ln()
        - (events_before as f64).ln()
        - ln_height_density;
    let from_shared = events_before == 1;
    let to_general = events_after == n;
    if from_shared && !to_general {
        ln_hastings -= LN_2;
    } else if to_general && !from_shared {
        ln_hastings += LN_2;
    }
    Ok(Proposal::hastings(ln_hastings, Touched::Comparisons(moving)))
}

fn merge_events(state: &mut ModelState, rng: &mut RandomStream) -> Proposal {
    let n = state.number_of_comparisons();
    let events_before = state.partition().number_of_events();
    let from = rng.uniform_index(events_before);
    let mut into = rng.uniform_index(events_before - 1);
    if into >= from {
        into += 1;
    }
    let moved = state.partition().comparisons_in(from);
    let removed_height = state.partition_mut().merge(from, into);

    let partition = state.partition();
    let merged = partition.event_of(moved[0]);
    let merged_size = partition.multiplicity(merged);
    let shared_after = partition.shared_events().len();
    let events_after = events_before - 1;

    let mut ln_hastings = (events_before as f64).ln() + ((events_before - 1) as f64).ln()
        - (shared_after as f64).ln()
        - ln_ordered_splits(merged_size)
        + state.height_prior().ln_pdf(removed_height);
    let from_general = events_before == n;
    let to_shared = events_after == 1;
    if from_general && !to_shared {
        ln_hastings -= LN_2;
    } else if to_shared && !from_general {
        ln_hastings += LN_2;
    }
    Proposal::hastings(ln_hastings, Touched::Comparisons(moved))
}
