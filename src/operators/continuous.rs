//! Scalers, window movers and the time/size/rate mixer.

use crate::model::ModelState;
use crate::rng::RandomStream;

use super::{Proposal, Touched};

/// Multiplier `exp(scale * (u - 0.5))` for a scaler with tuning `scale`.
fn multiplier(scale: f64, rng: &mut RandomStream) -> f64 {
    (scale * (rng.uniform() - 0.5)).exp()
}

/// Reflects `x` back into `[low, high]`.
pub(crate) fn reflect(mut x: f64, low: f64, high: f64) -> f64 {
    loop {
        if x < low {
            x = 2.0 * low - x;
        } else if x > high {
            x = 2.0 * high - x;
        } else {
            return x;
        }
    }
}

pub(super) fn scale_event_time(scale: f64, state: &mut ModelState, rng: &mut RandomStream) -> Proposal {
    let partition = state.partition_mut();
    let event = rng.uniform_index(partition.number_of_events());
    let m = multiplier(scale, rng);
    partition.set_height(event, partition.height(event) * m);
    Proposal::hastings(m.ln(), Touched::Comparisons(partition.comparisons_in(event)))
}

pub(super) fn move_event_time(window: f64, state: &mut ModelState, rng: &mut RandomStream) -> Proposal {
    let partition = state.partition_mut();
    let event = rng.uniform_index(partition.number_of_events());
    let proposed = partition.height(event) + window * (rng.uniform() - 0.5);
    partition.set_height(event, reflect(proposed, 0.0, f64::INFINITY));
    Proposal::hastings(0.0, Touched::Comparisons(partition.comparisons_in(event)))
}

pub(super) fn scale_population_size(
    scale: f64,
    state: &mut ModelState,
    rng: &mut RandomStream,
) -> Proposal {
    let targets: Vec<(usize, usize)> = state
        .comparisons()
        .iter()
        .enumerate()
        .flat_map(|(c, comparison)| {
            comparison
                .population_sizes()
                .iter()
                .enumerate()
                .filter(|(_, p)| p.is_estimated())
                .map(move |(j, _)| (c, j))
        })
        .collect();
    if targets.is_empty() {
        return Proposal::unchanged();
    }
    let (c, j) = targets[rng.uniform_index(targets.len())];
    let m = multiplier(scale, rng);
    let size = &mut state.comparisons_mut()[c].population_sizes_mut()[j];
    size.set_value(size.value() * m);
    Proposal::hastings(m.ln(), Touched::Comparisons(vec![c]))
}

pub(super) fn scale_mutation_rate(
    scale: f64,
    state: &mut ModelState,
    rng: &mut RandomStream,
) -> Proposal {
    let targets: Vec<usize> = state
        .comparisons()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.mutation_rate().is_estimated())
        .map(|(i, _)| i)
        .collect();
    if targets.is_empty() {
        return Proposal::unchanged();
    }
    let c = targets[rng.uniform_index(targets.len())];
    let m = multiplier(scale, rng);
    let rate = state.comparisons_mut()[c].mutation_rate_mut();
    rate.set_value(rate.value() * m);
    Proposal::hastings(m.ln(), Touched::Comparisons(vec![c]))
}

pub(super) fn move_freq(window: f64, state: &mut ModelState, rng: &mut RandomStream) -> Proposal {
    let step = |value: f64, support: (f64, f64), rng: &mut RandomStream| {
        reflect(value + window * (rng.uniform() - 0.5), support.0, support.1)
    };
    if let Some(shared) = state.shared_freq_1_mut() {
        if !shared.is_estimated() {
            return Proposal::unchanged();
        }
        let proposed = step(shared.value(), shared.prior().support(), rng);
        shared.set_value(proposed);
        return Proposal::hastings(0.0, Touched::All);
    }
    let targets: Vec<usize> = state
        .comparisons()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.freq_1().is_some_and(|f| f.is_estimated()))
        .map(|(i, _)| i)
        .collect();
    if targets.is_empty() {
        return Proposal::unchanged();
    }
    let c = targets[rng.uniform_index(targets.len())];
    match state.comparisons_mut()[c].freq_1_mut() {
        Some(freq) => {
            let proposed = step(freq.value(), freq.prior().support(), rng);
            freq.set_value(proposed);
            Proposal::hastings(0.0, Touched::Comparisons(vec![c]))
        }
        None => Proposal::unchanged(),
    }
}

/// Scales one event's height and the population sizes of its comparisons
/// by `m`, and their mutation rates by `1/m`, keeping the expected number
/// of mutations roughly constant.
pub(super) fn mix_time_size_rate(
    scale: f64,
    state: &mut ModelState,
    rng: &mut RandomStream,
) -> Proposal {
    let event = rng.uniform_index(state.partition().number_of_events());
    let m = multiplier(scale, rng);
    let members = state.partition().comparisons_in(event);
    let height = state.partition().height(event);
    state.partition_mut().set_height(event, height * m);

    let mut scaled = 1usize;
    let mut inverse = 0usize;
    for &c in &members {
        let comparison = &mut state.comparisons_mut()[c];
        for size in comparison.population_sizes_mut() {
            if size.is_estimated() {
                size.set_value(size.value() * m);
                scaled += 1;
            }
        }
        let rate = comparison.mutation_rate_mut();
        if rate.is_estimated() {
            rate.set_value(rate.value() / m);
            inverse += 1;
        }
    }
    let ln_hastings = m.ln() * (scaled as f64 - inverse as f64);
    Proposal::hastings(ln_hastings, Touched::Comparisons(members))
}

pub(super) fn scale_concentration(
    scale: f64,
    state: &mut ModelState,
    rng: &mut RandomStream,
) -> Proposal {
    match state.concentration_mut() {
        Some(concentration) if concentration.is_estimated() => {
            let m = multiplier(scale, rng);
            concentration.set_value(concentration.value() * m);
            Proposal::hastings(m.ln(), Touched::None)
        }
        _ => Proposal::unchanged(),
    }
}
