/*!
Transition operators of the chain.

Operators form a closed set. Continuous operators carry their own
[`Tuning`]; the model operators (Dirichlet-process Gibbs and reversible
jump) have nothing to tune. Each proposal mutates the model state in place
and reports its log Hastings ratio together with the comparisons whose
likelihood it may have changed.
*/

mod continuous;
mod dirichlet;
mod reversible_jump;
pub mod tuning;

pub use tuning::{Tuning, TuningPhase};

use crate::core::ComparisonLikelihood;
use crate::error::Result;
use crate::evaluator::LikelihoodEvaluator;
use crate::model::{ModelPrior, ModelState, StateParts};
use crate::rng::RandomStream;

/// Comparisons whose likelihood must be recomputed after a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Touched {
    None,
    All,
    Comparisons(Vec<usize>),
}

/// How the chain should treat a proposal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acceptance {
    /// Metropolis-Hastings proposal with this log Hastings ratio.
    Hastings(f64),
    /// A Gibbs update: always accepted.
    Gibbs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub acceptance: Acceptance,
    pub touched: Touched,
}

impl Proposal {
    pub fn hastings(ln_hastings: f64, touched: Touched) -> Self {
        Self {
            acceptance: Acceptance::Hastings(ln_hastings),
            touched,
        }
    }

    pub fn gibbs(touched: Touched) -> Self {
        Self {
            acceptance: Acceptance::Gibbs,
            touched,
        }
    }

    /// A proposal that left the state as it was.
    pub fn unchanged() -> Self {
        Self::hastings(0.0, Touched::None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Multiplies one event height.
    EventTimeScaler(Tuning),
    /// Shifts one event height within a reflecting window.
    EventTimeMover(Tuning),
    PopulationSizeScaler(Tuning),
    MutationRateScaler(Tuning),
    /// Shifts an ancestral frequency within a reflecting window.
    FreqMover(Tuning),
    /// Scales an event height with the sizes of its comparisons, and their
    /// mutation rates inversely.
    TimeSizeRateMixer(Tuning),
    ConcentrationScaler(Tuning),
    /// Gibbs sweep over comparisons with `auxiliary_categories` empty events.
    DirichletProcessGibbs { auxiliary_categories: usize },
    /// Split/merge moves between partitions.
    ReversibleJump,
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::EventTimeScaler(_) => "EventTimeScaler",
            Operator::EventTimeMover(_) => "EventTimeMover",
            Operator::PopulationSizeScaler(_) => "PopulationSizeScaler",
            Operator::MutationRateScaler(_) => "MutationRateScaler",
            Operator::FreqMover(_) => "FreqMover",
            Operator::TimeSizeRateMixer(_) => "TimeSizeRateMixer",
            Operator::ConcentrationScaler(_) => "ConcentrationScaler",
            Operator::DirichletProcessGibbs { .. } => "DirichletProcessGibbs",
            Operator::ReversibleJump => "ReversibleJump",
        }
    }

    /// True for operators that change the partition.
    pub fn is_model_operator(&self) -> bool {
        matches!(
            self,
            Operator::DirichletProcessGibbs { .. } | Operator::ReversibleJump
        )
    }

    pub fn tuning(&self) -> Option<&Tuning> {
        match self {
            Operator::EventTimeScaler(t)
            | Operator::EventTimeMover(t)
            | Operator::PopulationSizeScaler(t)
            | Operator::MutationRateScaler(t)
            | Operator::FreqMover(t)
            | Operator::TimeSizeRateMixer(t)
            | Operator::ConcentrationScaler(t) => Some(t),
            Operator::DirichletProcessGibbs { .. } | Operator::ReversibleJump => None,
        }
    }

    pub fn tuning_mut(&mut self) -> Option<&mut Tuning> {
        match self {
            Operator::EventTimeScaler(t)
            | Operator::EventTimeMover(t)
            | Operator::PopulationSizeScaler(t)
            | Operator::MutationRateScaler(t)
            | Operator::FreqMover(t)
            | Operator::TimeSizeRateMixer(t)
            | Operator::ConcentrationScaler(t) => Some(t),
            Operator::DirichletProcessGibbs { .. } | Operator::ReversibleJump => None,
        }
    }

    /// Parts of the model state a proposal from this operator may change.
    pub fn writes(&self) -> StateParts {
        let partition = StateParts {
            partition: true,
            ..StateParts::default()
        };
        let comparisons = StateParts {
            comparisons: true,
            ..StateParts::default()
        };
        match self {
            Operator::EventTimeScaler(_)
            | Operator::EventTimeMover(_)
            | Operator::DirichletProcessGibbs { .. }
            | Operator::ReversibleJump => partition,
            Operator::PopulationSizeScaler(_) | Operator::MutationRateScaler(_) => comparisons,
            Operator::FreqMover(_) => StateParts {
                shared_freq_1: true,
                ..comparisons
            },
            Operator::TimeSizeRateMixer(_) => StateParts {
                partition: true,
                ..comparisons
            },
            Operator::ConcentrationScaler(_) => StateParts {
                concentration: true,
                ..StateParts::default()
            },
        }
    }

    /// Whether the operator has anything to update in `state`.
    pub fn has_targets(&self, state: &ModelState) -> bool {
        let comparisons = state.comparisons();
        match self {
            Operator::EventTimeScaler(_)
            | Operator::EventTimeMover(_)
            | Operator::TimeSizeRateMixer(_) => true,
            Operator::PopulationSizeScaler(_) => comparisons
                .iter()
                .any(|c| c.population_sizes().iter().any(|p| p.is_estimated())),
            Operator::MutationRateScaler(_) => {
                comparisons.iter().any(|c| c.mutation_rate().is_estimated())
            }
            Operator::FreqMover(_) => match state.shared_freq_1() {
                Some(shared) => shared.is_estimated(),
                None => comparisons
                    .iter()
                    .any(|c| c.freq_1().is_some_and(|f| f.is_estimated())),
            },
            Operator::ConcentrationScaler(_) => {
                state.concentration().is_some_and(|c| c.is_estimated())
            }
            Operator::DirichletProcessGibbs { .. } => {
                state.concentration().is_some() && state.number_of_comparisons() > 1
            }
            Operator::ReversibleJump => {
                matches!(state.model_prior(), ModelPrior::Uniform { .. })
                    && state.number_of_comparisons() > 1
            }
        }
    }

    /// Proposes a new state in place.
    pub fn propose<L: ComparisonLikelihood>(
        &self,
        state: &mut ModelState,
        rng: &mut RandomStream,
        evaluator: &LikelihoodEvaluator<L>,
    ) -> Result<Proposal> {
        let proposal = match self {
            Operator::EventTimeScaler(t) => continuous::scale_event_time(t.value(), state, rng),
            Operator::EventTimeMover(t) => continuous::move_event_time(t.value(), state, rng),
            Operator::PopulationSizeScaler(t) => {
                continuous::scale_population_size(t.value(), state, rng)
            }
            Operator::MutationRateScaler(t) => {
                continuous::scale_mutation_rate(t.value(), state, rng)
            }
            Operator::FreqMover(t) => continuous::move_freq(t.value(), state, rng),
            Operator::TimeSizeRateMixer(t) => {
                continuous::mix_time_size_rate(t.value(), state, rng)
            }
            Operator::ConcentrationScaler(t) => {
                continuous::scale_concentration(t.value(), state, rng)
            }
            Operator::DirichletProcessGibbs {
                auxiliary_categories,
            } => return dirichlet::gibbs_sweep(*auxiliary_categories, state, rng, evaluator),
            Operator::ReversibleJump => return reversible_jump::split_or_merge(state, rng),
        };
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::Comparison;
    use crate::core::PriorOnly;
    use crate::distributions::ContinuousDistribution;
    use crate::parameter::Parameter;
    use crate::partition::EventPartition;
    use approx::assert_abs_diff_eq;

    fn state(prior: ModelPrior, assignments: Vec<usize>) -> ModelState {
        let size_prior = ContinuousDistribution::gamma(4.0, 0.25).unwrap();
        let n = assignments.len();
        let comparisons = (0..n)
            .map(|i| {
                Comparison::new(
                    &format!("c{i}"),
                    vec![format!("c{i}a"), format!("c{i}b")],
                    vec![Parameter::new(1.0, size_prior.clone(), true).unwrap()],
                    Parameter::new(1.0, size_prior.clone(), true).unwrap(),
                    Some(Parameter::new(0.5, ContinuousDistribution::beta(2.0, 2.0).unwrap(), true).unwrap()),
                )
                .unwrap()
            })
            .collect();
        let heights = (0..n).map(|i| 0.5 + i as f64).collect();
        ModelState::new(
            EventPartition::new(assignments, heights).unwrap(),
            comparisons,
            None,
            ContinuousDistribution::gamma(2.0, 0.5).unwrap(),
            prior,
        )
        .unwrap()
    }

    #[test]
    fn mixer_hastings_counts_scaled_parameters() {
        let mut s = state(ModelPrior::Fixed, vec![0, 0]);
        let op = Operator::TimeSizeRateMixer(Tuning::new(0.5, 0.234, 1));
        let evaluator = LikelihoodEvaluator::new(PriorOnly, true, 1).unwrap();
        let mut rng = RandomStream::new(3);
        let before = s.partition().height(0);
        let proposal = op.propose(&mut s, &mut rng, &evaluator).unwrap();
        let m = s.partition().height(0) / before;
        // one height and two sizes scaled, two rates inversely scaled
        match proposal.acceptance {
            Acceptance::Hastings(h) => assert_abs_diff_eq!(h, m.ln(), epsilon = 1e-12),
            Acceptance::Gibbs => panic!("mixer is not a Gibbs move"),
        }
        for c in s.comparisons() {
            assert_abs_diff_eq!(c.population_size(0), m, epsilon = 1e-12);
            assert_abs_diff_eq!(c.mutation_rate().value(), 1.0 / m, epsilon = 1e-12);
        }
        assert_eq!(proposal.touched, Touched::Comparisons(vec![0, 1]));
    }

    #[test]
    fn reversible_jump_round_trip_hastings_cancel() {
        // from {0,1,2} split is forced; the reverse merge is one of six ordered pairs
        let mut s = state(ModelPrior::uniform(3), vec![0, 0, 0]);
        let op = Operator::ReversibleJump;
        let evaluator = LikelihoodEvaluator::new(PriorOnly, true, 1).unwrap();
        let mut rng = RandomStream::new(5);
        let proposal = op.propose(&mut s, &mut rng, &evaluator).unwrap();
        assert_eq!(s.partition().number_of_events(), 2);
        let new_height = s
            .partition()
            .heights()
            .iter()
            .copied()
            .find(|&h| h != 0.5)
            .unwrap();
        let g = ContinuousDistribution::gamma(2.0, 0.5).unwrap();
        // q(merge) / q(split) = (1/2 * 1/2) / (1 * 1/6), times 1 / g(h_new)
        let expected = (0.25_f64 / (1.0 / 6.0)).ln() - g.ln_pdf(new_height);
        match proposal.acceptance {
            Acceptance::Hastings(h) => assert_abs_diff_eq!(h, expected, epsilon = 1e-10),
            Acceptance::Gibbs => panic!("split is not a Gibbs move"),
        }
    }

    #[test]
    fn gibbs_sweep_keeps_partition_canonical() {
        let concentration =
            Parameter::fixed(1.0, ContinuousDistribution::gamma(1.0, 1.0).unwrap()).unwrap();
        let mut s = state(
            ModelPrior::DirichletProcess { concentration },
            vec![0, 1, 2, 3],
        );
        let op = Operator::DirichletProcessGibbs {
            auxiliary_categories: 3,
        };
        let evaluator = LikelihoodEvaluator::new(PriorOnly, true, 1).unwrap();
        let mut rng = RandomStream::new(8);
        for _ in 0..50 {
            let proposal = op.propose(&mut s, &mut rng, &evaluator).unwrap();
            assert_eq!(proposal.acceptance, Acceptance::Gibbs);
            let p = s.partition();
            let mut seen = 0;
            for &e in p.assignments() {
                assert!(e <= seen, "labels not canonical: {:?}", p.assignments());
                if e == seen {
                    seen += 1;
                }
            }
            assert_eq!(seen, p.number_of_events());
        }
    }

    #[test]
    fn targets_follow_estimate_flags() {
        let s = state(ModelPrior::Fixed, vec![0, 1]);
        assert!(Operator::PopulationSizeScaler(Tuning::frozen(0.5, 0.44)).has_targets(&s));
        assert!(!Operator::ConcentrationScaler(Tuning::frozen(0.5, 0.44)).has_targets(&s));
        assert!(!Operator::ReversibleJump.has_targets(&s));
        assert!(!Operator::DirichletProcessGibbs {
            auxiliary_categories: 4
        }
        .has_targets(&s));
    }

    fn parameter_values(s: &ModelState) -> Vec<f64> {
        let mut values: Vec<f64> = s.concentration().map(|c| c.value()).into_iter().collect();
        for c in s.comparisons() {
            values.extend(c.population_sizes().iter().map(Parameter::value));
            values.push(c.mutation_rate().value());
            values.extend(c.freq_1().map(Parameter::value));
        }
        values
    }

    #[test]
    fn snapshots_undo_every_operator() {
        let concentration = Parameter::new(
            1.5,
            ContinuousDistribution::gamma(2.0, 1.0).unwrap(),
            true,
        )
        .unwrap();
        let dp = state(
            ModelPrior::DirichletProcess { concentration },
            vec![0, 0, 1, 2],
        );
        let uniform = state(ModelPrior::uniform(4), vec![0, 1, 1, 0]);
        let tuning = || Tuning::new(0.8, 0.44, 1);
        let cases = [
            (Operator::EventTimeScaler(tuning()), &dp),
            (Operator::EventTimeMover(tuning()), &dp),
            (Operator::PopulationSizeScaler(tuning()), &dp),
            (Operator::MutationRateScaler(tuning()), &dp),
            (Operator::FreqMover(tuning()), &dp),
            (Operator::TimeSizeRateMixer(tuning()), &dp),
            (Operator::ConcentrationScaler(tuning()), &dp),
            (
                Operator::DirichletProcessGibbs {
                    auxiliary_categories: 2,
                },
                &dp,
            ),
            (Operator::ReversibleJump, &uniform),
        ];
        let evaluator = LikelihoodEvaluator::new(PriorOnly, true, 1).unwrap();
        let mut rng = RandomStream::new(21);
        for (op, start) in cases {
            let mut s = start.clone();
            let mut changed = false;
            for _ in 0..20 {
                let snapshot = s.snapshot(op.writes());
                op.propose(&mut s, &mut rng, &evaluator).unwrap();
                changed |= s.partition() != start.partition()
                    || parameter_values(&s) != parameter_values(start);
                s.restore(snapshot);
                assert_eq!(s.partition(), start.partition(), "{}", op.name());
                assert_eq!(parameter_values(&s), parameter_values(start), "{}", op.name());
                assert_eq!(s.ln_prior(), start.ln_prior(), "{}", op.name());
            }
            assert!(changed, "{} never moved the state", op.name());
        }
    }
}
