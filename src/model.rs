/*!
The full model state sampled by the chain: the event partition, the
comparisons, the shared parameters and the priors over them.

The log prior has four parts:

- the estimated parameters of every comparison (and the shared `freq_1`),
- the height prior evaluated at each event height,
- the prior over partitions (Dirichlet process, uniform, or fixed),
- the prior on the concentration when it is estimated.
*/

use crate::comparison::Comparison;
use crate::config::{Config, ModelPriorConfig};
use crate::core::ComparisonView;
use crate::distributions::ContinuousDistribution;
use crate::error::{McmcError, Result, Site};
use crate::math::{crp_ln_probability, ln_bell};
use crate::parameter::Parameter;
use crate::partition::EventPartition;
use crate::rng::RandomStream;

/// Prior over partitions of comparisons into events.
#[derive(Debug, Clone)]
pub enum ModelPrior {
    /// Chinese restaurant process with the given concentration.
    DirichletProcess { concentration: Parameter },
    /// Every partition equally likely; `ln_bell` caches `ln B(n)`.
    Uniform { ln_bell: f64 },
    /// The partition never changes.
    Fixed,
}

impl ModelPrior {
    pub fn uniform(number_of_comparisons: usize) -> Self {
        ModelPrior::Uniform {
            ln_bell: ln_bell(number_of_comparisons),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelPrior::DirichletProcess { .. } => "dirichlet_process",
            ModelPrior::Uniform { .. } => "uniform",
            ModelPrior::Fixed => "fixed",
        }
    }
}

/// Parts of a [`ModelState`] that a proposal may write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateParts {
    pub partition: bool,
    pub comparisons: bool,
    pub shared_freq_1: bool,
    pub concentration: bool,
}

/// Copy of selected parts of a model state, taken before a proposal so a
/// rejection can put them back.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    partition: Option<EventPartition>,
    comparisons: Option<Vec<Comparison>>,
    shared_freq_1: Option<Parameter>,
    concentration: Option<Parameter>,
}

#[derive(Debug, Clone)]
pub struct ModelState {
    partition: EventPartition,
    comparisons: Vec<Comparison>,
    shared_freq_1: Option<Parameter>,
    height_prior: ContinuousDistribution,
    model_prior: ModelPrior,
}

impl ModelState {
    pub fn new(
        partition: EventPartition,
        comparisons: Vec<Comparison>,
        shared_freq_1: Option<Parameter>,
        height_prior: ContinuousDistribution,
        model_prior: ModelPrior,
    ) -> Result<Self> {
        if partition.len() != comparisons.len() {
            return Err(McmcError::config(format!(
                "partition covers {} comparisons but {} were given",
                partition.len(),
                comparisons.len()
            )));
        }
        if !height_prior.is_positive() {
            return Err(McmcError::config(format!(
                "event time prior must have positive support, got {height_prior}"
            )));
        }
        for c in &comparisons {
            if c.freq_1().is_some() == shared_freq_1.is_some() {
                return Err(McmcError::config(format!(
                    "comparison '{}' must have its own freq_1 exactly when frequencies are not shared",
                    c.label()
                )));
            }
        }
        if let Some(&h) = partition.heights().iter().find(|h| h.is_nan() || **h <= 0.0) {
            return Err(McmcError::config(format!(
                "event heights must be positive, got {h}"
            )));
        }
        Ok(Self {
            partition,
            comparisons,
            shared_freq_1,
            height_prior,
            model_prior,
        })
    }

    /// Initial state for a validated configuration. Event heights are drawn
    /// from the height prior; the partition starts with every comparison in
    /// its own event unless it is fixed.
    pub fn from_config(config: &Config, rng: &mut RandomStream) -> Result<Self> {
        let shared = config.shared_freq_1.is_some();
        let comparisons = config
            .comparisons
            .iter()
            .map(|c| {
                let sizes = if c.equal_population_sizes {
                    vec![c.population_size.clone()]
                } else {
                    vec![c.population_size.clone(); c.populations.len() + 1]
                };
                let freq_1 = (!shared).then(|| c.freq_1.clone());
                Comparison::new(
                    &c.label,
                    c.populations.clone(),
                    sizes,
                    c.mutation_rate.clone(),
                    freq_1,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let n = comparisons.len();

        let (assignments, model_prior) = match &config.model_prior {
            ModelPriorConfig::DirichletProcess { concentration } => (
                (0..n).collect::<Vec<_>>(),
                ModelPrior::DirichletProcess {
                    concentration: concentration.clone(),
                },
            ),
            ModelPriorConfig::Uniform => ((0..n).collect(), ModelPrior::uniform(n)),
            ModelPriorConfig::Fixed(labels) => (labels.clone(), ModelPrior::Fixed),
        };
        let number_of_labels = assignments.iter().max().map_or(0, |m| m + 1);
        let heights = (0..number_of_labels)
            .map(|_| config.height_prior.draw(rng))
            .collect();

        Self::new(
            EventPartition::new(assignments, heights)?,
            comparisons,
            config.shared_freq_1.clone(),
            config.height_prior.clone(),
            model_prior,
        )
    }

    pub fn snapshot(&self, parts: StateParts) -> StateSnapshot {
        StateSnapshot {
            partition: parts.partition.then(|| self.partition.clone()),
            comparisons: parts.comparisons.then(|| self.comparisons.clone()),
            shared_freq_1: self.shared_freq_1.clone().filter(|_| parts.shared_freq_1),
            concentration: self.concentration().cloned().filter(|_| parts.concentration),
        }
    }

    /// Puts back every part held by `snapshot`; other parts are left alone.
    pub fn restore(&mut self, snapshot: StateSnapshot) {
        if let Some(partition) = snapshot.partition {
            self.partition = partition;
        }
        if let Some(comparisons) = snapshot.comparisons {
            self.comparisons = comparisons;
        }
        if let Some(freq) = snapshot.shared_freq_1 {
            self.shared_freq_1 = Some(freq);
        }
        if let (Some(saved), Some(concentration)) = (snapshot.concentration, self.concentration_mut()) {
            *concentration = saved;
        }
    }

    pub fn partition(&self) -> &EventPartition {
        &self.partition
    }

    pub fn partition_mut(&mut self) -> &mut EventPartition {
        &mut self.partition
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    pub fn comparisons_mut(&mut self) -> &mut [Comparison] {
        &mut self.comparisons
    }

    pub fn number_of_comparisons(&self) -> usize {
        self.comparisons.len()
    }

    pub fn shared_freq_1(&self) -> Option<&Parameter> {
        self.shared_freq_1.as_ref()
    }

    pub fn shared_freq_1_mut(&mut self) -> Option<&mut Parameter> {
        self.shared_freq_1.as_mut()
    }

    pub fn height_prior(&self) -> &ContinuousDistribution {
        &self.height_prior
    }

    pub fn model_prior(&self) -> &ModelPrior {
        &self.model_prior
    }

    pub fn concentration(&self) -> Option<&Parameter> {
        match &self.model_prior {
            ModelPrior::DirichletProcess { concentration } => Some(concentration),
            _ => None,
        }
    }

    pub fn concentration_mut(&mut self) -> Option<&mut Parameter> {
        match &mut self.model_prior {
            ModelPrior::DirichletProcess { concentration } => Some(concentration),
            _ => None,
        }
    }

    /// Ancestral frequency seen by comparison `i`.
    pub fn freq_1(&self, i: usize) -> f64 {
        match (&self.shared_freq_1, self.comparisons[i].freq_1()) {
            (Some(shared), _) => shared.value(),
            (None, Some(own)) => own.value(),
            (None, None) => 0.5,
        }
    }

    /// Read-only view of comparison `i` handed to the likelihood.
    pub fn view(&self, i: usize) -> ComparisonView<'_> {
        self.view_at_height(i, self.partition.height_of_comparison(i))
    }

    /// View of comparison `i` as if its event were at `height`.
    pub fn view_at_height(&self, i: usize, height: f64) -> ComparisonView<'_> {
        ComparisonView {
            index: i,
            comparison: &self.comparisons[i],
            height,
            freq_1: self.freq_1(i),
        }
    }

    /// Log prior of the partition (and the concentration, when estimated).
    pub fn ln_partition_prior(&self) -> f64 {
        match &self.model_prior {
            ModelPrior::DirichletProcess { concentration } => {
                crp_ln_probability(&self.partition.multiplicities(), concentration.value())
                    + concentration.ln_prior()
            }
            ModelPrior::Uniform { ln_bell } => -ln_bell,
            ModelPrior::Fixed => 0.0,
        }
    }

    pub fn ln_prior(&self) -> f64 {
        let comparisons: f64 = self.comparisons.iter().map(Comparison::ln_prior).sum();
        let shared = self.shared_freq_1.as_ref().map_or(0.0, Parameter::ln_prior);
        let heights: f64 = self
            .partition
            .heights()
            .iter()
            .map(|&h| self.height_prior.ln_pdf(h))
            .sum();
        comparisons + shared + heights + self.ln_partition_prior()
    }

    /// Finds the prior term responsible for a non-finite log prior.
    pub fn locate_non_finite_prior(&self) -> Option<(Site, &'static str, f64)> {
        for c in &self.comparisons {
            if let Some((term, value)) = c.non_finite_prior_term() {
                return Some((Site::new().with_comparison(c.label()), term, value));
            }
        }
        for (e, &h) in self.partition.heights().iter().enumerate() {
            let lp = self.height_prior.ln_pdf(h);
            if !lp.is_finite() {
                return Some((Site::new().with_event(e), "event time prior", lp));
            }
        }
        if let Some(shared) = &self.shared_freq_1 {
            let lp = shared.ln_prior();
            if !lp.is_finite() {
                return Some((Site::new(), "freq_1 prior", lp));
            }
        }
        let lp = self.ln_partition_prior();
        (!lp.is_finite()).then(|| (Site::new(), "partition prior", lp))
    }
}
