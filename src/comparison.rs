//! Per-comparison demographic parameters.

use std::sync::Arc;

use crate::error::{McmcError, Result};
use crate::parameter::Parameter;

/// One comparison: a pair of populations or a single population.
///
/// Population sizes are stored descendants first, root last. When sizes are
/// collapsed (`equal_population_sizes`) a single parameter stands for all of
/// them. `freq_1` is `None` when the ancestral frequency is shared by every
/// comparison and lives on the model state instead.
#[derive(Debug, Clone)]
pub struct Comparison {
    label: Arc<str>,
    populations: Arc<[String]>,
    population_sizes: Vec<Parameter>,
    mutation_rate: Parameter,
    freq_1: Option<Parameter>,
}

impl Comparison {
    pub fn new(
        label: &str,
        populations: Vec<String>,
        population_sizes: Vec<Parameter>,
        mutation_rate: Parameter,
        freq_1: Option<Parameter>,
    ) -> Result<Self> {
        if label.is_empty() {
            return Err(McmcError::config("comparison labels must not be empty"));
        }
        if !(1..=2).contains(&populations.len()) {
            return Err(McmcError::config(format!(
                "comparison '{label}' must have one or two populations, got {}",
                populations.len()
            )));
        }
        if population_sizes.len() != 1 && population_sizes.len() != populations.len() + 1 {
            return Err(McmcError::config(format!(
                "comparison '{label}' needs 1 or {} population sizes, got {}",
                populations.len() + 1,
                population_sizes.len()
            )));
        }
        Ok(Self {
            label: Arc::from(label),
            populations: Arc::from(populations),
            population_sizes,
            mutation_rate,
            freq_1,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn populations(&self) -> &[String] {
        &self.populations
    }

    pub fn population_count(&self) -> usize {
        self.populations.len()
    }

    /// True when one size parameter stands for every population.
    pub fn sizes_collapsed(&self) -> bool {
        self.population_sizes.len() == 1
    }

    pub fn population_sizes(&self) -> &[Parameter] {
        &self.population_sizes
    }

    pub fn population_sizes_mut(&mut self) -> &mut [Parameter] {
        &mut self.population_sizes
    }

    /// Size of descendant population `i`.
    pub fn population_size(&self, i: usize) -> f64 {
        if self.sizes_collapsed() {
            self.population_sizes[0].value()
        } else {
            self.population_sizes[i].value()
        }
    }

    /// Size of the ancestral population.
    pub fn root_population_size(&self) -> f64 {
        self.population_sizes[self.population_sizes.len() - 1].value()
    }

    pub fn mutation_rate(&self) -> &Parameter {
        &self.mutation_rate
    }

    pub fn mutation_rate_mut(&mut self) -> &mut Parameter {
        &mut self.mutation_rate
    }

    pub fn freq_1(&self) -> Option<&Parameter> {
        self.freq_1.as_ref()
    }

    pub fn freq_1_mut(&mut self) -> Option<&mut Parameter> {
        self.freq_1.as_mut()
    }

    /// Log prior of this comparison's own estimated parameters.
    pub fn ln_prior(&self) -> f64 {
        let sizes: f64 = self.population_sizes.iter().map(Parameter::ln_prior).sum();
        let freq = self.freq_1.as_ref().map_or(0.0, Parameter::ln_prior);
        sizes + freq + self.mutation_rate.ln_prior()
    }

    /// Prior term of this comparison that is not finite, if any.
    pub(crate) fn non_finite_prior_term(&self) -> Option<(&'static str, f64)> {
        for size in &self.population_sizes {
            let lp = size.ln_prior();
            if !lp.is_finite() {
                return Some(("population size prior", lp));
            }
        }
        if let Some(freq) = &self.freq_1 {
            let lp = freq.ln_prior();
            if !lp.is_finite() {
                return Some(("freq_1 prior", lp));
            }
        }
        let lp = self.mutation_rate.ln_prior();
        (!lp.is_finite()).then_some(("mutation rate prior", lp))
    }
}
