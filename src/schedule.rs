//! Weighted operator schedule and the operator log.

use std::io::Write;

use tracing::warn;

use crate::config::{OperatorConfig, TunedOperatorConfig};
use crate::distributions::{Categorical, DiscreteDistribution};
use crate::error::{McmcError, Result};
use crate::model::{ModelPrior, ModelState};
use crate::operators::{Operator, Tuning};
use crate::rng::RandomStream;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledOperator {
    pub operator: Operator,
    pub weight: f64,
    pub accepted: usize,
    pub rejected: usize,
}

impl ScheduledOperator {
    pub fn new(operator: Operator, weight: f64) -> Self {
        Self {
            operator,
            weight,
            accepted: 0,
            rejected: 0,
        }
    }

    pub fn acceptance_rate(&self) -> Option<f64> {
        let total = self.accepted + self.rejected;
        (total > 0).then(|| self.accepted as f64 / total as f64)
    }
}

/// Operators with their selection weights and acceptance counts.
#[derive(Debug, Clone)]
pub struct OperatorSchedule {
    entries: Vec<ScheduledOperator>,
    selector: Categorical,
    total_weight: f64,
}

impl OperatorSchedule {
    pub fn new(entries: Vec<ScheduledOperator>) -> Result<Self> {
        if let Some(bad) = entries
            .iter()
            .find(|e| !e.weight.is_finite() || e.weight < 0.0)
        {
            return Err(McmcError::config(format!(
                "{} has invalid weight {}",
                bad.operator.name(),
                bad.weight
            )));
        }
        let weights: Vec<f64> = entries.iter().map(|e| e.weight).collect();
        let total_weight: f64 = weights.iter().sum();
        if total_weight <= 0.0 {
            return Err(McmcError::config("every operator has zero weight"));
        }
        Ok(Self {
            selector: Categorical::new(&weights)?,
            entries,
            total_weight,
        })
    }

    /// Builds the schedule for `state`. Operators with nothing to update get
    /// weight zero.
    pub fn from_config(config: &OperatorConfig, state: &ModelState) -> Result<Self> {
        let tuning = |c: &TunedOperatorConfig| {
            if config.auto_optimize {
                Tuning::new(c.tuning, c.target_acceptance, config.auto_optimize_batch)
            } else {
                Tuning::frozen(c.tuning, c.target_acceptance)
            }
        };

        let mut candidates = Vec::new();
        match state.model_prior() {
            ModelPrior::DirichletProcess { .. } => {
                candidates.push((
                    Operator::DirichletProcessGibbs {
                        auxiliary_categories: config.auxiliary_categories,
                    },
                    config.model_operator_weight.unwrap_or(1.0),
                ));
                candidates.push((
                    Operator::ConcentrationScaler(tuning(&config.concentration_scaler)),
                    config.concentration_scaler.weight,
                ));
            }
            ModelPrior::Uniform { .. } => candidates.push((
                Operator::ReversibleJump,
                config.model_operator_weight.unwrap_or(1.0),
            )),
            ModelPrior::Fixed => {
                if config.model_operator_weight.is_some_and(|w| w > 0.0) {
                    return Err(McmcError::config(
                        "ModelOperator has positive weight but the event model is fixed",
                    ));
                }
            }
        }
        candidates.extend([
            (
                Operator::EventTimeScaler(tuning(&config.event_time_scaler)),
                config.event_time_scaler.weight,
            ),
            (
                Operator::EventTimeMover(tuning(&config.event_time_mover)),
                config.event_time_mover.weight,
            ),
            (
                Operator::PopulationSizeScaler(tuning(&config.population_size_scaler)),
                config.population_size_scaler.weight,
            ),
            (
                Operator::MutationRateScaler(tuning(&config.mutation_rate_scaler)),
                config.mutation_rate_scaler.weight,
            ),
            (
                Operator::FreqMover(tuning(&config.freq_mover)),
                config.freq_mover.weight,
            ),
            (
                Operator::TimeSizeRateMixer(tuning(&config.time_size_rate_mixer)),
                config.time_size_rate_mixer.weight,
            ),
        ]);

        let entries = candidates
            .into_iter()
            .map(|(operator, weight)| {
                let weight = if weight > 0.0 && !operator.has_targets(state) {
                    warn!(operator = operator.name(), "no estimated targets, weight set to 0");
                    0.0
                } else {
                    weight
                };
                ScheduledOperator::new(operator, weight)
            })
            .collect();
        Self::new(entries)
    }

    /// Checks that every operator that can be drawn fits `state`.
    pub fn validate(&self, state: &ModelState) -> Result<()> {
        for entry in self.entries.iter().filter(|e| e.weight > 0.0) {
            let fits_prior = match (&entry.operator, state.model_prior()) {
                (Operator::DirichletProcessGibbs { .. }, ModelPrior::DirichletProcess { .. }) => {
                    true
                }
                (Operator::DirichletProcessGibbs { .. }, _) => false,
                (Operator::ReversibleJump, ModelPrior::Uniform { .. }) => true,
                (Operator::ReversibleJump, _) => false,
                (Operator::ConcentrationScaler(_), ModelPrior::DirichletProcess { .. }) => true,
                (Operator::ConcentrationScaler(_), _) => false,
                _ => true,
            };
            if !fits_prior {
                return Err(McmcError::config(format!(
                    "{} has positive weight under the {} event model prior",
                    entry.operator.name(),
                    state.model_prior().name()
                )));
            }
            if !entry.operator.has_targets(state) {
                return Err(McmcError::config(format!(
                    "{} has positive weight but nothing to update",
                    entry.operator.name()
                )));
            }
        }
        Ok(())
    }

    pub fn draw(&self, rng: &mut RandomStream) -> usize {
        self.selector.sample(rng)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> &ScheduledOperator {
        &self.entries[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut ScheduledOperator {
        &mut self.entries[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledOperator> {
        self.entries.iter()
    }

    /// Selection probability of operator `index`.
    pub fn probability(&self, index: usize) -> f64 {
        self.entries[index].weight / self.total_weight
    }

    pub fn record(&mut self, index: usize, accepted: bool) {
        let entry = &mut self.entries[index];
        if accepted {
            entry.accepted += 1;
        } else {
            entry.rejected += 1;
        }
    }

    pub fn freeze_all(&mut self) {
        for entry in &mut self.entries {
            if let Some(t) = entry.operator.tuning_mut() {
                t.freeze();
            }
        }
    }

    pub fn total_accepted(&self) -> usize {
        self.entries.iter().map(|e| e.accepted).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.entries.iter().map(|e| e.rejected).sum()
    }

    /// Writes one tab-separated row per operator.
    pub fn write_operator_log<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        wtr.write_record([
            "name",
            "number_accepted",
            "number_rejected",
            "weight",
            "weight_prob",
            "tuning_parameter",
        ])?;
        for (i, entry) in self.entries.iter().enumerate() {
            let tuning = entry
                .operator
                .tuning()
                .map_or_else(|| "none".to_string(), |t| t.value().to_string());
            wtr.write_record([
                entry.operator.name().to_string(),
                entry.accepted.to_string(),
                entry.rejected.to_string(),
                entry.weight.to_string(),
                self.probability(i).to_string(),
                tuning,
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn config(model: &str) -> Config {
        Config::from_yaml_str(&format!(
            r#"
event_time_prior:
    gamma_distribution: {{shape: 2.0, scale: 0.5}}
event_model_prior:
    {model}
comparisons:
- comparison: {{label: a, populations: [a1, a2]}}
- comparison: {{label: b, populations: [b1, b2]}}
"#
        ))
        .unwrap()
    }

    fn schedule_for(model: &str) -> (OperatorSchedule, ModelState) {
        let config = config(model);
        let state = ModelState::from_config(&config, &mut RandomStream::new(2)).unwrap();
        let schedule = OperatorSchedule::from_config(&config.operators, &state).unwrap();
        (schedule, state)
    }

    fn weight_of(schedule: &OperatorSchedule, name: &str) -> Option<f64> {
        schedule
            .iter()
            .find(|e| e.operator.name() == name)
            .map(|e| e.weight)
    }

    #[test]
    fn targetless_operators_get_zero_weight() {
        let (schedule, state) = schedule_for("dirichlet_process: {}");
        assert_eq!(weight_of(&schedule, "MutationRateScaler"), Some(0.0));
        assert_eq!(weight_of(&schedule, "FreqMover"), Some(0.0));
        assert_eq!(weight_of(&schedule, "ConcentrationScaler"), Some(0.0));
        assert_eq!(weight_of(&schedule, "DirichletProcessGibbs"), Some(1.0));
        assert_eq!(weight_of(&schedule, "ReversibleJump"), None);
        schedule.validate(&state).unwrap();
    }

    #[test]
    fn model_operator_follows_prior() {
        let (schedule, _) = schedule_for("uniform: {}");
        assert_eq!(weight_of(&schedule, "ReversibleJump"), Some(1.0));
        assert_eq!(weight_of(&schedule, "DirichletProcessGibbs"), None);

        let (schedule, _) = schedule_for("fixed: [0, 1]");
        assert_eq!(weight_of(&schedule, "ReversibleJump"), None);
        assert_eq!(weight_of(&schedule, "DirichletProcessGibbs"), None);
    }

    #[test]
    fn fixed_model_rejects_positive_model_weight() {
        let mut config = config("fixed: [0, 0]");
        config.operators.model_operator_weight = Some(1.0);
        let state = ModelState::from_config(&config, &mut RandomStream::new(2)).unwrap();
        assert!(OperatorSchedule::from_config(&config.operators, &state).is_err());

        let schedule = OperatorSchedule::new(vec![
            ScheduledOperator::new(Operator::ReversibleJump, 1.0),
            ScheduledOperator::new(Operator::EventTimeScaler(Tuning::frozen(0.5, 0.44)), 1.0),
        ])
        .unwrap();
        assert!(matches!(schedule.validate(&state), Err(McmcError::Config(_))));
    }

    #[test]
    fn draws_follow_weights() {
        let schedule = OperatorSchedule::new(vec![
            ScheduledOperator::new(Operator::EventTimeScaler(Tuning::frozen(0.5, 0.44)), 3.0),
            ScheduledOperator::new(Operator::EventTimeMover(Tuning::frozen(0.1, 0.44)), 0.0),
            ScheduledOperator::new(Operator::TimeSizeRateMixer(Tuning::frozen(0.3, 0.234)), 1.0),
        ])
        .unwrap();
        let mut rng = RandomStream::new(11);
        let mut counts = [0usize; 3];
        for _ in 0..20_000 {
            counts[schedule.draw(&mut rng)] += 1;
        }
        assert_eq!(counts[1], 0);
        let p = counts[0] as f64 / 20_000.0;
        assert!((p - 0.75).abs() < 0.02, "p = {p}");
        assert_eq!(schedule.probability(0), 0.75);
    }

    #[test]
    fn operator_log_lists_every_operator() {
        let (mut schedule, _) = schedule_for("uniform: {}");
        schedule.record(0, true);
        schedule.record(0, false);
        let mut out = Vec::new();
        schedule.write_operator_log(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "name\tnumber_accepted\tnumber_rejected\tweight\tweight_prob\ttuning_parameter"
        );
        assert_eq!(lines.len(), schedule.len() + 1);
        assert!(lines[1].starts_with("ReversibleJump\t1\t1\t"));
        assert!(lines[1].ends_with("\tnone"));
    }
}
