/*!
YAML configuration.

The file is deserialized into plain serde structs mirroring its layout and
then validated into typed settings ([`Config`]). Every problem found during
validation is a configuration error raised before the first iteration.

```rust
use popdiv_mcmc::config::Config;

let yaml = r#"
event_time_prior:
    gamma_distribution: {shape: 10.0, scale: 0.1}
event_model_prior:
    uniform: {}
comparisons:
- comparison:
    label: pair1
    populations: [a, b]
- comparison:
    label: pair2
    populations: [c]
"#;
let config = Config::from_yaml_str(yaml).unwrap();
assert_eq!(config.comparisons.len(), 2);
```
*/

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::distributions::ContinuousDistribution;
use crate::error::{McmcError, Result};
use crate::parameter::Parameter;

// ---------------------------------------------------------------------------
// raw file layout

/// Exactly one of the fields must be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionSpec {
    pub gamma_distribution: Option<GammaSpec>,
    pub exponential_distribution: Option<ExponentialSpec>,
    pub beta_distribution: Option<BetaSpec>,
    pub uniform_distribution: Option<UniformSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GammaSpec {
    pub shape: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExponentialSpec {
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BetaSpec {
    pub alpha: f64,
    pub beta: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniformSpec {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSpec {
    pub value: Option<f64>,
    pub estimate: Option<bool>,
    pub prior: Option<DistributionSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPriorSpec {
    pub dirichlet_process: Option<DirichletProcessSpec>,
    pub uniform: Option<UniformModelSpec>,
    pub fixed: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirichletProcessSpec {
    #[serde(default)]
    pub parameters: DirichletProcessParameters,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirichletProcessParameters {
    pub concentration: Option<ParameterSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniformModelSpec {}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McmcSettings {
    #[serde(default = "McmcSettings::default_chain_length")]
    pub chain_length: usize,
    #[serde(default = "McmcSettings::default_sample_frequency")]
    pub sample_frequency: usize,
    #[serde(default)]
    pub burnin: usize,
}

impl McmcSettings {
    fn default_chain_length() -> usize {
        100_000
    }

    fn default_sample_frequency() -> usize {
        100
    }
}

impl Default for McmcSettings {
    fn default() -> Self {
        Self {
            chain_length: Self::default_chain_length(),
            sample_frequency: Self::default_sample_frequency(),
            burnin: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOperatorSpec {
    pub weight: Option<f64>,
    pub number_of_auxiliary_categories: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalerSpec {
    pub weight: Option<f64>,
    pub scale: Option<f64>,
    pub target_acceptance: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSpec {
    pub weight: Option<f64>,
    pub window: Option<f64>,
    pub target_acceptance: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct OperatorTable {
    pub model_operator: Option<ModelOperatorSpec>,
    pub concentration_scaler: Option<ScalerSpec>,
    pub event_time_scaler: Option<ScalerSpec>,
    pub event_time_mover: Option<WindowSpec>,
    pub population_size_scaler: Option<ScalerSpec>,
    pub mutation_rate_scaler: Option<ScalerSpec>,
    pub freq_mover: Option<WindowSpec>,
    pub time_size_rate_mixer: Option<ScalerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorSettings {
    #[serde(default = "OperatorSettings::default_auto_optimize")]
    pub auto_optimize: bool,
    #[serde(default = "OperatorSettings::default_auto_optimize_delay")]
    pub auto_optimize_delay: usize,
    #[serde(default = "OperatorSettings::default_auto_optimize_batch")]
    pub auto_optimize_batch: usize,
    #[serde(default)]
    pub operators: OperatorTable,
}

impl OperatorSettings {
    fn default_auto_optimize() -> bool {
        true
    }

    fn default_auto_optimize_delay() -> usize {
        1000
    }

    fn default_auto_optimize_batch() -> usize {
        1
    }
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            auto_optimize: Self::default_auto_optimize(),
            auto_optimize_delay: Self::default_auto_optimize_delay(),
            auto_optimize_batch: Self::default_auto_optimize_batch(),
            operators: OperatorTable::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonParameters {
    pub population_size: Option<ParameterSpec>,
    pub mutation_rate: Option<ParameterSpec>,
    pub freq_1: Option<ParameterSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalComparisonSettings {
    #[serde(default)]
    pub equal_population_sizes: bool,
    #[serde(default)]
    pub equal_state_frequencies: bool,
    #[serde(default)]
    pub parameters: ComparisonParameters,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonEntry {
    pub comparison: ComparisonSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonSpec {
    pub label: String,
    pub populations: Vec<String>,
    pub equal_population_sizes: Option<bool>,
    #[serde(default)]
    pub parameters: ComparisonParameters,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub event_time_prior: DistributionSpec,
    #[serde(default)]
    pub event_model_prior: ModelPriorSpec,
    #[serde(default)]
    pub mcmc_settings: McmcSettings,
    #[serde(default)]
    pub operator_settings: OperatorSettings,
    #[serde(default)]
    pub global_comparison_settings: GlobalComparisonSettings,
    pub comparisons: Vec<ComparisonEntry>,
}

// ---------------------------------------------------------------------------
// validated settings

#[derive(Debug, Clone)]
pub enum ModelPriorConfig {
    DirichletProcess { concentration: Parameter },
    Uniform,
    /// Event label of each comparison, in comparison order.
    Fixed(Vec<usize>),
}

/// Weight and starting tuning value of a self-tuning operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunedOperatorConfig {
    pub weight: f64,
    pub tuning: f64,
    pub target_acceptance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorConfig {
    pub auto_optimize: bool,
    pub auto_optimize_delay: usize,
    pub auto_optimize_batch: usize,
    /// `None` when the file leaves it out; resolved against the model prior.
    pub model_operator_weight: Option<f64>,
    pub auxiliary_categories: usize,
    pub concentration_scaler: TunedOperatorConfig,
    pub event_time_scaler: TunedOperatorConfig,
    pub event_time_mover: TunedOperatorConfig,
    pub population_size_scaler: TunedOperatorConfig,
    pub mutation_rate_scaler: TunedOperatorConfig,
    pub freq_mover: TunedOperatorConfig,
    pub time_size_rate_mixer: TunedOperatorConfig,
}

#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    pub label: String,
    pub populations: Vec<String>,
    pub equal_population_sizes: bool,
    pub population_size: Parameter,
    pub mutation_rate: Parameter,
    /// Ignored when state frequencies are shared.
    pub freq_1: Parameter,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub height_prior: ContinuousDistribution,
    pub model_prior: ModelPriorConfig,
    pub chain_length: usize,
    pub sample_frequency: usize,
    pub burnin: usize,
    pub operators: OperatorConfig,
    /// Present when every comparison shares one `freq_1`.
    pub shared_freq_1: Option<Parameter>,
    pub comparisons: Vec<ComparisonConfig>,
}

const SCALER_TARGET: f64 = 0.44;
const MIXER_TARGET: f64 = 0.234;

impl DistributionSpec {
    pub fn build(&self, what: &str) -> Result<ContinuousDistribution> {
        let mut built = Vec::new();
        if let Some(g) = &self.gamma_distribution {
            built.push(ContinuousDistribution::gamma(g.shape, g.scale));
        }
        if let Some(e) = &self.exponential_distribution {
            built.push(ContinuousDistribution::exponential(e.rate));
        }
        if let Some(b) = &self.beta_distribution {
            built.push(ContinuousDistribution::beta(b.alpha, b.beta));
        }
        if let Some(u) = &self.uniform_distribution {
            built.push(ContinuousDistribution::uniform(u.min, u.max));
        }
        let given = built.len();
        match built.pop() {
            Some(d) if given == 1 => d.map_err(|e| McmcError::config(format!("{what}: {e}"))),
            _ => Err(McmcError::config(format!(
                "{what}: exactly one distribution must be given, found {given}"
            ))),
        }
    }
}

#[derive(Clone, Copy)]
enum Support {
    Positive,
    UnitInterval,
}

/// Field-wise override of `base` by `over`.
fn merge_parameter(base: &ParameterSpec, over: Option<&ParameterSpec>) -> ParameterSpec {
    match over {
        None => base.clone(),
        Some(over) => ParameterSpec {
            value: over.value.or(base.value),
            estimate: over.estimate.or(base.estimate),
            prior: over.prior.clone().or_else(|| base.prior.clone()),
        },
    }
}

fn build_parameter(
    what: &str,
    spec: &ParameterSpec,
    default_prior: ContinuousDistribution,
    default_estimate: bool,
    support: Support,
) -> Result<Parameter> {
    let prior = match &spec.prior {
        Some(p) => p.build(what)?,
        None => default_prior,
    };
    let fits = match support {
        Support::Positive => prior.is_positive(),
        Support::UnitInterval => prior.is_unit_interval(),
    };
    if !fits {
        return Err(McmcError::config(format!(
            "{what}: prior {prior} does not match the parameter's support"
        )));
    }
    let estimate = spec.estimate.unwrap_or(default_estimate);
    let value = match spec.value {
        Some(v) => v,
        None if estimate => prior.mean(),
        None => {
            return Err(McmcError::config(format!(
                "{what}: a parameter that is not estimated needs a value"
            )))
        }
    };
    if matches!(support, Support::Positive) && !(value > 0.0) {
        return Err(McmcError::config(format!(
            "{what}: value must be positive, got {value}"
        )));
    }
    if matches!(support, Support::UnitInterval) && !(0.0..=1.0).contains(&value) {
        return Err(McmcError::config(format!(
            "{what}: value must lie in [0, 1], got {value}"
        )));
    }
    Parameter::new(value, prior, estimate).map_err(|e| McmcError::config(format!("{what}: {e}")))
}

fn weight(what: &str, value: Option<f64>, default: f64) -> Result<f64> {
    let w = value.unwrap_or(default);
    if !w.is_finite() || w < 0.0 {
        return Err(McmcError::config(format!(
            "{what}: operator weight must be finite and non-negative, got {w}"
        )));
    }
    Ok(w)
}

fn tuned(
    what: &str,
    weight_value: Option<f64>,
    tuning: Option<f64>,
    target: Option<f64>,
    defaults: (f64, f64, f64),
) -> Result<TunedOperatorConfig> {
    let (default_weight, default_tuning, default_target) = defaults;
    let tuning = tuning.unwrap_or(default_tuning);
    if !(tuning.is_finite() && tuning > 0.0) {
        return Err(McmcError::config(format!(
            "{what}: tuning value must be positive, got {tuning}"
        )));
    }
    let target_acceptance = target.unwrap_or(default_target);
    if !(target_acceptance > 0.0 && target_acceptance < 1.0) {
        return Err(McmcError::config(format!(
            "{what}: target acceptance must lie in (0, 1), got {target_acceptance}"
        )));
    }
    Ok(TunedOperatorConfig {
        weight: weight(what, weight_value, default_weight)?,
        tuning,
        target_acceptance,
    })
}

fn scaler(what: &str, spec: &Option<ScalerSpec>, defaults: (f64, f64, f64)) -> Result<TunedOperatorConfig> {
    let spec = spec.clone().unwrap_or_default();
    tuned(what, spec.weight, spec.scale, spec.target_acceptance, defaults)
}

fn window(what: &str, spec: &Option<WindowSpec>, defaults: (f64, f64, f64)) -> Result<TunedOperatorConfig> {
    let spec = spec.clone().unwrap_or_default();
    tuned(what, spec.weight, spec.window, spec.target_acceptance, defaults)
}

impl OperatorSettings {
    fn validate(&self) -> Result<OperatorConfig> {
        let ops = &self.operators;
        let model = ops.model_operator.clone().unwrap_or_default();
        let auxiliary_categories = model.number_of_auxiliary_categories.unwrap_or(4);
        if auxiliary_categories == 0 {
            return Err(McmcError::config(
                "ModelOperator: number_of_auxiliary_categories must be at least 1",
            ));
        }
        let model_operator_weight = match model.weight {
            Some(w) => Some(weight("ModelOperator", Some(w), 0.0)?),
            None => None,
        };
        Ok(OperatorConfig {
            auto_optimize: self.auto_optimize,
            auto_optimize_delay: self.auto_optimize_delay,
            auto_optimize_batch: self.auto_optimize_batch.max(1),
            model_operator_weight,
            auxiliary_categories,
            concentration_scaler: scaler(
                "ConcentrationScaler",
                &ops.concentration_scaler,
                (1.0, 1.0, SCALER_TARGET),
            )?,
            event_time_scaler: scaler(
                "EventTimeScaler",
                &ops.event_time_scaler,
                (1.0, 0.5, SCALER_TARGET),
            )?,
            event_time_mover: window(
                "EventTimeMover",
                &ops.event_time_mover,
                (0.0, 0.1, SCALER_TARGET),
            )?,
            population_size_scaler: scaler(
                "PopulationSizeScaler",
                &ops.population_size_scaler,
                (1.0, 0.5, SCALER_TARGET),
            )?,
            mutation_rate_scaler: scaler(
                "MutationRateScaler",
                &ops.mutation_rate_scaler,
                (1.0, 0.5, SCALER_TARGET),
            )?,
            freq_mover: window("FreqMover", &ops.freq_mover, (1.0, 0.1, SCALER_TARGET))?,
            time_size_rate_mixer: scaler(
                "TimeSizeRateMixer",
                &ops.time_size_rate_mixer,
                (1.0, 0.3, MIXER_TARGET),
            )?,
        })
    }
}

impl ConfigFile {
    pub fn validate(&self) -> Result<Config> {
        let height_prior = self.event_time_prior.build("event_time_prior")?;
        if !height_prior.is_positive() {
            return Err(McmcError::config(format!(
                "event_time_prior must be a gamma or exponential distribution, got {height_prior}"
            )));
        }

        if self.comparisons.is_empty() {
            return Err(McmcError::config("at least one comparison is required"));
        }
        let n = self.comparisons.len();

        let model_prior = {
            let spec = &self.event_model_prior;
            let given = [
                spec.dirichlet_process.is_some(),
                spec.uniform.is_some(),
                spec.fixed.is_some(),
            ]
            .iter()
            .filter(|&&b| b)
            .count();
            if given > 1 {
                return Err(McmcError::config(
                    "event_model_prior: choose one of dirichlet_process, uniform or fixed",
                ));
            }
            if let Some(labels) = &spec.fixed {
                if labels.len() != n {
                    return Err(McmcError::config(format!(
                        "event_model_prior.fixed lists {} events for {n} comparisons",
                        labels.len()
                    )));
                }
                ModelPriorConfig::Fixed(labels.clone())
            } else if spec.uniform.is_some() {
                ModelPriorConfig::Uniform
            } else {
                let dp = spec.dirichlet_process.clone().unwrap_or_default();
                let concentration = dp.parameters.concentration.unwrap_or(ParameterSpec {
                    value: Some(1.0),
                    estimate: Some(false),
                    prior: None,
                });
                ModelPriorConfig::DirichletProcess {
                    concentration: build_parameter(
                        "concentration",
                        &concentration,
                        ContinuousDistribution::gamma(1.0, 1.0)?,
                        false,
                        Support::Positive,
                    )?,
                }
            }
        };

        let mcmc = &self.mcmc_settings;
        if mcmc.sample_frequency == 0 {
            return Err(McmcError::config("mcmc_settings.sample_frequency must be positive"));
        }

        let global = &self.global_comparison_settings;
        let default_size = ParameterSpec::default();
        let default_rate = ParameterSpec {
            value: Some(1.0),
            estimate: Some(false),
            prior: None,
        };
        let default_freq = ParameterSpec {
            value: Some(0.5),
            estimate: Some(false),
            prior: None,
        };
        let global_size = global.parameters.population_size.as_ref().unwrap_or(&default_size);
        let global_rate = global.parameters.mutation_rate.as_ref().unwrap_or(&default_rate);
        let global_freq = global.parameters.freq_1.as_ref().unwrap_or(&default_freq);
        let default_size_prior = || ContinuousDistribution::gamma(1.0, 0.001);
        let default_rate_prior = || ContinuousDistribution::gamma(100.0, 0.01);
        let default_freq_prior = || ContinuousDistribution::beta(1.0, 1.0);

        let shared_freq_1 = if global.equal_state_frequencies {
            Some(build_parameter(
                "freq_1",
                global_freq,
                default_freq_prior()?,
                false,
                Support::UnitInterval,
            )?)
        } else {
            None
        };

        let mut labels = HashSet::new();
        let mut population_labels = HashSet::new();
        let mut comparisons = Vec::with_capacity(n);
        for entry in &self.comparisons {
            let spec = &entry.comparison;
            let label = spec.label.trim();
            if label.is_empty() {
                return Err(McmcError::config("comparison labels must not be empty"));
            }
            if !labels.insert(label.to_string()) {
                return Err(McmcError::config(format!("duplicate comparison label '{label}'")));
            }
            if !(1..=2).contains(&spec.populations.len()) {
                return Err(McmcError::config(format!(
                    "comparison '{label}' must list one or two populations"
                )));
            }
            for pop in &spec.populations {
                if !population_labels.insert(pop.clone()) {
                    return Err(McmcError::config(format!(
                        "population label '{pop}' is used more than once"
                    )));
                }
            }
            let what = |name: &str| format!("comparison '{label}' {name}");
            let size = merge_parameter(global_size, spec.parameters.population_size.as_ref());
            let rate = merge_parameter(global_rate, spec.parameters.mutation_rate.as_ref());
            let freq = merge_parameter(global_freq, spec.parameters.freq_1.as_ref());
            comparisons.push(ComparisonConfig {
                label: label.to_string(),
                populations: spec.populations.clone(),
                equal_population_sizes: spec
                    .equal_population_sizes
                    .unwrap_or(global.equal_population_sizes),
                population_size: build_parameter(
                    &what("population_size"),
                    &size,
                    default_size_prior()?,
                    true,
                    Support::Positive,
                )?,
                mutation_rate: build_parameter(
                    &what("mutation_rate"),
                    &rate,
                    default_rate_prior()?,
                    false,
                    Support::Positive,
                )?,
                freq_1: build_parameter(
                    &what("freq_1"),
                    &freq,
                    default_freq_prior()?,
                    false,
                    Support::UnitInterval,
                )?,
            });
        }

        Ok(Config {
            height_prior,
            model_prior,
            chain_length: mcmc.chain_length,
            sample_frequency: mcmc.sample_frequency,
            burnin: mcmc.burnin,
            operators: self.operator_settings.validate()?,
            shared_freq_1,
            comparisons,
        })
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        file.validate()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
event_time_prior:
    gamma_distribution: {shape: 10.0, scale: 0.1}
comparisons:
- comparison:
    label: pair1
    populations: [a, b]
- comparison:
    label: pair2
    populations: [c, d]
    equal_population_sizes: true
    parameters:
        population_size: {value: 0.01, estimate: false}
"#;

    #[test]
    fn defaults_are_filled_in() {
        let config = Config::from_yaml_str(BASE).unwrap();
        assert_eq!(config.chain_length, 100_000);
        assert_eq!(config.sample_frequency, 100);
        assert!(config.operators.auto_optimize);
        assert_eq!(config.operators.auto_optimize_delay, 1000);
        assert_eq!(config.operators.auxiliary_categories, 4);
        assert_eq!(config.operators.model_operator_weight, None);
        assert_eq!(config.operators.time_size_rate_mixer.target_acceptance, 0.234);
        assert!(matches!(config.model_prior, ModelPriorConfig::DirichletProcess { .. }));
        assert!(config.shared_freq_1.is_none());

        let pair1 = &config.comparisons[0];
        assert!(!pair1.equal_population_sizes);
        assert!(pair1.population_size.is_estimated());
        assert!(!pair1.mutation_rate.is_estimated());
        assert_eq!(pair1.mutation_rate.value(), 1.0);

        let pair2 = &config.comparisons[1];
        assert!(pair2.equal_population_sizes);
        assert!(!pair2.population_size.is_estimated());
        assert_eq!(pair2.population_size.value(), 0.01);
    }

    #[test]
    fn operator_and_model_settings_are_read() {
        let yaml = format!(
            "{BASE}{}",
            r#"
event_model_prior:
    dirichlet_process:
        parameters:
            concentration:
                value: 2.0
                estimate: true
                prior:
                    gamma_distribution: {shape: 2.0, scale: 1.0}
operator_settings:
    auto_optimize_delay: 50
    operators:
        ModelOperator: {weight: 3.0, number_of_auxiliary_categories: 2}
        EventTimeScaler: {weight: 2.0, scale: 0.25}
        FreqMover: {window: 0.2, target_acceptance: 0.3}
global_comparison_settings:
    equal_state_frequencies: true
    parameters:
        freq_1:
            value: 0.4
            estimate: true
            prior:
                beta_distribution: {alpha: 2.0, beta: 3.0}
"#
        );
        let config = Config::from_yaml_str(&yaml).unwrap();
        match &config.model_prior {
            ModelPriorConfig::DirichletProcess { concentration } => {
                assert!(concentration.is_estimated());
                assert_eq!(concentration.value(), 2.0);
            }
            other => panic!("unexpected model prior {other:?}"),
        }
        assert_eq!(config.operators.auto_optimize_delay, 50);
        assert_eq!(config.operators.model_operator_weight, Some(3.0));
        assert_eq!(config.operators.auxiliary_categories, 2);
        assert_eq!(config.operators.event_time_scaler.weight, 2.0);
        assert_eq!(config.operators.event_time_scaler.tuning, 0.25);
        assert_eq!(config.operators.freq_mover.tuning, 0.2);
        assert_eq!(config.operators.freq_mover.target_acceptance, 0.3);
        let shared = config.shared_freq_1.as_ref().unwrap();
        assert_eq!(shared.value(), 0.4);
        assert!(shared.is_estimated());
    }

    #[test]
    fn invalid_files_are_config_errors() {
        let cases = [
            // typo in a field name
            BASE.replace("populations: [a, b]", "population: [a, b]"),
            // two priors for one parameter
            BASE.replace(
                "gamma_distribution: {shape: 10.0, scale: 0.1}",
                "gamma_distribution: {shape: 10.0, scale: 0.1}\n    exponential_distribution: {rate: 1.0}",
            ),
            // fixed partition of the wrong length
            format!("{BASE}event_model_prior:\n    fixed: [0, 0, 1]\n"),
            // beta prior on a population size
            BASE.replace(
                "population_size: {value: 0.01, estimate: false}",
                "population_size: {value: 0.01, estimate: true, prior: {beta_distribution: {alpha: 1.0, beta: 1.0}}}",
            ),
            // duplicate labels
            BASE.replace("label: pair2", "label: pair1"),
            // three populations
            BASE.replace("populations: [c, d]", "populations: [c, d, e]"),
            // zero sampling frequency
            format!("{BASE}mcmc_settings:\n    sample_frequency: 0\n"),
            // negative operator weight
            format!("{BASE}operator_settings:\n    operators:\n        EventTimeScaler: {{weight: -1.0}}\n"),
        ];
        for yaml in cases {
            let err = Config::from_yaml_str(&yaml).unwrap_err();
            assert!(
                matches!(err, McmcError::Config(_) | McmcError::Yaml(_)),
                "unexpected error {err:?} for\n{yaml}"
            );
        }
    }

    #[test]
    fn fixed_parameters_need_values() {
        let yaml = BASE.replace("{value: 0.01, estimate: false}", "{estimate: false}");
        assert!(matches!(
            Config::from_yaml_str(&yaml),
            Err(McmcError::Config(_))
        ));
    }
}
