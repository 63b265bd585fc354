/*!
The Metropolis-Hastings chain over [`ModelState`].

Each iteration draws one operator from the weighted schedule, lets it
propose a new state in place, recomputes the log-likelihood of the
comparisons the proposal touched and the full log prior, and accepts with
probability `min(1, exp(Δ))` where

```text
Δ = ln p(θ') + ln L(θ') + ln H - ln p(θ) - ln L(θ)
```

Gibbs proposals are always accepted. Before each proposal the chain copies
only the parts of the state the operator can write; a rejection restores
those parts and the cached log-likelihoods of the touched comparisons.

# Examples

```rust
use popdiv_mcmc::chain::{Chain, ChainSettings, RunPlan};
use popdiv_mcmc::config::Config;
use popdiv_mcmc::core::PriorOnly;
use popdiv_mcmc::io::StateLogWriter;

let config = Config::from_yaml_str(r#"
event_time_prior:
    gamma_distribution: {shape: 2.0, scale: 0.5}
event_model_prior:
    uniform: {}
mcmc_settings:
    chain_length: 200
    sample_frequency: 20
comparisons:
- comparison: {label: p1, populations: [a, b]}
- comparison: {label: p2, populations: [c, d]}
"#).unwrap();

let settings = ChainSettings { seed: 42, ignore_data: true, nthreads: 1 };
let mut chain = Chain::from_config(&config, PriorOnly, settings).unwrap();
let mut log = StateLogWriter::from_writer(Vec::new(), chain.log_layout().unwrap(), true).unwrap();
let summary = chain.run(&RunPlan::from_config(&config), &mut log).unwrap();
assert_eq!(summary.generations, 200);
```
*/

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::{ComparisonLikelihood, MarkovChain, StepOutcome};
use crate::error::{McmcError, Result, Site};
use crate::evaluator::LikelihoodEvaluator;
use crate::io::{read_state_log, restore_state, LogLayout, StateLogWriter};
use crate::model::ModelState;
use crate::operators::{Acceptance, Touched};
use crate::rng::RandomStream;
use crate::schedule::OperatorSchedule;
use crate::stats::SampleSummarizer;

const DEFAULT_AUTO_OPTIMIZE_DELAY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSettings {
    pub seed: u64,
    /// Treat every log-likelihood as zero and sample from the prior.
    pub ignore_data: bool,
    pub nthreads: usize,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            ignore_data: false,
            nthreads: 1,
        }
    }
}

/// How long to run and what to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    /// Iterations performed by one call to [`Chain::run`].
    pub total_iterations: usize,
    pub sample_every: usize,
    /// Generations before this one are run but not logged.
    pub burnin: usize,
    /// Operators tune themselves up to and including this generation.
    pub auto_optimize_delay: usize,
}

impl RunPlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            total_iterations: config.chain_length,
            sample_every: config.sample_frequency,
            burnin: config.burnin,
            auto_optimize_delay: config.operators.auto_optimize_delay,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sample_every == 0 {
            return Err(McmcError::config("sample_every must be positive"));
        }
        Ok(())
    }

    fn logs(&self, generation: usize) -> bool {
        generation >= self.burnin && generation % self.sample_every == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Iterations performed by this run.
    pub generations: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub ln_likelihood: f64,
    pub ln_prior: f64,
    pub number_of_events: usize,
    /// Over the samples this run logged; `None` if it logged none.
    pub mean_number_of_events: Option<f64>,
}

pub struct Chain<L> {
    state: ModelState,
    schedule: OperatorSchedule,
    evaluator: LikelihoodEvaluator<L>,
    rng: RandomStream,
    generation: usize,
    ln_likelihoods: Vec<f64>,
    ln_likelihood: f64,
    ln_prior: f64,
    tuning_until: usize,
    tuning_frozen: bool,
}

fn with_location(err: McmcError, generation: usize, operator: &str) -> McmcError {
    match err {
        McmcError::NonFinite {
            quantity,
            value,
            site,
            ..
        } => McmcError::NonFinite {
            quantity,
            value,
            generation,
            site: site.with_operator(operator),
        },
        other => other,
    }
}

impl<L: ComparisonLikelihood> Chain<L> {
    /// Starts a chain at `state` with a validated operator schedule.
    pub fn new(
        state: ModelState,
        schedule: OperatorSchedule,
        likelihood: L,
        settings: ChainSettings,
    ) -> Result<Self> {
        Self::assemble(
            state,
            schedule,
            likelihood,
            settings,
            RandomStream::new(settings.seed),
        )
    }

    /// Builds the initial state and schedule from a configuration. Initial
    /// event heights come from the same random stream as the chain.
    pub fn from_config(config: &Config, likelihood: L, settings: ChainSettings) -> Result<Self> {
        let mut rng = RandomStream::new(settings.seed);
        let state = ModelState::from_config(config, &mut rng)?;
        let schedule = OperatorSchedule::from_config(&config.operators, &state)?;
        let mut chain = Self::assemble(state, schedule, likelihood, settings, rng)?;
        chain.tuning_until = config.operators.auto_optimize_delay;
        Ok(chain)
    }

    /// Continues from the last sample of an existing state log. Tuning
    /// restarts from the configured values and stays frozen when the log is
    /// already past the tuning period.
    pub fn resume_from_log(
        config: &Config,
        likelihood: L,
        settings: ChainSettings,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let table = read_state_log(path)?;
        if table.is_empty() {
            return Err(McmcError::Log(format!(
                "{} holds no samples to continue from",
                path.display()
            )));
        }
        let mut chain = Self::from_config(config, likelihood, settings)?;
        let generation = restore_state(&mut chain.state, &table, table.len() - 1)?;
        chain.generation = generation;
        chain.refresh()?;
        if generation > chain.tuning_until {
            chain.schedule.freeze_all();
            chain.tuning_frozen = true;
        }
        info!(
            generation,
            log = %path.display(),
            ln_likelihood = chain.ln_likelihood,
            "continuing chain"
        );
        Ok(chain)
    }

    fn assemble(
        state: ModelState,
        schedule: OperatorSchedule,
        likelihood: L,
        settings: ChainSettings,
        rng: RandomStream,
    ) -> Result<Self> {
        schedule.validate(&state)?;
        LogLayout::for_state(&state)?;
        let evaluator = LikelihoodEvaluator::new(likelihood, settings.ignore_data, settings.nthreads)?;
        if settings.ignore_data {
            info!("ignoring data, sampling from the prior");
        }
        let mut chain = Self {
            ln_likelihoods: vec![0.0; state.number_of_comparisons()],
            state,
            schedule,
            evaluator,
            rng,
            generation: 0,
            ln_likelihood: 0.0,
            ln_prior: 0.0,
            tuning_until: DEFAULT_AUTO_OPTIMIZE_DELAY,
            tuning_frozen: false,
        };
        chain.refresh()?;
        info!(
            seed = settings.seed,
            comparisons = chain.state.number_of_comparisons(),
            events = chain.state.partition().number_of_events(),
            event_model = chain.state.model_prior().name(),
            operators = chain.schedule.len(),
            threads = chain.evaluator.threads(),
            "chain initialized"
        );
        Ok(chain)
    }

    /// Recomputes every cached likelihood and the prior.
    fn refresh(&mut self) -> Result<()> {
        let ln_likelihoods = self.evaluator.all(&self.state);
        for (i, &lnl) in ln_likelihoods.iter().enumerate() {
            if !lnl.is_finite() {
                return Err(self.non_finite_likelihood(i, lnl, None));
            }
        }
        self.ln_likelihoods = ln_likelihoods;
        self.ln_likelihood = self.ln_likelihoods.iter().sum();
        self.ln_prior = self.state.ln_prior();
        if !self.ln_prior.is_finite() {
            return Err(self.non_finite_prior(None));
        }
        Ok(())
    }

    fn non_finite_likelihood(&self, i: usize, value: f64, operator: Option<&str>) -> McmcError {
        let mut site = Site::new().with_comparison(self.state.comparisons()[i].label());
        if let Some(op) = operator {
            site = site.with_operator(op);
        }
        McmcError::NonFinite {
            quantity: "ln likelihood",
            value,
            generation: self.generation,
            site,
        }
    }

    fn non_finite_prior(&self, operator: Option<&str>) -> McmcError {
        let (site, quantity, value) = self
            .state
            .locate_non_finite_prior()
            .unwrap_or((Site::new(), "ln prior", self.state.ln_prior()));
        McmcError::NonFinite {
            quantity,
            value,
            generation: self.generation,
            site: match operator {
                Some(op) => site.with_operator(op),
                None => site,
            },
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn schedule(&self) -> &OperatorSchedule {
        &self.schedule
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn ln_likelihood(&self) -> f64 {
        self.ln_likelihood
    }

    /// Cached log-likelihood of each comparison.
    pub fn ln_likelihoods(&self) -> &[f64] {
        &self.ln_likelihoods
    }

    pub fn ln_prior(&self) -> f64 {
        self.ln_prior
    }

    pub fn log_layout(&self) -> Result<LogLayout> {
        LogLayout::for_state(&self.state)
    }

    pub fn write_operator_log<W: Write>(&self, writer: W) -> Result<()> {
        self.schedule.write_operator_log(writer)
    }

    fn write_sample<W: Write>(
        &self,
        log: &mut StateLogWriter<W>,
        events: &mut SampleSummarizer,
    ) -> Result<()> {
        log.write_sample(
            self.generation,
            self.ln_likelihood,
            self.ln_prior,
            &self.ln_likelihoods,
            &self.state,
        )?;
        events.observe(self.state.partition().number_of_events());
        debug!(generation = self.generation, "sample written");
        Ok(())
    }

    /// Runs `plan.total_iterations` iterations, logging samples to `log`.
    pub fn run<W: Write>(&mut self, plan: &RunPlan, log: &mut StateLogWriter<W>) -> Result<RunSummary> {
        self.run_inner(plan, log, None)
    }

    /// Like [`Chain::run`], updating `pb` about twice a second.
    pub fn run_with_progress<W: Write>(
        &mut self,
        plan: &RunPlan,
        log: &mut StateLogWriter<W>,
        pb: &ProgressBar,
    ) -> Result<RunSummary> {
        self.run_inner(plan, log, Some(pb))
    }

    const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

    fn run_inner<W: Write>(
        &mut self,
        plan: &RunPlan,
        log: &mut StateLogWriter<W>,
        pb: Option<&ProgressBar>,
    ) -> Result<RunSummary> {
        plan.validate()?;
        if log.layout() != &self.log_layout()? {
            return Err(McmcError::Log(
                "state log columns do not match the chain".into(),
            ));
        }
        self.tuning_until = plan.auto_optimize_delay;

        let mut events = SampleSummarizer::new();
        if self.generation == 0 && plan.burnin == 0 {
            self.write_sample(log, &mut events)?;
        }
        info!(
            start = self.generation,
            iterations = plan.total_iterations,
            sample_every = plan.sample_every,
            burnin = plan.burnin,
            "running chain"
        );

        if let Some(pb) = pb {
            pb.set_length(plan.total_iterations as u64);
        }
        let mut accepted = 0_usize;
        let mut last_update = Instant::now();
        for i in 0..plan.total_iterations {
            let outcome = self.step()?;
            if outcome.accepted {
                accepted += 1;
            }
            if plan.logs(self.generation) {
                self.write_sample(log, &mut events)?;
            }
            if let Some(pb) = pb {
                if last_update.elapsed() >= Self::UPDATE_INTERVAL || i + 1 == plan.total_iterations {
                    pb.set_position(i as u64 + 1);
                    pb.set_message(format!(
                        "p(accept)≈{:.2} events={}",
                        accepted as f64 / (i + 1) as f64,
                        self.state.partition().number_of_events()
                    ));
                    last_update = Instant::now();
                }
            }
        }
        log.flush()?;

        let summary = RunSummary {
            generations: plan.total_iterations,
            accepted,
            rejected: plan.total_iterations - accepted,
            ln_likelihood: self.ln_likelihood,
            ln_prior: self.ln_prior,
            number_of_events: self.state.partition().number_of_events(),
            mean_number_of_events: events.mean(),
        };
        info!(
            generation = self.generation,
            accepted = summary.accepted,
            rejected = summary.rejected,
            ln_likelihood = summary.ln_likelihood,
            "run finished"
        );
        Ok(summary)
    }
}

impl<L: ComparisonLikelihood> MarkovChain for Chain<L> {
    type State = ModelState;

    fn step(&mut self) -> Result<StepOutcome> {
        self.generation += 1;
        let generation = self.generation;
        let index = self.schedule.draw(&mut self.rng);
        let name = self.schedule.get(index).operator.name();

        let snapshot = self.state.snapshot(self.schedule.get(index).operator.writes());
        let proposal = match self.schedule.get(index).operator.propose(
            &mut self.state,
            &mut self.rng,
            &self.evaluator,
        ) {
            Ok(p) => p,
            Err(e) => return Err(with_location(e, generation, name)),
        };

        let updated: Vec<usize> = match &proposal.touched {
            Touched::None => Vec::new(),
            Touched::All => (0..self.state.number_of_comparisons()).collect(),
            Touched::Comparisons(indices) => indices.clone(),
        };
        let cached: Vec<f64> = updated.iter().map(|&i| self.ln_likelihoods[i]).collect();
        if !updated.is_empty() {
            let values = self.evaluator.comparisons(&self.state, &updated);
            for (&i, &lnl) in updated.iter().zip(&values) {
                if !lnl.is_finite() {
                    return Err(self.non_finite_likelihood(i, lnl, Some(name)));
                }
                self.ln_likelihoods[i] = lnl;
            }
        }
        let ln_likelihood: f64 = self.ln_likelihoods.iter().sum();
        let ln_prior = self.state.ln_prior();
        if !ln_prior.is_finite() {
            return Err(self.non_finite_prior(Some(name)));
        }

        let (accepted, acceptance_probability) = match proposal.acceptance {
            Acceptance::Gibbs => (true, 1.0),
            Acceptance::Hastings(ln_hastings) => {
                let delta = ln_prior + ln_likelihood + ln_hastings - self.ln_prior - self.ln_likelihood;
                if delta.is_nan() {
                    return Err(McmcError::NonFinite {
                        quantity: "ln acceptance ratio",
                        value: delta,
                        generation,
                        site: Site::new().with_operator(name),
                    });
                }
                (self.rng.uniform().ln() < delta, delta.exp().min(1.0))
            }
        };

        if generation <= self.tuning_until {
            if let Acceptance::Hastings(_) = proposal.acceptance {
                if let Some(tuning) = self.schedule.get_mut(index).operator.tuning_mut() {
                    tuning.observe(acceptance_probability);
                }
            }
        } else if !self.tuning_frozen {
            self.schedule.freeze_all();
            self.tuning_frozen = true;
            debug!(generation, "operator tuning frozen");
        }

        if accepted {
            self.ln_likelihood = ln_likelihood;
            self.ln_prior = ln_prior;
        } else {
            self.state.restore(snapshot);
            for (&i, &lnl) in updated.iter().zip(&cached) {
                self.ln_likelihoods[i] = lnl;
            }
        }
        self.schedule.record(index, accepted);

        if generation % 10_000 == 0 {
            if let Some(rate) = self.schedule.get(index).acceptance_rate() {
                if rate < 0.01 {
                    warn!(operator = name, rate, "operator is almost never accepted");
                }
            }
        }

        Ok(StepOutcome {
            generation,
            operator: index,
            accepted,
            acceptance_probability,
        })
    }

    fn current_state(&self) -> &ModelState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ComparisonView, PriorOnly};

    const SEED: u64 = 42;

    fn config(model: &str) -> Config {
        Config::from_yaml_str(&format!(
            r#"
event_time_prior:
    gamma_distribution: {{shape: 4.0, scale: 0.25}}
event_model_prior:
    {model}
mcmc_settings:
    chain_length: 500
    sample_frequency: 50
operator_settings:
    auto_optimize_delay: 100
global_comparison_settings:
    parameters:
        population_size:
            estimate: true
            prior: {{gamma_distribution: {{shape: 5.0, scale: 0.2}}}}
comparisons:
- comparison: {{label: p1, populations: [a, b]}}
- comparison: {{label: p2, populations: [c, d]}}
- comparison: {{label: p3, populations: [e]}}
"#
        ))
        .unwrap()
    }

    fn prior_settings() -> ChainSettings {
        ChainSettings {
            seed: SEED,
            ignore_data: true,
            nthreads: 1,
        }
    }

    #[test]
    fn cached_likelihood_matches_recomputation() {
        let likelihood = |view: &ComparisonView<'_>| {
            -(view.height - 0.7).powi(2) - (view.comparison.population_size(0) - 1.0).powi(2)
        };
        let settings = ChainSettings {
            ignore_data: false,
            ..prior_settings()
        };
        let mut chain = Chain::from_config(&config("dirichlet_process: {}"), likelihood, settings).unwrap();
        for _ in 0..300 {
            chain.step().unwrap();
            let direct: Vec<f64> = (0..3)
                .map(|i| likelihood(&chain.state().view(i)))
                .collect();
            assert_eq!(chain.ln_likelihoods(), direct.as_slice());
            assert_eq!(chain.ln_likelihood(), direct.iter().sum::<f64>());
            assert_eq!(chain.ln_prior(), chain.state().ln_prior());
        }
    }

    #[test]
    fn tuning_freezes_after_delay() {
        let mut chain = Chain::from_config(&config("uniform: {}"), PriorOnly, prior_settings()).unwrap();
        let mut log = StateLogWriter::from_writer(Vec::new(), chain.log_layout().unwrap(), true).unwrap();
        let plan = RunPlan::from_config(&config("uniform: {}"));
        chain.run(&plan, &mut log).unwrap();
        let scaler = chain
            .schedule()
            .iter()
            .find(|e| e.operator.name() == "EventTimeScaler")
            .unwrap();
        let tuning = scaler.operator.tuning().unwrap();
        assert_eq!(tuning.phase(), crate::operators::TuningPhase::Frozen);
        assert!(tuning.updates() > 0);
    }

    #[test]
    fn samples_are_logged_on_schedule() {
        let c = config("fixed: [0, 0, 1]");
        let mut chain = Chain::from_config(&c, PriorOnly, prior_settings()).unwrap();
        let mut log = StateLogWriter::from_writer(Vec::new(), chain.log_layout().unwrap(), true).unwrap();
        let plan = RunPlan {
            burnin: 100,
            ..RunPlan::from_config(&c)
        };
        let summary = chain.run(&plan, &mut log).unwrap();
        assert_eq!(summary.generations, 500);
        assert_eq!(summary.accepted + summary.rejected, 500);
        assert_eq!(summary.mean_number_of_events, Some(2.0));

        let bytes = log.into_inner().unwrap();
        let table = crate::io::state_log::read_state_log_from(bytes.as_slice()).unwrap();
        let generations: Vec<f64> = table.column("generation").unwrap().to_vec();
        assert_eq!(generations, vec![100.0, 150.0, 200.0, 250.0, 300.0, 350.0, 400.0, 450.0, 500.0]);
    }

    #[test]
    fn non_finite_likelihood_names_the_comparison() {
        let likelihood = |view: &ComparisonView<'_>| {
            if view.comparison.label() == "p2" {
                f64::NAN
            } else {
                0.0
            }
        };
        let settings = ChainSettings {
            ignore_data: false,
            ..prior_settings()
        };
        match Chain::from_config(&config("uniform: {}"), likelihood, settings) {
            Err(McmcError::NonFinite { site, generation, .. }) => {
                assert_eq!(generation, 0);
                assert_eq!(site.comparison.as_deref(), Some("p2"));
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("a NaN likelihood must stop the chain"),
        }
    }

    #[test]
    fn mismatched_log_layout_is_rejected() {
        let mut chain = Chain::from_config(&config("uniform: {}"), PriorOnly, prior_settings()).unwrap();
        let estimated = config(
            "dirichlet_process: {parameters: {concentration: {value: 1.0, estimate: true}}}",
        );
        let other = Chain::from_config(&estimated, PriorOnly, prior_settings()).unwrap();
        let mut log = StateLogWriter::from_writer(Vec::new(), other.log_layout().unwrap(), true).unwrap();
        let plan = RunPlan::from_config(&config("uniform: {}"));
        assert!(matches!(chain.run(&plan, &mut log), Err(McmcError::Log(_))));
    }
}
