//! # popdiv-mcmc
//!
//! MCMC sampler for comparing population divergence times across pairs of
//! populations. Comparisons are grouped into shared divergence events, and
//! the grouping is sampled jointly with event times, population sizes,
//! mutation rates and ancestral frequencies. The prior over groupings is a
//! Dirichlet process (updated by Gibbs sampling), uniform over all set
//! partitions (updated by reversible-jump split/merge moves), or fixed.
//!
//! The likelihood of a comparison's data is supplied by the caller through
//! [`core::ComparisonLikelihood`]; with `ignore_data` the chain samples from
//! the prior.
//!
//! ```rust
//! use popdiv_mcmc::chain::{Chain, ChainSettings, RunPlan};
//! use popdiv_mcmc::config::Config;
//! use popdiv_mcmc::core::ComparisonView;
//! use popdiv_mcmc::io::StateLogWriter;
//!
//! let config = Config::from_yaml_str(r#"
//! event_time_prior:
//!     exponential_distribution: {rate: 5.0}
//! mcmc_settings: {chain_length: 100, sample_frequency: 10}
//! comparisons:
//! - comparison: {label: p1, populations: [a, b]}
//! - comparison: {label: p2, populations: [c, d]}
//! "#).unwrap();
//!
//! // a toy likelihood favouring divergence near 0.2
//! let likelihood = |view: &ComparisonView<'_>| -50.0 * (view.height - 0.2).powi(2);
//! let settings = ChainSettings { seed: 1, ignore_data: false, nthreads: 1 };
//! let mut chain = Chain::from_config(&config, likelihood, settings).unwrap();
//! let mut log = StateLogWriter::from_writer(Vec::new(), chain.log_layout().unwrap(), true).unwrap();
//! chain.run(&RunPlan::from_config(&config), &mut log).unwrap();
//! ```

pub mod chain;
pub mod comparison;
pub mod config;
pub mod core;
pub mod distributions;
pub mod error;
pub mod evaluator;
pub mod io;
pub mod math;
pub mod model;
pub mod operators;
pub mod parameter;
pub mod partition;
pub mod rng;
pub mod schedule;
pub mod stats;

pub use error::{McmcError, Result};
