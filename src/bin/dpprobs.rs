//! Prior probabilities of the number of divergence events under a
//! Dirichlet-process event model, for choosing a concentration prior.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};

use popdiv_mcmc::distributions::ContinuousDistribution;
use popdiv_mcmc::math::{
    dp_category_count_probabilities, dp_concentration_for_expected_categories,
    dp_expected_categories, dp_mixed_category_count_probabilities, ln_stirling2_row,
};
use popdiv_mcmc::rng::RandomStream;
use popdiv_mcmc::{McmcError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ValueKind {
    /// VALUE is the concentration.
    Concentration,
    /// VALUE is the expected number of events.
    Mean,
}

#[derive(Parser, Debug)]
#[command(version, about = "Event-count probabilities under a Dirichlet-process prior")]
struct Args {
    /// Concentration, or expected number of events (see --parameter).
    value: f64,

    /// Number of comparisons.
    comparisons: usize,

    #[arg(short, long, value_enum, default_value_t = ValueKind::Mean)]
    parameter: ValueKind,

    /// Shape of a gamma prior on the concentration. Its scale is chosen so
    /// the prior mean equals the concentration.
    #[arg(long)]
    shape: Option<f64>,

    /// Concentration draws averaged over when --shape is given.
    #[arg(short = 'n', long, default_value_t = 100_000)]
    samples: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn run(args: &Args) -> Result<()> {
    let n = args.comparisons;
    if n < 2 {
        return Err(McmcError::Config("at least two comparisons are needed".into()));
    }
    if !(args.value > 0.0) {
        return Err(McmcError::Config(format!(
            "value must be positive, got {}",
            args.value
        )));
    }
    let alpha = match args.parameter {
        ValueKind::Concentration => args.value,
        ValueKind::Mean => dp_concentration_for_expected_categories(args.value, n)?,
    };

    let probs = match args.shape {
        None => {
            info!(
                concentration = alpha,
                expected_events = dp_expected_categories(alpha, n),
                comparisons = n,
                "fixed concentration"
            );
            dp_category_count_probabilities(alpha, n)
        }
        Some(shape) => {
            if args.samples == 0 {
                return Err(McmcError::Config("--samples must be positive".into()));
            }
            let prior = ContinuousDistribution::gamma(shape, alpha / shape)?;
            info!(
                %prior,
                comparisons = n,
                samples = args.samples,
                seed = args.seed,
                "concentration drawn from its prior"
            );
            let mut rng = RandomStream::new(args.seed);
            dp_mixed_category_count_probabilities(|| prior.draw(&mut rng), n, args.samples)
        }
    };

    let partitions = ln_stirling2_row(n);
    println!("events\tprobability\tpartitions");
    for (i, p) in probs.iter().enumerate() {
        println!("{}\t{p}\t{}", i + 1, partitions[i + 1].exp().round());
    }
    let mean: f64 = probs.iter().enumerate().map(|(i, p)| (i + 1) as f64 * p).sum();
    info!(mean_events = mean, "done");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
