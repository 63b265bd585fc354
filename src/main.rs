//! Command-line front end: runs a chain described by a YAML configuration.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, Level};

use popdiv_mcmc::chain::{Chain, ChainSettings, RunPlan};
use popdiv_mcmc::config::Config;
use popdiv_mcmc::core::PriorOnly;
use popdiv_mcmc::io::StateLogWriter;
use popdiv_mcmc::{McmcError, Result};

#[derive(Parser, Debug)]
#[command(version, about = "Estimate shared population divergence times by MCMC")]
struct Args {
    /// YAML configuration file.
    config: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Sample from the prior.
    #[arg(long)]
    ignore_data: bool,

    #[arg(long, default_value_t = 1)]
    nthreads: usize,

    /// Prefix of the output files.
    #[arg(long, default_value = "")]
    prefix: String,

    /// Continue from the last sample of this state log, appending to it.
    #[arg(long, value_name = "LOG")]
    continue_from: Option<PathBuf>,

    /// Hide the progress bar.
    #[arg(long)]
    quiet: bool,

    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn run(args: &Args) -> Result<()> {
    let config = Config::from_path(&args.config)?;
    if !args.ignore_data {
        return Err(McmcError::Config(
            "no data likelihood is available from the command line; use --ignore-data to sample \
             from the prior"
                .into(),
        ));
    }
    let settings = ChainSettings {
        seed: args.seed,
        ignore_data: args.ignore_data,
        nthreads: args.nthreads,
    };

    let (mut chain, mut log) = match &args.continue_from {
        Some(path) => {
            let chain = Chain::resume_from_log(&config, PriorOnly, settings, path)?;
            let log = StateLogWriter::append(path, chain.log_layout()?)?;
            (chain, log)
        }
        None => {
            let chain = Chain::from_config(&config, PriorOnly, settings)?;
            let path = format!("{}state.log", args.prefix);
            let log = StateLogWriter::create(&path, chain.log_layout()?)?;
            info!(path = %path, "writing state log");
            (chain, log)
        }
    };

    let plan = RunPlan::from_config(&config);
    let summary = if args.quiet {
        chain.run(&plan, &mut log)?
    } else {
        let pb = ProgressBar::new(plan.total_iterations as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb.set_prefix("popdiv");
        let summary = chain.run_with_progress(&plan, &mut log, &pb)?;
        pb.finish_with_message("Done!");
        summary
    };

    let operator_log = format!("{}operator.log", args.prefix);
    chain.write_operator_log(File::create(&operator_log)?)?;
    info!(path = %operator_log, "wrote operator log");

    println!(
        "generations: {}\naccepted: {}\nrejected: {}\nfinal ln likelihood: {}\nfinal ln prior: {}",
        summary.generations,
        summary.accepted,
        summary.rejected,
        summary.ln_likelihood,
        summary.ln_prior
    );
    if let Some(mean) = summary.mean_number_of_events {
        println!("mean number of events: {mean:.4}");
    }
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
