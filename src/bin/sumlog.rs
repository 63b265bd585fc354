//! Summarizes one or more state logs written by `popdiv`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn, Level};

use popdiv_mcmc::io::read_state_log;
use popdiv_mcmc::stats::{potential_scale_reduction, summarize_table};
use popdiv_mcmc::Result;

#[derive(Parser, Debug)]
#[command(version, about = "Summarize popdiv state logs")]
struct Args {
    /// State logs; the scale reduction factor is reported when there are several.
    #[arg(required = true)]
    logs: Vec<PathBuf>,

    /// Number of samples to drop from the start of each log.
    #[arg(long, default_value_t = 0)]
    burnin: usize,

    #[arg(long, default_value = "warn")]
    log_level: Level,
}

fn run(args: &Args) -> Result<()> {
    let tables = args
        .logs
        .iter()
        .map(read_state_log)
        .collect::<Result<Vec<_>>>()?;

    for (path, table) in args.logs.iter().zip(&tables) {
        println!("{}", path.display());
        println!("column\tn\tmean\tvariance\tmin\tmax");
        for s in summarize_table(table, args.burnin)? {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                s.name, s.n, s.mean, s.variance, s.min, s.max
            );
        }
        println!();
    }

    if tables.len() > 1 {
        println!("column\tpsrf");
        for (name, psrf) in potential_scale_reduction(&tables, args.burnin)? {
            if psrf > 1.2 {
                warn!(column = %name, psrf, "chains have not converged");
            }
            println!("{name}\t{psrf}");
        }
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
