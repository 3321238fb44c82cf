use std::env;
use std::fs;

use anyhow::{bail, Context, Result};
use tracing::info;

use water_resource_optimizer::config::Config;
use water_resource_optimizer::distribution::{self, DistributionRequest};
use water_resource_optimizer::optimizer::WeightSweep;
use water_resource_optimizer::sample;
use water_resource_optimizer::telemetry;
use water_resource_optimizer::{
    AllocationStrategy, DemandBatch, LinearAllocator, NonlinearAllocator, SectoralAllocator,
};

const SAMPLE_SEED: u64 = 42;
const SAMPLE_DAYS: usize = 7;

fn load_batch(path: Option<&str>) -> Result<DemandBatch> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            DemandBatch::from_json(&json)
        }
        None => {
            info!(seed = SAMPLE_SEED, days = SAMPLE_DAYS, "no input file, generating sample batch");
            sample::sample_batch(SAMPLE_SEED, SAMPLE_DAYS)
        }
    }
}

fn main() -> Result<()> {
    telemetry::init_tracing();
    let config = Config::load()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mode = args.first().map(String::as_str).unwrap_or("linear");
    let input = args.get(1).map(String::as_str);

    match mode {
        "linear" | "nonlinear" | "sectoral" => {
            let batch = load_batch(input)?;
            let run = match mode {
                "linear" => LinearAllocator.allocate(&batch, &config.run)?,
                "nonlinear" => NonlinearAllocator::default().allocate(&batch, &config.run)?,
                _ => SectoralAllocator::default().allocate(&batch, &config.run)?,
            };
            println!("{}", serde_json::to_string_pretty(&run.summary)?);
            if run.summary.status.is_failure() {
                bail!(
                    "{} allocation ended with status {}",
                    mode,
                    run.summary.status
                );
            }
        }
        "sweep" => {
            let batch = load_batch(input)?;
            let samples = WeightSweep::default().sweep(&batch, &config.run)?;
            let front = WeightSweep::pareto_front(&samples);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "samples": samples,
                    "pareto_front": front,
                }))?
            );
        }
        "distribute" => {
            let path = input.context("distribute mode requires a request JSON file")?;
            let json = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            let request: DistributionRequest = serde_json::from_str(&json)?;
            let outcome = distribution::distribute(&request);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        other => bail!("unknown mode {other}; expected linear|nonlinear|sectoral|sweep|distribute"),
    }
    Ok(())
}
