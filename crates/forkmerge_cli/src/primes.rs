//! `forkmerge primes`: timed prime search sweep.

use std::{ffi::OsString, path::PathBuf};

use anyhow::{Context as _, ensure};
use forkmerge::{JobError, config, partition::PartitionError, run_job, timing::TimingLog};
use forkmerge_params::{DEFAULT_PRIME_HIGH, DEFAULT_PRIME_LOW, PRIME_OUTPUT_FILE, TIMING_LOG_FILE};
use forkmerge_tasks::primes::{self, PrimeSearch};

use crate::args::{self, JobOptions, Parser, UsageError};

#[derive(Debug)]
pub struct Params {
    range: Option<(u64, u64)>,
    workers: Option<usize>,
    max_workers: Option<usize>,
    sort: bool,
    output: PathBuf,
    timing: PathBuf,
    job: JobOptions,
}

pub fn parse(args: impl Iterator<Item = OsString>) -> Result<Params, UsageError> {
    let mut parser = Parser::new(args);
    let mut low = None;
    let mut high = None;
    let mut params = Params {
        range: None,
        workers: None,
        max_workers: None,
        sort: false,
        output: PathBuf::from(PRIME_OUTPUT_FILE),
        timing: PathBuf::from(TIMING_LOG_FILE),
        job: JobOptions::default(),
    };

    while let Some(flag) = parser.next_flag()? {
        match flag.as_str() {
            "--low" => low = Some(parser.value(&flag)?),
            "--high" => high = Some(parser.value(&flag)?),
            "--workers" => params.workers = Some(parser.value(&flag)?),
            "--max-workers" => params.max_workers = Some(parser.value(&flag)?),
            "--sort" => params.sort = true,
            "--output" => params.output = parser.value(&flag)?,
            "--timing" => params.timing = parser.value(&flag)?,
            _ => {
                if !params.job.accept(&flag, &mut parser)? {
                    return Err(UsageError::new(format!("unknown option {flag}")));
                }
            }
        }
    }

    params.range = match (low, high) {
        (Some(low), Some(high)) => Some((low, high)),
        (None, None) => None,
        _ => return Err(UsageError::new("--low and --high must be given together")),
    };
    if params.workers.is_some() && params.max_workers.is_some() {
        return Err(UsageError::new(
            "--workers and --max-workers cannot be given together",
        ));
    }
    if params.workers == Some(0) || params.max_workers == Some(0) {
        return Err(UsageError::new("worker count must be greater than 0"));
    }
    Ok(params)
}

/// Asks for the range, falling back to the defaults on an empty answer.
fn read_range() -> Result<(u64, u64), anyhow::Error> {
    let line = args::prompt("Enter lower and upper range: ")?;
    let mut fields = line.split_whitespace();
    let (Some(low), Some(high), None) = (fields.next(), fields.next(), fields.next()) else {
        ensure!(line.trim().is_empty(), "expected two numbers, got {:?}", line.trim());
        return Ok((DEFAULT_PRIME_LOW, DEFAULT_PRIME_HIGH));
    };
    let low = low.parse().with_context(|| format!("invalid lower bound '{low}'"))?;
    let high = high.parse().with_context(|| format!("invalid upper bound '{high}'"))?;
    Ok((low, high))
}

pub fn run(params: Params) -> Result<(), anyhow::Error> {
    let (low, high) = match params.range {
        Some(range) => range,
        None => read_range()?,
    };
    if low > high {
        let err = JobError::from(PartitionError::EmptyRange { low, high });
        return Err(crate::job_failed(err));
    }
    let search = PrimeSearch::new(low, high).sort(params.sort);

    let cores = config::available_workers();
    println!("Logical cores available: {cores}");

    let counts = match params.workers {
        Some(n) => vec![n],
        None => {
            let units = usize::try_from(search.unit_count()).unwrap_or(usize::MAX);
            let max = params.max_workers.unwrap_or(cores).min(units);
            (1..=max).collect()
        }
    };

    let config = params.job.config()?;
    let mut timing = TimingLog::create(&params.timing)
        .with_context(|| format!("cannot create {}", params.timing.display()))?;

    let mut found = 0;
    for n in counts {
        let report = crate::block_on(run_job(&search, n, &config))?.map_err(crate::job_failed)?;
        primes::write_primes(&params.output, &report.output)
            .with_context(|| format!("cannot write {}", params.output.display()))?;
        println!(
            "Processes = {n}, Time = {:.6} sec",
            report.elapsed.as_secs_f64()
        );
        timing
            .append(n, report.elapsed)
            .with_context(|| format!("cannot append to {}", params.timing.display()))?;
        found = report.output.len();
    }

    println!(
        "{found} primes in [{low}, {high}] written to {}",
        params.output.display()
    );
    Ok(())
}
