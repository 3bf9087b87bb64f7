//! `forkmerge solve`: Cramer's rule solver.

use std::{
    ffi::OsString,
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::Context as _;
use forkmerge::run_job;
use forkmerge_params::SOLVER_WORKERS;
use forkmerge_tasks::linsolve::{CramerSolve, LinearSystem};

use crate::args::{self, JobOptions, Parser, UsageError};

#[derive(Debug)]
pub struct Params {
    size: Option<usize>,
    input: Option<PathBuf>,
    workers: usize,
    seed: Option<u64>,
    output: Option<PathBuf>,
    job: JobOptions,
}

pub fn parse(args: impl Iterator<Item = OsString>) -> Result<Params, UsageError> {
    let mut parser = Parser::new(args);
    let mut params = Params {
        size: None,
        input: None,
        workers: SOLVER_WORKERS,
        seed: None,
        output: None,
        job: JobOptions::default(),
    };

    while let Some(flag) = parser.next_flag()? {
        match flag.as_str() {
            "--size" => params.size = Some(parser.value(&flag)?),
            "--input" => params.input = Some(parser.value(&flag)?),
            "--workers" => params.workers = parser.value(&flag)?,
            "--seed" => params.seed = Some(parser.value(&flag)?),
            "--output" => params.output = Some(parser.value(&flag)?),
            _ => {
                if !params.job.accept(&flag, &mut parser)? {
                    return Err(UsageError::new(format!("unknown option {flag}")));
                }
            }
        }
    }

    if params.size.is_some() && params.input.is_some() {
        return Err(UsageError::new("--size and --input cannot be given together"));
    }
    if params.size == Some(0) {
        return Err(UsageError::new("system size must be greater than 0"));
    }
    if params.workers == 0 {
        return Err(UsageError::new("worker count must be greater than 0"));
    }
    Ok(params)
}

fn read_size() -> Result<usize, anyhow::Error> {
    let line = args::prompt("Enter N: ")?;
    let line = line.trim();
    let size = line
        .parse::<usize>()
        .with_context(|| format!("invalid system size '{line}'"))?;
    anyhow::ensure!(size > 0, "system size must be greater than 0");
    Ok(size)
}

pub fn run(params: Params) -> Result<(), anyhow::Error> {
    let system = match (&params.input, params.size) {
        (Some(path), _) => LinearSystem::read(path)?,
        (None, size) => {
            let size = match size {
                Some(size) => size,
                None => read_size()?,
            };
            LinearSystem::random(size, &mut crate::seeded_rng(params.seed))
        }
    };

    let start = Instant::now();
    let job = CramerSolve::new(system).context("cannot create job")?;
    let config = params.job.config()?;
    let report =
        crate::block_on(run_job(&job, params.workers, &config))?.map_err(crate::job_failed)?;
    let elapsed = start.elapsed();

    println!("Solutions :");
    for (i, x) in report.output.iter().enumerate() {
        println!("x{} = {x:.2}", i + 1);
    }
    println!("Execution Time: {} ms", elapsed.as_millis());

    if let Some(path) = &params.output {
        write_solution(path, &report.output)
            .with_context(|| format!("cannot write {}", path.display()))?;
    }
    Ok(())
}

/// Writes one unknown per line at full precision.
fn write_solution(path: &Path, x: &[f64]) -> Result<(), anyhow::Error> {
    let mut out = BufWriter::new(File::create(path)?);
    for v in x {
        writeln!(out, "{v}")?;
    }
    out.flush()?;
    Ok(())
}
