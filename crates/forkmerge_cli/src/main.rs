use std::{env, ffi::OsString, process};

use anyhow::Context as _;
use forkmerge::{ExitReason, JobError, Task as _, worker};
use forkmerge_tasks::{
    linsolve::{CramerColumns, CramerSolve},
    primes::{PrimeScan, PrimeSearch},
};
use rand::{SeedableRng as _, rngs::StdRng};

use self::args::UsageError;

const PROG: &str = "forkmerge";

const USAGE: &str = "\
Usage: forkmerge <command> [options]

Commands:
  primes    [--low L --high H] [--workers N | --max-workers N] [--sort]
            [--output FILE] [--timing FILE] [JOB OPTIONS]
  solve     [--size N | --input FILE] [--workers N] [--seed S] [--output FILE]
            [JOB OPTIONS]
  generate  [--size N] [--output FILE] [--seed S]
  report    [--timing FILE]

Job options:
  --scratch DIR     directory for worker sinks and logs (default: .)
  --deadline SECS   kill all workers if they have not finished in time
  --keep-logs       keep worker logs after a successful job
";

macro_rules! message {
    ($($msg:tt)*) => {
        ::std::eprintln!("{prog}: {msg}", prog = $crate::PROG, msg = ::std::format_args!($($msg)*))
    };
}

macro_rules! exit {
    ($($msg:tt)*) => {{
        message!($($msg)*);
        ::std::process::exit(1);
    }};
}

macro_rules! usage_and_exit {
    ($($msg:tt)*) => {{
        message!($($msg)*);
        ::std::eprint!("{}", $crate::USAGE);
        ::std::process::exit($crate::ExitReason::Usage.code());
    }};
}

mod args;
mod generate;
mod primes;
mod report;
mod solve;

fn main() {
    let mut args = env::args_os().skip(1);
    let command = args.next().map(|c| c.to_string_lossy().into_owned());
    match command.as_deref() {
        Some("primes") => run(primes::parse(args), primes::run),
        Some("solve") => run(solve::parse(args), solve::run),
        Some("generate") => run(generate::parse(args), generate::run),
        Some("report") => run(report::parse(args), report::run),
        Some("worker") => process::exit(run_worker(args)),
        Some("help" | "--help" | "-h") => print!("{USAGE}"),
        Some(command) => usage_and_exit!("unknown command '{command}'"),
        None => usage_and_exit!("no command given"),
    }
}

fn run<P>(params: Result<P, UsageError>, f: fn(P) -> Result<(), anyhow::Error>) {
    let params = match params {
        Ok(params) => params,
        Err(e) => usage_and_exit!("{e}"),
    };
    if let Err(e) = f(params) {
        exit!("{e:#}");
    }
}

fn run_worker(mut args: impl Iterator<Item = OsString>) -> i32 {
    let task = args.next().map(|t| t.to_string_lossy().into_owned());
    match task.as_deref() {
        Some(task) if task == PrimeSearch::NAME => worker::worker_main::<PrimeScan>(task, args),
        Some(task) if task == CramerSolve::NAME => {
            worker::worker_main::<CramerColumns>(task, args)
        }
        Some(task) => {
            message!("unknown worker task '{task}'");
            ExitReason::Usage.code()
        }
        None => {
            message!("no worker task given");
            ExitReason::Usage.code()
        }
    }
}

/// Runs `fut` to completion on a single-threaded runtime.
fn block_on<F>(fut: F) -> Result<F::Output, anyhow::Error>
where
    F: Future,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    Ok(runtime.block_on(fut))
}

/// Wraps a job failure with the stage it failed at.
fn job_failed(e: JobError) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("job failed at {stage} stage"))
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
