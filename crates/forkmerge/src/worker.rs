//! The worker side of a job.
//!
//! A worker reads the job input from stdin, scans its assignment and writes
//! the records to its sink. Failures are reported on stderr and through the
//! exit code, see [`ExitReason`](crate::error::ExitReason).

use std::{
    error::Error,
    ffi::OsString,
    fmt::Write as _,
    io::{self, Read},
    path::PathBuf,
};

use crate::{
    error::WorkerFailure,
    job::Scan,
    partition::Assignment,
    sink::SinkWriter,
};

/// Command line of a worker, following the task name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerArgs {
    pub index: usize,
    pub assignment: Assignment,
    pub sink: PathBuf,
}

impl WorkerArgs {
    /// Parses `--index I --assignment A --sink PATH` in any order.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerFailure::Usage`] if an option is missing, repeated,
    /// unknown or malformed.
    pub fn parse<I>(args: I) -> Result<Self, WorkerFailure>
    where
        I: IntoIterator<Item = OsString>,
    {
        let usage = WorkerFailure::Usage;

        let mut index = None;
        let mut assignment = None;
        let mut sink = None;

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let flag = flag.to_string_lossy().into_owned();
            let value = args
                .next()
                .ok_or_else(|| usage(format!("option {flag} requires a value")))?;
            let slot_filled = match flag.as_str() {
                "--index" => {
                    let value = value.to_string_lossy();
                    let i = value
                        .parse::<usize>()
                        .map_err(|e| usage(format!("invalid index '{value}': {e}")))?;
                    index.replace(i).is_some()
                }
                "--assignment" => {
                    let value = value.to_string_lossy();
                    let a = value
                        .parse::<Assignment>()
                        .map_err(|e| usage(format!("invalid assignment '{value}': {e}")))?;
                    assignment.replace(a).is_some()
                }
                "--sink" => sink.replace(PathBuf::from(value)).is_some(),
                _ => return Err(usage(format!("unknown option {flag}"))),
            };
            if slot_filled {
                return Err(usage(format!("option {flag} given twice")));
            }
        }

        Ok(Self {
            index: index.ok_or_else(|| usage("missing --index".to_owned()))?,
            assignment: assignment.ok_or_else(|| usage("missing --assignment".to_owned()))?,
            sink: sink.ok_or_else(|| usage("missing --sink".to_owned()))?,
        })
    }
}

/// Runs one worker of scanner `S`, returning the number of records written.
///
/// # Errors
///
/// Returns an error if the input cannot be read or decoded, the scan fails,
/// or the sink cannot be written.
pub fn run_worker<S, R>(args: &WorkerArgs, input: &mut R) -> Result<usize, WorkerFailure>
where
    S: Scan,
    R: Read,
{
    let mut buf = vec![];
    input
        .read_to_end(&mut buf)
        .map_err(|e| WorkerFailure::Input(format!("cannot read stdin: {e}")))?;
    let scanner = S::decode_input(&buf)?;

    let mut sink = SinkWriter::create(&args.sink)?;
    scanner.scan(&args.assignment, &mut sink)?;
    let count = sink.count();
    sink.finish()?;
    Ok(count)
}

/// Entry point of the `worker <task>` subcommand.
///
/// Returns the process exit code.
pub fn worker_main<S>(task: &str, args: impl IntoIterator<Item = OsString>) -> i32
where
    S: Scan,
{
    let args = match WorkerArgs::parse(args) {
        Ok(args) => args,
        Err(e) => {
            report(task, None, &e);
            return e.reason().code();
        }
    };
    match run_worker::<S, _>(&args, &mut io::stdin().lock()) {
        Ok(_) => 0,
        Err(e) => {
            report(task, Some(args.index), &e);
            e.reason().code()
        }
    }
}

fn report(task: &str, index: Option<usize>, err: &WorkerFailure) {
    let mut msg = match index {
        Some(index) => format!("{task} worker {index}: {err}"),
        None => format!("{task} worker: {err}"),
    };
    let mut source = err.source();
    while let Some(e) = source {
        let _ = write!(msg, ": {e}");
        source = e.source();
    }
    eprintln!("{msg}");
}
