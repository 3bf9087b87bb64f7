use std::{
    ffi::OsString,
    fmt::Display,
    io::{self, BufRead as _, Write as _},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use anyhow::Context as _;
use forkmerge::{JobConfig, WorkerProgram};

/// A malformed command line.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(String);

impl UsageError {
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Reads `--name value` options and `--flag` switches.
pub struct Parser<I> {
    args: I,
}

impl<I> Parser<I>
where
    I: Iterator<Item = OsString>,
{
    #[must_use]
    pub fn new(args: I) -> Self {
        Self { args }
    }

    /// Returns the next option name.
    pub fn next_flag(&mut self) -> Result<Option<String>, UsageError> {
        let Some(arg) = self.args.next() else {
            return Ok(None);
        };
        let arg = arg
            .into_string()
            .map_err(|arg| UsageError::new(format!("invalid argument {arg:?}")))?;
        if !arg.starts_with("--") {
            return Err(UsageError::new(format!("unexpected argument '{arg}'")));
        }
        Ok(Some(arg))
    }

    /// Parses the value following `flag`.
    pub fn value<T>(&mut self, flag: &str) -> Result<T, UsageError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self
            .args
            .next()
            .ok_or_else(|| UsageError::new(format!("option {flag} requires a value")))?;
        let value = value.to_string_lossy();
        value
            .parse()
            .map_err(|e| UsageError::new(format!("invalid value '{value}' for {flag}: {e}")))
    }
}

/// Options shared by every command that runs a job.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub scratch: PathBuf,
    pub deadline: Option<Duration>,
    pub keep_logs: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            scratch: PathBuf::from("."),
            deadline: None,
            keep_logs: false,
        }
    }
}

impl JobOptions {
    /// Consumes `flag` if it is a job option, returning whether it was.
    pub fn accept<I>(&mut self, flag: &str, parser: &mut Parser<I>) -> Result<bool, UsageError>
    where
        I: Iterator<Item = OsString>,
    {
        match flag {
            "--scratch" => self.scratch = parser.value(flag)?,
            "--deadline" => {
                let secs = parser.value::<f64>(flag)?;
                let deadline = Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| UsageError::new(format!("invalid deadline {secs}")))?;
                self.deadline = Some(deadline);
            }
            "--keep-logs" => self.keep_logs = true,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Builds a job configuration that re-invokes this executable as worker.
    pub fn config(&self) -> Result<JobConfig, anyhow::Error> {
        let program = WorkerProgram::current_exe().context("cannot locate own executable")?;
        Ok(JobConfig::new(program, &self.scratch)
            .deadline(self.deadline)
            .keep_logs(self.keep_logs))
    }
}

/// Prints `prompt` and reads one line from stdin.
pub fn prompt(prompt: &str) -> Result<String, anyhow::Error> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;
    drop(stdout);

    let mut line = String::new();
    let n = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("cannot read stdin")?;
    anyhow::ensure!(n > 0, "unexpected end of input");
    Ok(line)
}
