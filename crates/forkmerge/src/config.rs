use std::{
    env,
    ffi::OsString,
    io,
    num::NonZero,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

/// The executable started for every worker.
///
/// Workers are invoked as
/// `<program> <args...> worker <task> --index I --assignment A --sink PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerProgram {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerProgram {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
        }
    }

    /// Re-invokes the running executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the path of the running executable is unknown.
    pub fn current_exe() -> io::Result<Self> {
        env::current_exe().map(Self::new)
    }

    /// Adds an argument placed before the worker arguments.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

/// Runtime settings of a job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Executable started for every worker.
    pub program: WorkerProgram,
    /// Directory holding sinks, worker logs and the job lock.
    pub scratch_dir: PathBuf,
    /// Kill all workers and fail the job if the barrier is not reached in
    /// time.
    pub deadline: Option<Duration>,
    /// Keep worker logs even when the job succeeds.
    pub keep_logs: bool,
    /// Forward worker stderr to our own stderr.
    pub echo_worker_stderr: bool,
}

impl JobConfig {
    #[must_use]
    pub fn new(program: WorkerProgram, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            program,
            scratch_dir: scratch_dir.into(),
            deadline: None,
            keep_logs: false,
            echo_worker_stderr: true,
        }
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn keep_logs(mut self, keep_logs: bool) -> Self {
        self.keep_logs = keep_logs;
        self
    }

    #[must_use]
    pub fn echo_worker_stderr(mut self, echo: bool) -> Self {
        self.echo_worker_stderr = echo;
        self
    }
}

/// Returns the number of logical processors, or 1 if it cannot be detected.
#[must_use]
pub fn available_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZero::get)
}
