use std::{
    fmt, io, os::unix::process::ExitStatusExt as _, path::PathBuf, process::ExitStatus,
    time::Duration,
};

use strum::{Display, FromRepr, IntoStaticStr};

use crate::{merge::MergeError, partition::PartitionError, sink::SinkError};

/// The stage of a job at which it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Partition,
    Scratch,
    Spawn,
    Worker,
    Deadline,
    Merge,
}

/// Why a worker exited unsuccessfully.
///
/// The discriminant is the worker's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum ExitReason {
    Usage = 2,
    Input = 3,
    Sink = 4,
    Singular = 5,
    Panic = 101,
}

impl ExitReason {
    #[must_use]
    pub fn code(self) -> i32 {
        i32::from(self as u8)
    }
}

/// How a failed worker terminated, as seen by the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Reason(ExitReason),
    Code(i32),
    Signal(i32),
    Unknown,
}

impl WorkerExit {
    /// Classifies an unsuccessful exit status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return u8::try_from(code)
                .ok()
                .and_then(ExitReason::from_repr)
                .map_or(Self::Code(code), Self::Reason);
        }
        status.signal().map_or(Self::Unknown, Self::Signal)
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reason(reason) => write!(f, "exited with {reason} error ({})", reason.code()),
            Self::Code(code) => write!(f, "exited with code {code}"),
            Self::Signal(signal) => write!(f, "killed by signal {signal}"),
            Self::Unknown => write!(f, "terminated abnormally"),
        }
    }
}

/// Errors that make a job fail.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("cannot partition work")]
    Partition(#[from] PartitionError),
    #[error("scratch directory {} unavailable", .path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot spawn worker {index}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("cannot wait for worker {index}")]
    Wait {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("worker {index} {exit} ({failed} failed in total)")]
    Worker {
        index: usize,
        exit: WorkerExit,
        failed: usize,
    },
    #[error("workers {outstanding:?} still running after {deadline:?}")]
    Deadline {
        deadline: Duration,
        outstanding: Vec<usize>,
    },
    #[error("cannot collect output of worker {index}")]
    Sink {
        index: usize,
        #[source]
        source: SinkError,
    },
    #[error("cannot merge worker output")]
    Merge(#[from] MergeError),
}

impl JobError {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Partition(_) => Stage::Partition,
            Self::Scratch { .. } => Stage::Scratch,
            Self::Spawn { .. } => Stage::Spawn,
            Self::Wait { .. } | Self::Worker { .. } => Stage::Worker,
            Self::Deadline { .. } => Stage::Deadline,
            Self::Sink { .. } | Self::Merge(_) => Stage::Merge,
        }
    }
}

/// Errors a worker reports before exiting.
#[derive(Debug, thiserror::Error)]
pub enum WorkerFailure {
    #[error("{0}")]
    Usage(String),
    #[error("invalid input: {0}")]
    Input(String),
    #[error("cannot write sink")]
    Sink(#[from] io::Error),
    #[error("coefficient matrix is singular")]
    Singular,
}

impl WorkerFailure {
    #[must_use]
    pub fn reason(&self) -> ExitReason {
        match self {
            Self::Usage(_) => ExitReason::Usage,
            Self::Input(_) => ExitReason::Input,
            Self::Sink(_) => ExitReason::Sink,
            Self::Singular => ExitReason::Singular,
        }
    }
}
