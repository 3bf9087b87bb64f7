//! Static fork/merge parallel batch execution.
//!
//! A job splits its work into one [`Assignment`](partition::Assignment) per
//! worker, runs every worker as a separate process writing its own sink,
//! waits for all of them, and merges the sinks in worker order.
//!
//! The parent side of a job is described by a [`Task`] and run with
//! [`run_job`]; the worker side is a [`Scan`] run by [`worker::worker_main`]
//! inside the worker process.

pub mod config;
pub mod error;
pub mod job;
mod launcher;
pub mod merge;
pub mod partition;
pub mod sink;
pub mod timing;
pub mod worker;

pub use self::{
    config::{JobConfig, WorkerProgram},
    error::{ExitReason, JobError, Stage, WorkerFailure},
    job::{JobReport, Scan, Task, TaskRecord, run_job},
};
