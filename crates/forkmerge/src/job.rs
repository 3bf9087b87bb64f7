//! Running a task as a fork/merge job.
//!
//! A job goes through four stages: the task plans one assignment per
//! worker, the workers run as separate processes, the parent waits for all
//! of them, and finally the sinks are read back in worker order and merged.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::task;

use crate::{
    config::JobConfig,
    error::{JobError, WorkerFailure},
    launcher,
    partition::{Assignment, PartitionError},
    sink::{self, Record, ScratchDir, SinkWriter},
};

/// The worker side of a task.
///
/// A scanner is rebuilt inside every worker process from the job input
/// written to its stdin.
pub trait Scan: Sized {
    type Record: Record;

    /// Decodes the job input.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerFailure::Input`] if the input is malformed.
    fn decode_input(input: &[u8]) -> Result<Self, WorkerFailure>;

    /// Scans every unit of `assignment`, pushing qualifying records.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot be completed.
    fn scan<W>(
        &self,
        assignment: &Assignment,
        sink: &mut SinkWriter<Self::Record, W>,
    ) -> Result<(), WorkerFailure>
    where
        W: std::io::Write;
}

/// Record type produced by the workers of task `T`.
pub type TaskRecord<T> = <<T as Task>::Worker as Scan>::Record;

/// The parent side of a task.
pub trait Task {
    /// Name of the worker subcommand.
    const NAME: &'static str;
    /// Prefix of the sink files.
    const SINK_PREFIX: &'static str;

    type Worker: Scan;
    type Output;

    /// Computes one assignment per worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the work cannot be split across `workers`.
    fn plan(&self, workers: usize) -> Result<Vec<Assignment>, PartitionError>;

    /// Input copied to every worker.
    fn shared_input(&self) -> Vec<u8> {
        vec![]
    }

    /// Combines the worker results, given in worker-index order.
    ///
    /// # Errors
    ///
    /// Returns an error if the results are inconsistent.
    fn merge(&self, parts: Vec<Vec<TaskRecord<Self>>>) -> Result<Self::Output, JobError>;
}

/// Result of a successful job.
#[derive(Debug, Clone)]
pub struct JobReport<O> {
    pub output: O,
    pub workers: usize,
    /// Time from the first spawn to the end of the merge.
    pub elapsed: Duration,
}

/// Runs `task` on `workers` worker processes.
///
/// Sinks are removed whether the job succeeds or not. Worker logs are
/// removed on success unless `config.keep_logs` is set.
///
/// # Errors
///
/// Returns an error naming the stage that failed; see [`JobError::stage`].
pub async fn run_job<T>(
    task: &T,
    workers: usize,
    config: &JobConfig,
) -> Result<JobReport<T::Output>, JobError>
where
    T: Task,
{
    let assignments = task.plan(workers)?;
    let scratch = open_scratch(config.scratch_dir.clone(), T::SINK_PREFIX).await?;
    let payload = Arc::<[u8]>::from(task.shared_input());

    let start = Instant::now();
    let res = match launcher::launch(T::NAME, &assignments, payload, &scratch, config).await {
        Ok(()) => match collect::<TaskRecord<T>>(&scratch, assignments.len()).await {
            Ok(parts) => task.merge(parts),
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };
    let elapsed = start.elapsed();

    scratch.remove(assignments.len(), res.is_ok() && !config.keep_logs);
    Ok(JobReport {
        output: res?,
        workers: assignments.len(),
        elapsed,
    })
}

async fn open_scratch(dir: PathBuf, prefix: &'static str) -> Result<ScratchDir, JobError> {
    let res = task::spawn_blocking({
        let dir = dir.clone();
        move || ScratchDir::open(&dir, prefix)
    })
    .await;
    match res {
        Ok(Ok(scratch)) => Ok(scratch),
        Ok(Err(source)) => Err(JobError::Scratch { path: dir, source }),
        Err(e) => Err(JobError::Scratch {
            path: dir,
            source: std::io::Error::other(e),
        }),
    }
}

/// Reads the sinks of workers `0..workers` in index order.
async fn collect<R>(scratch: &ScratchDir, workers: usize) -> Result<Vec<Vec<R>>, JobError>
where
    R: Record,
{
    let paths = (0..workers)
        .map(|i| scratch.sink_path(i))
        .collect::<Vec<_>>();
    let read_all = move || -> Result<Vec<Vec<R>>, JobError> {
        paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                sink::read_sink(path).map_err(|source| JobError::Sink { index, source })
            })
            .collect()
    };
    match task::spawn_blocking(read_all).await {
        Ok(res) => res,
        Err(e) => Err(JobError::Sink {
            index: 0,
            source: sink::SinkError::Io {
                path: scratch.dir().to_owned(),
                source: std::io::Error::other(e),
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use forkmerge_test_utils::workspace;

    use super::*;
    use crate::{
        config::WorkerProgram,
        error::{ExitReason, Stage, WorkerExit},
        merge,
        partition,
    };

    /// A task whose workers are shell scripts.
    ///
    /// The script sees the worker arguments as `$1...`, so `$8` is the sink.
    struct ShellTask {
        low: u64,
        high: u64,
    }

    struct NeverScans;

    impl Scan for NeverScans {
        type Record = u64;

        fn decode_input(_input: &[u8]) -> Result<Self, WorkerFailure> {
            Ok(Self)
        }

        fn scan<W>(&self, _: &Assignment, _: &mut SinkWriter<u64, W>) -> Result<(), WorkerFailure>
        where
            W: std::io::Write,
        {
            Ok(())
        }
    }

    impl Task for ShellTask {
        const NAME: &'static str = "shell";
        const SINK_PREFIX: &'static str = "temp_shell";

        type Worker = NeverScans;
        type Output = Vec<u64>;

        fn plan(&self, workers: usize) -> Result<Vec<Assignment>, PartitionError> {
            Ok(partition::partition(self.low, self.high, workers)?
                .into_iter()
                .map(Assignment::from)
                .collect())
        }

        fn shared_input(&self) -> Vec<u8> {
            b"shared\n".to_vec()
        }

        fn merge(&self, parts: Vec<Vec<u64>>) -> Result<Vec<u64>, JobError> {
            Ok(merge::merge_sequence(parts, false))
        }
    }

    fn shell(script: &str, dir: &std::path::Path) -> JobConfig {
        let program = WorkerProgram::new("/bin/sh").arg("-c").arg(script).arg("sh");
        JobConfig::new(program, dir).echo_worker_stderr(false)
    }

    // $1=worker $2=shell $3=--index $4=I $5=--assignment $6=A $7=--sink $8=PATH
    const WRITE_INDEX: &str = r#"read line; [ "$line" = shared ] || exit 3; echo "$4" > "$8""#;

    #[tokio::test]
    async fn merges_sinks_in_worker_order() -> Result<(), anyhow::Error> {
        let ws = workspace!("merges_sinks_in_worker_order")?;
        let config = shell(WRITE_INDEX, ws.dir());
        let task = ShellTask { low: 1, high: 10 };

        let report = run_job(&task, 4, &config).await?;
        assert_eq!(report.output, [0, 1, 2, 3]);
        assert_eq!(report.workers, 4);
        assert_eq!(ws.files_with_prefix("temp_shell")?, Vec::<String>::new());
        Ok(())
    }

    #[tokio::test]
    async fn worker_exit_status_fails_job() -> Result<(), anyhow::Error> {
        let ws = workspace!("worker_exit_status_fails_job")?;
        let script = r#"[ "$4" = 2 ] && { echo "no luck" >&2; exit 5; }; echo "$4" > "$8""#;
        let config = shell(script, ws.dir());
        let task = ShellTask { low: 1, high: 10 };

        let err = run_job(&task, 3, &config).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Worker);
        assert!(matches!(
            err,
            JobError::Worker {
                index: 2,
                exit: WorkerExit::Reason(ExitReason::Singular),
                failed: 1,
            }
        ));
        assert!(ws.files_with_prefix("temp_shell_")?.iter().all(|f| f.ends_with(".log")));
        assert_eq!(fs::read_to_string(ws.dir().join("temp_shell_2.log"))?, "no luck\n");
        Ok(())
    }

    #[tokio::test]
    async fn missing_sink_fails_merge() -> Result<(), anyhow::Error> {
        let ws = workspace!("missing_sink_fails_merge")?;
        let script = r#"[ "$4" = 1 ] || echo "$4" > "$8""#;
        let config = shell(script, ws.dir());
        let task = ShellTask { low: 1, high: 10 };

        let err = run_job(&task, 3, &config).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Merge);
        assert!(matches!(err, JobError::Sink { index: 1, .. }));
        Ok(())
    }

    #[tokio::test]
    async fn signal_death_fails_job() -> Result<(), anyhow::Error> {
        let ws = workspace!("signal_death_fails_job")?;
        let config = shell("kill -9 $$", ws.dir());
        let task = ShellTask { low: 1, high: 10 };

        let err = run_job(&task, 2, &config).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::Worker {
                exit: WorkerExit::Signal(9),
                failed: 2,
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn deadline_kills_outstanding_workers() -> Result<(), anyhow::Error> {
        let ws = workspace!("deadline_kills_outstanding_workers")?;
        let script = r#"[ "$4" = 0 ] && exec sleep 30; echo "$4" > "$8""#;
        let config = shell(script, ws.dir()).deadline(Some(Duration::from_secs(2)));
        let task = ShellTask { low: 1, high: 10 };

        let start = Instant::now();
        let err = run_job(&task, 3, &config).await.unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(20));
        assert_eq!(err.stage(), Stage::Deadline);
        let JobError::Deadline { outstanding, .. } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(outstanding, [0]);
        assert!(ws.files_with_prefix("temp_shell_")?.iter().all(|f| f.ends_with(".log")));
        Ok(())
    }

    #[tokio::test]
    async fn spawn_failure_fails_job() -> Result<(), anyhow::Error> {
        let ws = workspace!("spawn_failure_fails_job")?;
        let program = WorkerProgram::new(ws.dir().join("no-such-program"));
        let config = JobConfig::new(program, ws.dir());
        let task = ShellTask { low: 1, high: 10 };

        let err = run_job(&task, 2, &config).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Spawn);
        assert!(matches!(err, JobError::Spawn { index: 0, .. }));
        Ok(())
    }

    #[tokio::test]
    async fn partway_spawn_failure_reaps_started_workers() -> Result<(), anyhow::Error> {
        let ws = workspace!("partway_spawn_failure_reaps_started_workers")?;
        // worker 1 cannot get a log file
        fs::create_dir(ws.dir().join("temp_shell_1.log"))?;
        let script = r#"echo "$4" > "$8"; echo "worker $4 done" >&2"#;
        let config = shell(script, ws.dir());
        let task = ShellTask { low: 1, high: 10 };

        let err = run_job(&task, 3, &config).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Spawn);
        assert!(matches!(err, JobError::Spawn { index: 1, .. }));

        assert_eq!(
            fs::read_to_string(ws.dir().join("temp_shell_0.log"))?,
            "worker 0 done\n"
        );
        assert!(!ws.dir().join("temp_shell_0").exists());
        assert!(!ws.dir().join("temp_shell_2.log").exists());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_partition_spawns_nothing() -> Result<(), anyhow::Error> {
        let ws = workspace!("invalid_partition_spawns_nothing")?;
        let config = shell(WRITE_INDEX, ws.dir());
        let task = ShellTask { low: 1, high: 3 };

        let err = run_job(&task, 4, &config).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Partition);
        assert!(ws.files_with_prefix("temp_shell")?.is_empty());
        Ok(())
    }
}
