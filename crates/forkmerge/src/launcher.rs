//! Spawning worker processes and waiting for all of them.
//!
//! Each worker gets its own copy of the job input on stdin. Its stderr is
//! written to a per-worker log in the scratch directory and, optionally,
//! echoed to our stderr prefixed with `[task#index]`.

use std::{
    fs::File,
    io::{self, Write as _},
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader},
    process::{Child, ChildStderr, ChildStdin, Command},
    task::JoinHandle,
    time,
};

use crate::{
    config::JobConfig,
    error::{JobError, WorkerExit},
    partition::Assignment,
    sink::ScratchDir,
};

/// A spawned worker process and the tasks serving its pipes.
struct RunningWorker {
    index: usize,
    proc: Child,
    stdin_handle: JoinHandle<io::Result<()>>,
    stderr_handle: JoinHandle<io::Result<()>>,
}

impl RunningWorker {
    fn spawn(
        task: &str,
        index: usize,
        assignment: &Assignment,
        scratch: &ScratchDir,
        payload: Arc<[u8]>,
        config: &JobConfig,
    ) -> Result<Self, JobError> {
        let spawn_err = |source| JobError::Spawn { index, source };
        let log = File::create(scratch.log_path(index)).map_err(spawn_err)?;

        let program = &config.program;
        let mut command = Command::new(program.program());
        command
            .args(program.args())
            .args(["worker", task])
            .arg("--index")
            .arg(index.to_string())
            .arg("--assignment")
            .arg(assignment.to_string())
            .arg("--sink")
            .arg(scratch.sink_path(index))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut proc = command.spawn().map_err(spawn_err)?;
        let stdin = proc
            .stdin
            .take()
            .ok_or_else(|| spawn_err(io::Error::other("stdin is not piped")))?;
        let stderr = proc
            .stderr
            .take()
            .ok_or_else(|| spawn_err(io::Error::other("stderr is not piped")))?;

        let stdin_handle = tokio::spawn(handle_stdin(stdin, payload));
        let stderr_handle = tokio::spawn(handle_stderr(
            format!("{task}#{index}"),
            log,
            stderr,
            config.echo_worker_stderr,
        ));

        Ok(Self {
            index,
            proc,
            stdin_handle,
            stderr_handle,
        })
    }

    /// Waits for the pipe tasks to drain after the process has exited.
    async fn join_pipes(self) {
        for (name, handle) in [("stdin", self.stdin_handle), ("stderr", self.stderr_handle)] {
            let res = match handle.await {
                Ok(res) => res,
                Err(e) => Err(io::Error::other(e)),
            };
            if let Err(e) = res {
                eprintln!("forkmerge: worker {} {name} pipe failed: {e}", self.index);
            }
        }
    }
}

async fn handle_stdin(mut stdin: ChildStdin, payload: Arc<[u8]>) -> io::Result<()> {
    match stdin.write_all(&payload).await {
        // the worker stopped reading; its exit status says why
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        res => res?,
    }
    stdin.flush().await?;
    Ok(())
}

async fn handle_stderr(
    tag: String,
    mut log: File,
    stderr: ChildStderr,
    echo: bool,
) -> io::Result<()> {
    let mut lines = BufReader::new(stderr).lines();
    while let Some(line) = lines.next_line().await? {
        writeln!(log, "{line}")?;
        if echo {
            eprintln!("[{tag}] {line}");
        }
    }
    log.flush()
}

/// Blocks until every worker has exited.
///
/// When the deadline passes first, every worker still running is killed and
/// reaped.
async fn wait_all(
    workers: &mut [RunningWorker],
    deadline: Option<Duration>,
) -> Result<Vec<ExitStatus>, JobError> {
    let barrier = async {
        let mut statuses = Vec::with_capacity(workers.len());
        for w in workers.iter_mut() {
            let status = w.proc.wait().await.map_err(|source| JobError::Wait {
                index: w.index,
                source,
            })?;
            statuses.push(status);
        }
        Ok(statuses)
    };

    let Some(deadline) = deadline else {
        return barrier.await;
    };
    let res = time::timeout(deadline, barrier).await;
    if let Ok(res) = res {
        return res;
    }

    let mut outstanding = vec![];
    for w in workers.iter_mut() {
        if matches!(w.proc.try_wait(), Ok(None)) {
            outstanding.push(w.index);
        }
        let _ = w.proc.kill().await;
    }
    Err(JobError::Deadline {
        deadline,
        outstanding,
    })
}

/// Runs one worker per assignment and waits for all of them.
///
/// If a worker cannot be set up (its log file or its process), no further
/// workers are started, but the ones already running are still waited for
/// before the error is returned.
pub(crate) async fn launch(
    task: &str,
    assignments: &[Assignment],
    payload: Arc<[u8]>,
    scratch: &ScratchDir,
    config: &JobConfig,
) -> Result<(), JobError> {
    let mut workers = Vec::with_capacity(assignments.len());
    let mut spawn_error = None;
    for (index, assignment) in assignments.iter().enumerate() {
        match RunningWorker::spawn(
            task,
            index,
            assignment,
            scratch,
            Arc::clone(&payload),
            config,
        ) {
            Ok(worker) => workers.push(worker),
            Err(e) => {
                spawn_error = Some(e);
                break;
            }
        }
    }

    let waited = wait_all(&mut workers, config.deadline).await;
    for worker in workers {
        worker.join_pipes().await;
    }
    if let Some(e) = spawn_error {
        return Err(e);
    }

    let failed = waited?
        .into_iter()
        .enumerate()
        .filter(|(_, status)| !status.success())
        .collect::<Vec<_>>();
    if let Some(&(index, status)) = failed.first() {
        return Err(JobError::Worker {
            index,
            exit: WorkerExit::from_status(status),
            failed: failed.len(),
        });
    }
    Ok(())
}
