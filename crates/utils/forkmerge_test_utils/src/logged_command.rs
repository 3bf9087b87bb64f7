//! Running the `forkmerge` binary (or any other program) under test.
//!
//! A [`LoggedCommand`] pipes all three standard streams. Whatever the child
//! writes to stdout and stderr is appended to `<name>.out` in the test
//! workspace and kept in memory for assertions.

use std::{
    fs::File,
    io::Write as _,
    path::Path,
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context as _, bail};
use tokio::{
    io::{AsyncRead, AsyncReadExt as _, AsyncWriteExt as _},
    process::{Child, ChildStdin, Command},
    sync::{mpsc, watch},
    task::JoinHandle,
    time,
};

type Log = Arc<Mutex<File>>;

/// Text read so far from one output stream of the child.
struct Captured {
    text: Arc<Mutex<String>>,
    /// Length of `text`, bumped on every read.
    len: watch::Receiver<usize>,
    task: JoinHandle<Result<(), anyhow::Error>>,
}

impl Captured {
    fn spawn<R>(log: Log, pipe: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let text = Arc::new(Mutex::new(String::new()));
        let (len_tx, len) = watch::channel(0);
        let task = tokio::spawn(capture(log, pipe, Arc::clone(&text), len_tx));
        Self { text, len, task }
    }

    async fn finish(self, name: &str) -> Result<String, anyhow::Error> {
        let Self { text, task, .. } = self;
        task.await
            .with_context(|| format!("{name} capture task panicked"))??;
        let text = text.lock().unwrap().clone();
        Ok(text)
    }
}

/// A child process with captured output.
pub struct LoggedCommand {
    proc: Child,
    /// Dropped to close the child's stdin.
    input: Option<mpsc::Sender<Vec<u8>>>,
    feeder: JoinHandle<Result<(), anyhow::Error>>,
    stdout: Captured,
    stderr: Captured,
}

/// What a finished command produced.
#[derive(Debug)]
pub struct Output {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl LoggedCommand {
    /// Spawns `command`, logging its output to `<workspace_dir>/<name>.out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be created or the command
    /// cannot be spawned.
    pub fn new(
        mut command: Command,
        name: &str,
        workspace_dir: &Path,
    ) -> Result<Self, anyhow::Error> {
        let log_path = workspace_dir.join(format!("{name}.out"));
        let log = File::create(&log_path)
            .with_context(|| format!("cannot create {}", log_path.display()))?;
        let log = Arc::new(Mutex::new(log));

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut proc = command.spawn().with_context(|| format!("cannot spawn {name}"))?;

        let stdin = proc.stdin.take().context("stdin is not piped")?;
        let stdout = proc.stdout.take().context("stdout is not piped")?;
        let stderr = proc.stderr.take().context("stderr is not piped")?;

        let (input, rx) = mpsc::channel(1);
        Ok(Self {
            proc,
            input: Some(input),
            feeder: tokio::spawn(feed(stdin, rx)),
            stdout: Captured::spawn(Arc::clone(&log), stdout),
            stderr: Captured::spawn(log, stderr),
        })
    }

    /// Writes `input` to the child's stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin has been closed.
    pub async fn send(&self, input: impl Into<Vec<u8>>) -> Result<(), anyhow::Error> {
        let Some(tx) = &self.input else {
            bail!("stdin already closed");
        };
        tx.send(input.into())
            .await
            .context("child stopped reading stdin")?;
        Ok(())
    }

    /// Closes the child's stdin.
    pub fn close_stdin(&mut self) {
        self.input = None;
    }

    /// Waits until the stdout read so far satisfies `cond`.
    ///
    /// # Errors
    ///
    /// Returns an error if `timeout` passes or stdout closes first.
    pub async fn wait_output<F>(&self, timeout: Duration, mut cond: F) -> Result<(), anyhow::Error>
    where
        F: FnMut(&str) -> bool,
    {
        let mut len = self.stdout.len.clone();
        let wait = async {
            loop {
                let _ = len.borrow_and_update();
                if cond(&self.stdout.text.lock().unwrap()) {
                    return Ok(());
                }
                len.changed()
                    .await
                    .context("stdout closed before expected output")?;
            }
        };
        time::timeout(timeout, wait)
            .await
            .with_context(|| format!("no expected output within {timeout:?}"))?
    }

    /// Closes stdin and waits for the child to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the child is still running after `timeout` (it is
    /// killed), or if reading its output failed.
    pub async fn wait_terminate(mut self, timeout: Duration) -> Result<Output, anyhow::Error> {
        self.close_stdin();
        let status = if let Ok(status) = time::timeout(timeout, self.proc.wait()).await {
            status.context("wait for child failed")?
        } else {
            self.proc.kill().await.context("kill child failed")?;
            bail!("child did not exit within {timeout:?}");
        };

        self.feeder.await.context("stdin feeder panicked")??;
        Ok(Output {
            status,
            stdout: self.stdout.finish("stdout").await?,
            stderr: self.stderr.finish("stderr").await?,
        })
    }
}

async fn feed(mut stdin: ChildStdin, mut rx: mpsc::Receiver<Vec<u8>>) -> Result<(), anyhow::Error> {
    while let Some(chunk) = rx.recv().await {
        stdin.write_all(&chunk).await?;
        stdin.flush().await?;
    }
    Ok(())
}

async fn capture<R>(
    log: Log,
    mut pipe: R,
    text: Arc<Mutex<String>>,
    len_tx: watch::Sender<usize>,
) -> Result<(), anyhow::Error>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0; 4096];
    loop {
        let n = pipe.read(&mut buf).await.context("read pipe failed")?;
        if n == 0 {
            return Ok(());
        }
        let chunk = &buf[..n];
        {
            let mut log = log.lock().unwrap();
            log.write_all(chunk)?;
            log.flush()?;
        }
        let mut text = text.lock().unwrap();
        text.push_str(&String::from_utf8_lossy(chunk));
        len_tx.send_replace(text.len());
    }
}
