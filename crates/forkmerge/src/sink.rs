//! Worker-exclusive output files.
//!
//! Every worker writes its records to its own sink, one record per line.
//! Sinks live in a [`ScratchDir`] and are named after the job's prefix and
//! the worker index, so no two workers of a job share a file.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufRead as _, BufReader, BufWriter, Write},
    marker::PhantomData,
    os::unix::fs::MetadataExt as _,
    path::{Path, PathBuf},
};

use fs4::fs_std::FileExt as _;

/// Errors that can occur while decoding a single record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed record {line:?}: {reason}")]
pub struct RecordError {
    line: String,
    reason: &'static str,
}

impl RecordError {
    #[must_use]
    pub fn new(line: &str, reason: &'static str) -> Self {
        Self {
            line: line.to_owned(),
            reason,
        }
    }
}

/// A value a worker emits into its sink.
pub trait Record: Sized + Send + 'static {
    /// Writes the record as a single line.
    fn encode<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: Write;

    /// Parses a line written by [`Record::encode`], without its newline.
    fn decode(line: &str) -> Result<Self, RecordError>;
}

impl Record for u64 {
    fn encode<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        writeln!(out, "{self}")
    }

    fn decode(line: &str) -> Result<Self, RecordError> {
        line.trim()
            .parse()
            .map_err(|_e| RecordError::new(line, "not an unsigned integer"))
    }
}

/// A value stored at a key of a dense result array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyedValue {
    pub key: usize,
    pub value: f64,
}

impl Record for KeyedValue {
    fn encode<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        // `{}` on f64 prints the shortest text that parses back to the same value.
        writeln!(out, "{} {}", self.key, self.value)
    }

    fn decode(line: &str) -> Result<Self, RecordError> {
        let mut fields = line.split_whitespace();
        let key = fields
            .next()
            .ok_or_else(|| RecordError::new(line, "missing key"))?
            .parse()
            .map_err(|_e| RecordError::new(line, "key is not an index"))?;
        let value = fields
            .next()
            .ok_or_else(|| RecordError::new(line, "missing value"))?
            .parse()
            .map_err(|_e| RecordError::new(line, "value is not a number"))?;
        if fields.next().is_some() {
            return Err(RecordError::new(line, "trailing fields"));
        }
        Ok(Self { key, value })
    }
}

/// Buffered writer of records of type `R`.
pub struct SinkWriter<R, W = BufWriter<File>>
where
    W: Write,
{
    out: W,
    count: usize,
    _record: PhantomData<fn(&R)>,
}

impl<R> SinkWriter<R>
where
    R: Record,
{
    /// Creates (or truncates) the sink file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<R, W> SinkWriter<R, W>
where
    R: Record,
    W: Write,
{
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out,
            count: 0,
            _record: PhantomData,
        }
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn push(&mut self, record: &R) -> io::Result<()> {
        record.encode(&mut self.out)?;
        self.count += 1;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Flushes the sink and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Errors that can occur while reading a sink back.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink {} is missing", .path.display())]
    Missing { path: PathBuf },
    #[error("cannot read sink {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sink {}, line {line}", .path.display())]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: RecordError,
    },
}

/// Reads every record from the sink at `path`.
///
/// Blank lines are skipped.
///
/// # Errors
///
/// Fails if the sink does not exist, cannot be read, or holds a malformed
/// record.
pub fn read_sink<R>(path: &Path) -> Result<Vec<R>, SinkError>
where
    R: Record,
{
    let io_err = |source: io::Error| SinkError::Io {
        path: path.to_owned(),
        source,
    };
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(SinkError::Missing {
                path: path.to_owned(),
            });
        }
        Err(e) => return Err(io_err(e)),
    };

    let mut records = vec![];
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let record = R::decode(&line).map_err(|source| SinkError::Decode {
            path: path.to_owned(),
            line: i + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Directory holding the sinks and worker logs of one job at a time.
///
/// An exclusive lock on `<prefix>.lock` is held for as long as the value
/// lives, so two jobs with the same prefix never write the same sinks. The
/// lockfile is removed when the value is dropped.
#[derive(Debug)]
pub struct ScratchDir {
    dir: PathBuf,
    prefix: String,
    _lock: File,
}

impl ScratchDir {
    /// Creates `dir` if needed and takes the job lock, blocking until any
    /// other job using the same prefix has finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or lockfile cannot be created or
    /// locked.
    pub fn open(dir: &Path, prefix: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = lock_path(dir, prefix);
        loop {
            let lock = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&path)?;
            lock.lock_exclusive()?;
            let locked = lock.metadata()?;
            // the previous holder unlinks the file on release; retry on a fresh one
            match fs::metadata(&path) {
                Ok(meta) if is_same_file(&meta, &locked) => {
                    return Ok(Self {
                        dir: dir.to_owned(),
                        prefix: prefix.to_owned(),
                        _lock: lock,
                    });
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the sink path of worker `index`.
    #[must_use]
    pub fn sink_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}_{index}", self.prefix))
    }

    /// Returns the stderr log path of worker `index`.
    #[must_use]
    pub fn log_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}_{index}.log", self.prefix))
    }

    /// Removes the sinks of workers `0..workers`, and their logs too when
    /// `logs` is set. Files that are already gone are ignored.
    pub fn remove(&self, workers: usize, logs: bool) {
        for i in 0..workers {
            let _ = fs::remove_file(self.sink_path(i));
            if logs {
                let _ = fs::remove_file(self.log_path(i));
            }
        }
    }
}

/// Releasing the job lock also removes the lockfile.
impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_file(lock_path(&self.dir, &self.prefix));
    }
}

fn lock_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}.lock"))
}

fn is_same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    a.dev() == b.dev() && a.ino() == b.ino()
}
