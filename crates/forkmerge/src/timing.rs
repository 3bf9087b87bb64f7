//! Timing log of a worker-count sweep and its summary.
//!
//! The log is a two-column CSV, `Processes,Time`, with one row per job.

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{self, Write as _},
    path::{Path, PathBuf},
    time::Duration,
};

use forkmerge_params::TIMING_LOG_HEADER;

/// One row of the timing log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingRow {
    pub workers: usize,
    pub seconds: f64,
}

/// Errors that can occur while reading a timing log.
#[derive(Debug, thiserror::Error)]
pub enum TimingError {
    #[error("cannot read timing log {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("timing log {}, line {line}: expected header {TIMING_LOG_HEADER:?}", .path.display())]
    Header { path: PathBuf, line: usize },
    #[error("timing log {}, line {line}: malformed row {text:?}", .path.display())]
    Row {
        path: PathBuf,
        line: usize,
        text: String,
    },
    #[error("timing log {} has no rows", .path.display())]
    Empty { path: PathBuf },
}

/// Writer of a timing log.
///
/// The log is truncated and the header written once when the writer is
/// created; rows are appended and flushed one at a time so a sweep that is
/// interrupted leaves the rows measured so far.
#[derive(Debug)]
pub struct TimingLog {
    file: File,
}

impl TimingLog {
    /// Truncates the log at `path` and writes the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut file = File::create(path)?;
        writeln!(file, "{TIMING_LOG_HEADER}")?;
        file.flush()?;
        drop(file);
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self { file })
    }

    /// Appends the time of a job run with `workers` workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn append(&mut self, workers: usize, elapsed: Duration) -> io::Result<()> {
        writeln!(self.file, "{workers},{:.6}", elapsed.as_secs_f64())?;
        self.file.flush()
    }
}

/// Reads every row of the timing log at `path`.
///
/// # Errors
///
/// Fails if the file cannot be read, does not start with the header, or
/// holds a malformed row.
pub fn read_rows(path: &Path) -> Result<Vec<TimingRow>, TimingError> {
    let text = fs::read_to_string(path).map_err(|source| TimingError::Io {
        path: path.to_owned(),
        source,
    })?;

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());
    match lines.next() {
        Some((_, TIMING_LOG_HEADER)) => {}
        Some((line, _)) => {
            return Err(TimingError::Header {
                path: path.to_owned(),
                line,
            });
        }
        None => {
            return Err(TimingError::Empty {
                path: path.to_owned(),
            });
        }
    }

    lines
        .map(|(line, text)| {
            parse_row(text).ok_or_else(|| TimingError::Row {
                path: path.to_owned(),
                line,
                text: text.to_owned(),
            })
        })
        .collect()
}

fn parse_row(text: &str) -> Option<TimingRow> {
    let (workers, seconds) = text.split_once(',')?;
    let workers = workers.trim().parse().ok()?;
    let seconds = seconds.trim().parse::<f64>().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(TimingRow { workers, seconds })
}

/// Performance figures derived from a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSummary {
    rows: Vec<TimingRow>,
    baseline: f64,
}

/// Derived figures of one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowStats {
    pub workers: usize,
    pub seconds: f64,
    /// `T1 / Tn`.
    pub speedup: f64,
    /// Speedup per worker, in percent.
    pub efficiency: f64,
}

impl SweepSummary {
    /// Summarizes `rows`, using the single-worker row as the baseline, or
    /// the first row when there is none.
    ///
    /// Returns `None` if `rows` is empty or holds a row that is not
    /// positive.
    #[must_use]
    pub fn new(rows: Vec<TimingRow>) -> Option<Self> {
        if rows.iter().any(|r| r.seconds <= 0.0 || r.workers == 0) {
            return None;
        }
        let baseline = rows
            .iter()
            .find(|r| r.workers == 1)
            .or_else(|| rows.first())?
            .seconds;
        Some(Self { rows, baseline })
    }

    /// Time of the baseline run.
    #[must_use]
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Statistics of every row, in log order.
    pub fn stats(&self) -> impl Iterator<Item = RowStats> + '_ {
        self.rows.iter().map(|r| {
            let speedup = self.baseline / r.seconds;
            let workers = f64::from(u32::try_from(r.workers).unwrap_or(u32::MAX));
            let efficiency = speedup / workers * 100.0;
            RowStats {
                workers: r.workers,
                seconds: r.seconds,
                speedup,
                efficiency,
            }
        })
    }

    /// The fastest row.
    #[must_use]
    pub fn best(&self) -> RowStats {
        self.stats()
            .reduce(|best, s| if s.seconds < best.seconds { s } else { best })
            .unwrap_or(RowStats {
                workers: 1,
                seconds: self.baseline,
                speedup: 1.0,
                efficiency: 100.0,
            })
    }

    /// Parallel fraction estimated from the best speedup with Amdahl's law,
    /// `p = (s - 1) / s`, clamped to `[0, 1)`.
    #[must_use]
    pub fn parallel_fraction(&self) -> f64 {
        let s = self.best().speedup;
        ((s - 1.0) / s).max(0.0)
    }

    /// Upper bound on the speedup for any worker count, `1 / (1 - p)`.
    #[must_use]
    pub fn max_speedup(&self) -> f64 {
        1.0 / (1.0 - self.parallel_fraction())
    }
}

impl fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>9} {:>12} {:>9} {:>11}",
            "Processes", "Time (s)", "Speedup", "Efficiency"
        )?;
        for s in self.stats() {
            writeln!(
                f,
                "{:>9} {:>12.6} {:>9.3} {:>10.1}%",
                s.workers, s.seconds, s.speedup, s.efficiency
            )?;
        }
        let best = self.best();
        writeln!(f)?;
        writeln!(f, "Baseline time: {:.6} sec", self.baseline)?;
        writeln!(
            f,
            "Optimal processes: {} ({:.6} sec, speedup {:.3})",
            best.workers, best.seconds, best.speedup
        )?;
        writeln!(
            f,
            "Estimated parallel fraction: {:.2}%",
            self.parallel_fraction() * 100.0
        )?;
        write!(f, "Theoretical max speedup: {:.3}", self.max_speedup())
    }
}
