//! Prime search over an inclusive integer range.

use std::{
    fs::File,
    io::{self, BufWriter, Write as _},
    path::Path,
};

use forkmerge::{
    JobError, Scan, Task, WorkerFailure,
    merge,
    partition::{self, Assignment, PartitionError},
    sink::SinkWriter,
};
use forkmerge_params::PRIME_SINK_PREFIX;

/// Returns `true` if `v` is prime.
///
/// Plain trial division up to `sqrt(v)`, skipping even divisors.
#[must_use]
pub fn is_prime(v: u64) -> bool {
    if v < 2 {
        return false;
    }
    if v % 2 == 0 {
        return v == 2;
    }
    let mut d = 3;
    while d <= v / d {
        if v % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Searches `[low, high]` for primes, one contiguous range per worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimeSearch {
    low: u64,
    high: u64,
    sort: bool,
}

impl PrimeSearch {
    #[must_use]
    pub fn new(low: u64, high: u64) -> Self {
        Self {
            low,
            high,
            sort: false,
        }
    }

    /// Sorts the merged primes instead of relying on worker order.
    #[must_use]
    pub fn sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    /// Returns the number of integers in the range, or 0 if it is empty.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        if self.low > self.high {
            0
        } else {
            (self.high - self.low).saturating_add(1)
        }
    }
}

impl Task for PrimeSearch {
    const NAME: &'static str = "primes";
    const SINK_PREFIX: &'static str = PRIME_SINK_PREFIX;

    type Worker = PrimeScan;
    type Output = Vec<u64>;

    fn plan(&self, workers: usize) -> Result<Vec<Assignment>, PartitionError> {
        Ok(partition::partition(self.low, self.high, workers)?
            .into_iter()
            .map(Assignment::from)
            .collect())
    }

    fn merge(&self, parts: Vec<Vec<u64>>) -> Result<Vec<u64>, JobError> {
        Ok(merge::merge_sequence(parts, self.sort))
    }
}

/// Worker side of [`PrimeSearch`].
#[derive(Debug)]
pub struct PrimeScan;

impl Scan for PrimeScan {
    type Record = u64;

    fn decode_input(input: &[u8]) -> Result<Self, WorkerFailure> {
        if !input.is_empty() {
            return Err(WorkerFailure::Input(format!(
                "prime workers take no input, got {} bytes",
                input.len()
            )));
        }
        Ok(Self)
    }

    fn scan<W>(
        &self,
        assignment: &Assignment,
        sink: &mut SinkWriter<u64, W>,
    ) -> Result<(), WorkerFailure>
    where
        W: io::Write,
    {
        for v in assignment.units().filter(|&v| is_prime(v)) {
            sink.push(&v)?;
        }
        Ok(())
    }
}

/// Writes `primes` to `path`, one per line, replacing any previous content.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_primes(path: &Path, primes: &[u64]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for p in primes {
        writeln!(out, "{p}")?;
    }
    out.flush()
}
