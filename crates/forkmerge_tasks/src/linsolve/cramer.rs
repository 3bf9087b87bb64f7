use std::io;

use forkmerge::{
    JobError, Scan, Task, WorkerFailure,
    merge,
    partition::{self, Assignment, PartitionError},
    sink::{KeyedValue, SinkWriter},
};
use forkmerge_params::SOLVER_SINK_PREFIX;

use super::{LinearSystem, LogDet, log_det};

#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("coefficient matrix is singular")]
    Singular,
}

/// Returns `x_column` of the solution by Cramer's rule, given the
/// determinant of the coefficient matrix.
///
/// The ratio of the two determinants is taken in log form so it stays finite
/// when both determinants overflow.
#[must_use]
pub fn solve_column(system: &LinearSystem, baseline: LogDet, column: usize) -> f64 {
    let d = log_det(system.size(), system.with_column_replaced(column));
    if d.is_singular() || baseline.is_singular() {
        return 0.0;
    }
    f64::from(d.sign * baseline.sign) * (d.log_abs - baseline.log_abs).exp()
}

/// Solves a linear system with one worker per stride of columns.
///
/// The determinant of the coefficient matrix is computed once by the parent
/// and handed to every worker along with the system.
#[derive(Debug, Clone)]
pub struct CramerSolve {
    system: LinearSystem,
    baseline: LogDet,
}

impl CramerSolve {
    /// Prepares a job for `system`.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::Singular`] if the system has no unique solution.
    pub fn new(system: LinearSystem) -> Result<Self, SolveError> {
        let baseline = log_det(system.size(), system.coefficients().to_vec());
        if baseline.is_singular() {
            return Err(SolveError::Singular);
        }
        Ok(Self { system, baseline })
    }

    #[must_use]
    pub fn system(&self) -> &LinearSystem {
        &self.system
    }

    #[must_use]
    pub fn baseline(&self) -> LogDet {
        self.baseline
    }
}

impl Task for CramerSolve {
    const NAME: &'static str = "cramer";
    const SINK_PREFIX: &'static str = SOLVER_SINK_PREFIX;

    type Worker = CramerColumns;
    type Output = Vec<f64>;

    fn plan(&self, workers: usize) -> Result<Vec<Assignment>, PartitionError> {
        let keys = u64::try_from(self.system.size()).unwrap_or(u64::MAX);
        Ok(partition::strided(keys, workers)?
            .into_iter()
            .map(Assignment::from)
            .collect())
    }

    fn shared_input(&self) -> Vec<u8> {
        encode_input(&self.system, self.baseline).into_bytes()
    }

    fn merge(&self, parts: Vec<Vec<KeyedValue>>) -> Result<Vec<f64>, JobError> {
        Ok(merge::merge_keyed(parts, self.system.size())?)
    }
}

/// Worker side of [`CramerSolve`].
#[derive(Debug)]
pub struct CramerColumns {
    system: LinearSystem,
    baseline: LogDet,
}

// first line `logdet <log_abs> <sign>`, then the system in text form
fn encode_input(system: &LinearSystem, baseline: LogDet) -> String {
    format!("logdet {} {}\n{system}", baseline.log_abs, baseline.sign)
}

fn decode_baseline(line: &str) -> Option<LogDet> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "logdet" {
        return None;
    }
    let log_abs = fields.next()?.parse().ok()?;
    let sign = fields.next()?.parse().ok()?;
    if fields.next().is_some() || !matches!(sign, -1..=1) {
        return None;
    }
    Some(LogDet { log_abs, sign })
}

impl Scan for CramerColumns {
    type Record = KeyedValue;

    fn decode_input(input: &[u8]) -> Result<Self, WorkerFailure> {
        let input = std::str::from_utf8(input)
            .map_err(|e| WorkerFailure::Input(format!("input is not UTF-8: {e}")))?;
        let (header, body) = input.split_once('\n').unwrap_or((input, ""));
        let baseline = decode_baseline(header)
            .ok_or_else(|| WorkerFailure::Input(format!("bad determinant line {header:?}")))?;
        if baseline.is_singular() {
            return Err(WorkerFailure::Singular);
        }
        let system = body
            .parse::<LinearSystem>()
            .map_err(|e| WorkerFailure::Input(e.to_string()))?;
        Ok(Self { system, baseline })
    }

    fn scan<W>(
        &self,
        assignment: &Assignment,
        sink: &mut SinkWriter<KeyedValue, W>,
    ) -> Result<(), WorkerFailure>
    where
        W: io::Write,
    {
        let size = self.system.size();
        for key in assignment.units() {
            let column = usize::try_from(key)
                .ok()
                .filter(|&c| c < size)
                .ok_or_else(|| {
                    WorkerFailure::Input(format!("column {key} outside a {size}x{size} system"))
                })?;
            let value = solve_column(&self.system, self.baseline, column);
            sink.push(&KeyedValue { key: column, value })?;
        }
        Ok(())
    }
}
