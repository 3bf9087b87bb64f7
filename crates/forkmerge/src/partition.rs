//! Static assignment of work units to workers.
//!
//! Two schemes are provided: contiguous [`WorkRange`]s produced by
//! [`partition`], and interleaved [`Stride`]s produced by [`strided`]. Both
//! are pure functions of their arguments.

use core::{
    fmt,
    iter::StepBy,
    ops::{Range, RangeInclusive},
    str::FromStr,
};

/// Errors that can occur while assigning units to workers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("worker count must be greater than 0")]
    NoWorkers,
    #[error("empty range [{low}, {high}]")]
    EmptyRange { low: u64, high: u64 },
    #[error("range [{low}, {high}] has too many units")]
    RangeTooLarge { low: u64, high: u64 },
    #[error("{workers} workers requested for only {units} units")]
    TooManyWorkers { workers: usize, units: u64 },
    #[error("key count must be greater than 0")]
    NoKeys,
}

/// An inclusive interval of units assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkRange {
    pub start: u64,
    pub end: u64,
}

impl WorkRange {
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Returns the number of units in the range.
    #[must_use]
    pub const fn unit_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Keys `offset, offset + stride, offset + 2 * stride, ...` below `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stride {
    pub offset: u64,
    pub stride: u64,
    pub limit: u64,
}

impl Stride {
    /// Returns the number of keys owned by this stride.
    #[must_use]
    pub const fn len(&self) -> u64 {
        if self.offset >= self.limit {
            0
        } else {
            (self.limit - self.offset).div_ceil(self.stride)
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits `[low, high]` into `workers` contiguous ranges.
///
/// Every range but the last holds `(high - low + 1) / workers` units; the
/// last one takes whatever remains up to `high`.
///
/// # Errors
///
/// Fails if `workers` is zero, if `low > high`, or if there are fewer units
/// than workers.
pub fn partition(low: u64, high: u64, workers: usize) -> Result<Vec<WorkRange>, PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if low > high {
        return Err(PartitionError::EmptyRange { low, high });
    }
    let units = (high - low)
        .checked_add(1)
        .ok_or(PartitionError::RangeTooLarge { low, high })?;
    let n = u64::try_from(workers).unwrap_or(u64::MAX);
    if n > units {
        return Err(PartitionError::TooManyWorkers { workers, units });
    }

    let size = units / n;
    let ranges = (0..n)
        .map(|i| {
            let start = low + i * size;
            let end = if i == n - 1 { high } else { start + size - 1 };
            WorkRange::new(start, end)
        })
        .collect();
    Ok(ranges)
}

/// Deals keys `[0, keys)` out to `workers` workers round-robin.
///
/// Workers beyond `keys` receive an empty stride.
///
/// # Errors
///
/// Fails if `workers` or `keys` is zero.
pub fn strided(keys: u64, workers: usize) -> Result<Vec<Stride>, PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if keys == 0 {
        return Err(PartitionError::NoKeys);
    }
    let stride = u64::try_from(workers).unwrap_or(u64::MAX);
    Ok((0..stride)
        .map(|offset| Stride {
            offset,
            stride,
            limit: keys,
        })
        .collect())
}

/// The share of a job handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assignment {
    Range(WorkRange),
    Stride(Stride),
}

impl From<WorkRange> for Assignment {
    fn from(range: WorkRange) -> Self {
        Self::Range(range)
    }
}

impl From<Stride> for Assignment {
    fn from(stride: Stride) -> Self {
        Self::Stride(stride)
    }
}

impl Assignment {
    /// Iterates the assigned units in ascending order.
    #[must_use]
    pub fn units(&self) -> Units {
        match *self {
            Self::Range(r) => Units::Range(r.start..=r.end),
            Self::Stride(s) => {
                let step = usize::try_from(s.stride).unwrap_or(usize::MAX);
                Units::Stride((s.offset..s.limit.max(s.offset)).step_by(step))
            }
        }
    }

    /// Returns the number of assigned units.
    #[must_use]
    pub const fn len(&self) -> u64 {
        match self {
            Self::Range(r) => r.unit_count(),
            Self::Stride(s) => s.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Iterator over the units of an [`Assignment`].
#[derive(Debug, Clone)]
pub enum Units {
    Range(RangeInclusive<u64>),
    Stride(StepBy<Range<u64>>),
}

impl Iterator for Units {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Range(it) => it.next(),
            Self::Stride(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Range(it) => it.size_hint(),
            Self::Stride(it) => it.size_hint(),
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range(r) => write!(f, "range:{}-{}", r.start, r.end),
            Self::Stride(s) => write!(f, "stride:{}/{}/{}", s.offset, s.stride, s.limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid assignment {0:?}")]
pub struct ParseAssignmentError(String);

impl FromStr for Assignment {
    type Err = ParseAssignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAssignmentError(s.to_owned());
        let (kind, rest) = s.split_once(':').ok_or_else(err)?;
        match kind {
            "range" => {
                let (start, end) = rest.split_once('-').ok_or_else(err)?;
                let start: u64 = start.parse().map_err(|_e| err())?;
                let end: u64 = end.parse().map_err(|_e| err())?;
                if start > end {
                    return Err(err());
                }
                Ok(Self::Range(WorkRange::new(start, end)))
            }
            "stride" => {
                let mut fields = rest.splitn(3, '/').map(str::parse::<u64>);
                let mut next = || fields.next().and_then(Result::ok).ok_or_else(err);
                let offset = next()?;
                let stride = next()?;
                let limit = next()?;
                if stride == 0 {
                    return Err(err());
                }
                Ok(Self::Stride(Stride {
                    offset,
                    stride,
                    limit,
                }))
            }
            _ => Err(err()),
        }
    }
}
