use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use forkmerge_params::{
    GENERATED_COEFF_DECIMALS, GENERATED_COEFF_MAX, GENERATED_COEFF_MIN, RANDOM_COEFF_MAX,
    RANDOM_COEFF_MIN,
};
use rand::Rng;

/// Errors that can occur while building or reading a linear system.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("cannot read system from {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("system has no equations")]
    Empty,
    #[error("row {row} has {found} numbers, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row}, column {column}: invalid number {text:?}")]
    Number {
        row: usize,
        column: usize,
        text: String,
    },
}

/// A dense square system `A x = B`.
///
/// The text form is the augmented matrix `[A | B]`: one equation per line,
/// `N` coefficients followed by the constant, separated by whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    size: usize,
    /// Row-major `size * size` coefficients.
    coefficients: Vec<f64>,
    constants: Vec<f64>,
}

impl LinearSystem {
    /// Builds a system from its augmented rows.
    ///
    /// # Errors
    ///
    /// Fails if there are no rows or a row does not hold `rows + 1` numbers.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, SystemError> {
        let size = rows.len();
        if size == 0 {
            return Err(SystemError::Empty);
        }
        let mut coefficients = Vec::with_capacity(size * size);
        let mut constants = Vec::with_capacity(size);
        for (i, row) in rows.iter().enumerate() {
            let Some((constant, coeffs)) = row.split_last().filter(|_| row.len() == size + 1)
            else {
                return Err(SystemError::RowLength {
                    row: i + 1,
                    expected: size + 1,
                    found: row.len(),
                });
            };
            coefficients.extend_from_slice(coeffs);
            constants.push(*constant);
        }
        Ok(Self {
            size,
            coefficients,
            constants,
        })
    }

    /// Draws a system of integer coefficients in
    /// `RANDOM_COEFF_MIN..=RANDOM_COEFF_MAX`.
    pub fn random<R>(size: usize, rng: &mut R) -> Self
    where
        R: Rng,
    {
        let mut draw = || f64::from(rng.random_range(RANDOM_COEFF_MIN..=RANDOM_COEFF_MAX));
        let constants = (0..size).map(|_| draw()).collect();
        let coefficients = (0..size * size).map(|_| draw()).collect();
        Self {
            size,
            coefficients,
            constants,
        }
    }

    /// Draws a system of uniform coefficients in
    /// `[GENERATED_COEFF_MIN, GENERATED_COEFF_MAX]`, rounded to
    /// `GENERATED_COEFF_DECIMALS` places.
    pub fn generate<R>(size: usize, rng: &mut R) -> Self
    where
        R: Rng,
    {
        let scale = 10_f64.powi(GENERATED_COEFF_DECIMALS);
        let mut rows = Vec::with_capacity(size);
        for _ in 0..size {
            let row = (0..=size)
                .map(|_| {
                    let v = rng.random_range(GENERATED_COEFF_MIN..=GENERATED_COEFF_MAX);
                    (v * scale).round() / scale
                })
                .collect::<Vec<_>>();
            rows.push(row);
        }
        let mut coefficients = Vec::with_capacity(size * size);
        let mut constants = Vec::with_capacity(size);
        for mut row in rows {
            constants.extend(row.pop());
            coefficients.extend(row);
        }
        Self {
            size,
            coefficients,
            constants,
        }
    }

    /// Reads a system in text form from `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a well-formed system.
    pub fn read(path: &Path) -> Result<Self, SystemError> {
        let text = fs::read_to_string(path).map_err(|source| SystemError::Io {
            path: path.to_owned(),
            source,
        })?;
        text.parse()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    #[must_use]
    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    /// Returns the coefficient matrix with column `column` replaced by the
    /// constants.
    #[must_use]
    pub fn with_column_replaced(&self, column: usize) -> Vec<f64> {
        let mut a = self.coefficients.clone();
        for (row, b) in a.chunks_exact_mut(self.size).zip(&self.constants) {
            row[column] = *b;
        }
        a
    }
}

impl FromStr for LinearSystem {
    type Err = SystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows = s
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                line.split_whitespace()
                    .enumerate()
                    .map(|(j, text)| {
                        text.parse::<f64>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .ok_or_else(|| SystemError::Number {
                                row: i + 1,
                                column: j + 1,
                                text: text.to_owned(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_rows(&rows)
    }
}

impl fmt::Display for LinearSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, b) in self.coefficients.chunks_exact(self.size).zip(&self.constants) {
            for a in row {
                write!(f, "{a} ")?;
            }
            writeln!(f, "{b}")?;
        }
        Ok(())
    }
}
