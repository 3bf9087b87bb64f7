use forkmerge_params::SINGULAR_PIVOT_EPSILON;

/// Determinant in sign/log-magnitude form, `det = sign * exp(log_abs)`.
///
/// Large matrices have determinants far outside the range of `f64`, while
/// their logarithms do not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogDet {
    pub log_abs: f64,
    /// `1`, `-1`, or `0` for a singular matrix.
    pub sign: i8,
}

impl LogDet {
    pub const SINGULAR: Self = Self {
        log_abs: f64::NEG_INFINITY,
        sign: 0,
    };

    #[must_use]
    pub fn is_singular(&self) -> bool {
        self.sign == 0
    }

    /// Returns the determinant, which may overflow to infinity.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.is_singular() {
            return 0.0;
        }
        f64::from(self.sign) * self.log_abs.exp()
    }
}

/// Computes the determinant of the row-major `n * n` matrix `a` by Gaussian
/// elimination with partial pivoting, consuming the matrix.
///
/// A pivot smaller than `SINGULAR_PIVOT_EPSILON` in magnitude makes the
/// matrix singular.
///
/// # Panics
///
/// Panics if `a.len() != n * n`.
#[must_use]
pub fn log_det(n: usize, mut a: Vec<f64>) -> LogDet {
    assert_eq!(a.len(), n * n, "matrix is not {n}x{n}");

    let mut log_abs = 0.0;
    let mut sign = 1;
    for i in 0..n {
        let pivot = (i..n)
            .max_by(|&r, &s| a[r * n + i].abs().total_cmp(&a[s * n + i].abs()))
            .unwrap_or(i);
        if pivot != i {
            let (head, tail) = a.split_at_mut(pivot * n);
            head[i * n..(i + 1) * n].swap_with_slice(&mut tail[..n]);
            sign = -sign;
        }

        let p = a[i * n + i];
        if p.abs() < SINGULAR_PIVOT_EPSILON {
            return LogDet::SINGULAR;
        }
        if p < 0.0 {
            sign = -sign;
        }
        log_abs += p.abs().ln();

        let (upper, lower) = a.split_at_mut((i + 1) * n);
        let pivot_row = &upper[i * n..];
        for row in lower.chunks_exact_mut(n) {
            let factor = row[i] / p;
            for (x, y) in row[i + 1..].iter_mut().zip(&pivot_row[i + 1..]) {
                *x -= factor * y;
            }
        }
    }
    LogDet { log_abs, sign }
}
