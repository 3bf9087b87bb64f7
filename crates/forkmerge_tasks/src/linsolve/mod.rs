//! Cramer's rule solver for dense linear systems.
//!
//! Every unknown `x_j` is `det(A_j) / det(A)`, where `A_j` is `A` with
//! column `j` replaced by `B`. Columns are independent, so they are dealt out
//! to workers round-robin.

pub use self::{
    cramer::{CramerColumns, CramerSolve, SolveError, solve_column},
    logdet::{LogDet, log_det},
    system::{LinearSystem, SystemError},
};

mod cramer;
mod logdet;
mod system;
