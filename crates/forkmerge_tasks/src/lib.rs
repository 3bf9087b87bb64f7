//! Jobs built on the forkmerge runtime.
//!
//! - [`primes`]: prime search over an integer range.
//! - [`linsolve`]: Cramer's rule solver for dense linear systems.

pub mod linsolve;
pub mod primes;
