//! Compile-time defaults shared by the forkmerge crates.

/// Lower bound of the prime search range when none is given.
pub const DEFAULT_PRIME_LOW: u64 = 1000;

/// Upper bound of the prime search range when none is given.
pub const DEFAULT_PRIME_HIGH: u64 = 10_000;

/// Number of worker processes used by the Cramer solver.
pub const SOLVER_WORKERS: usize = 8;

/// Size of a system written by `forkmerge generate`.
pub const DEFAULT_GENERATED_SIZE: usize = 1000;

/// Sink name prefix of the prime search workers.
pub const PRIME_SINK_PREFIX: &str = "temp_primes";

/// Sink name prefix of the Cramer solver workers.
pub const SOLVER_SINK_PREFIX: &str = "part";

/// Merged prime search output.
pub const PRIME_OUTPUT_FILE: &str = "prime.txt";

/// Timing log appended to by the prime search sweep.
pub const TIMING_LOG_FILE: &str = "timing_manual.csv";

/// Augmented system read by `forkmerge solve --input`.
pub const SYSTEM_INPUT_FILE: &str = "input.txt";

/// Header row of the timing log.
pub const TIMING_LOG_HEADER: &str = "Processes,Time";

/// Pivots smaller than this are treated as zero.
pub const SINGULAR_PIVOT_EPSILON: f64 = 1e-18;

/// Inclusive range of the integer coefficients of a random system.
pub const RANDOM_COEFF_MIN: u32 = 1;
pub const RANDOM_COEFF_MAX: u32 = 10;

/// Inclusive range of the coefficients written by `forkmerge generate`.
pub const GENERATED_COEFF_MIN: f64 = 1.0;
pub const GENERATED_COEFF_MAX: f64 = 10.0;

/// Decimal places kept by `forkmerge generate`.
pub const GENERATED_COEFF_DECIMALS: i32 = 2;
