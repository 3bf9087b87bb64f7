//! `forkmerge generate`: random system in the `input.txt` format.

use std::{ffi::OsString, fs, path::PathBuf};

use anyhow::Context as _;
use forkmerge_params::{DEFAULT_GENERATED_SIZE, SYSTEM_INPUT_FILE};
use forkmerge_tasks::linsolve::LinearSystem;

use crate::args::{Parser, UsageError};

#[derive(Debug)]
pub struct Params {
    size: usize,
    output: PathBuf,
    seed: Option<u64>,
}

pub fn parse(args: impl Iterator<Item = OsString>) -> Result<Params, UsageError> {
    let mut parser = Parser::new(args);
    let mut params = Params {
        size: DEFAULT_GENERATED_SIZE,
        output: PathBuf::from(SYSTEM_INPUT_FILE),
        seed: None,
    };
    while let Some(flag) = parser.next_flag()? {
        match flag.as_str() {
            "--size" => params.size = parser.value(&flag)?,
            "--output" => params.output = parser.value(&flag)?,
            "--seed" => params.seed = Some(parser.value(&flag)?),
            _ => return Err(UsageError::new(format!("unknown option {flag}"))),
        }
    }
    if params.size == 0 {
        return Err(UsageError::new("system size must be greater than 0"));
    }
    Ok(params)
}

pub fn run(params: Params) -> Result<(), anyhow::Error> {
    let system = LinearSystem::generate(params.size, &mut crate::seeded_rng(params.seed));
    fs::write(&params.output, system.to_string())
        .with_context(|| format!("cannot write {}", params.output.display()))?;
    println!(
        "Generated {n}x{n} system in {}",
        params.output.display(),
        n = params.size
    );
    Ok(())
}
