//! `forkmerge report`: summary of a timing log.

use std::{ffi::OsString, path::PathBuf};

use anyhow::Context as _;
use forkmerge::timing::{self, SweepSummary};
use forkmerge_params::TIMING_LOG_FILE;

use crate::args::{Parser, UsageError};

#[derive(Debug)]
pub struct Params {
    timing: PathBuf,
}

pub fn parse(args: impl Iterator<Item = OsString>) -> Result<Params, UsageError> {
    let mut parser = Parser::new(args);
    let mut params = Params {
        timing: PathBuf::from(TIMING_LOG_FILE),
    };
    while let Some(flag) = parser.next_flag()? {
        match flag.as_str() {
            "--timing" => params.timing = parser.value(&flag)?,
            _ => return Err(UsageError::new(format!("unknown option {flag}"))),
        }
    }
    Ok(params)
}

pub fn run(params: Params) -> Result<(), anyhow::Error> {
    let rows = timing::read_rows(&params.timing)?;
    let summary = SweepSummary::new(rows).with_context(|| {
        format!(
            "timing log {} has no usable rows",
            params.timing.display()
        )
    })?;
    println!("{summary}");
    Ok(())
}
