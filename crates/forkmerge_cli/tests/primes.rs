#![cfg(test)]

use std::{fs, path::Path, time::Duration};

use forkmerge_test_utils::{Workspace, logged_command::LoggedCommand, workspace};
use regex::Regex;
use tokio::process::Command;

const TIMEOUT: Duration = Duration::from_secs(60);

const PRIMES_TO_50: &str = "2\n3\n5\n7\n11\n13\n17\n19\n23\n29\n31\n37\n41\n43\n47\n";

fn forkmerge(ws: &Workspace, name: &str, args: &[&str]) -> Result<LoggedCommand, anyhow::Error> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_forkmerge"));
    command.args(args).current_dir(ws.dir());
    LoggedCommand::new(command, name, ws.dir())
}

fn read_primes(path: &Path) -> Result<Vec<u64>, anyhow::Error> {
    let text = fs::read_to_string(path)?;
    let mut primes = text
        .lines()
        .map(str::parse)
        .collect::<Result<Vec<u64>, _>>()?;
    primes.sort_unstable();
    Ok(primes)
}

#[tokio::test]
async fn primes_up_to_fifty() -> Result<(), anyhow::Error> {
    let ws = workspace!("primes_up_to_fifty")?;
    let cmd = forkmerge(
        &ws,
        "primes",
        &["primes", "--low", "1", "--high", "50", "--workers", "4", "--sort"],
    )?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);

    assert_eq!(fs::read_to_string(ws.dir().join("prime.txt"))?, PRIMES_TO_50);
    assert!(out.stdout.contains("15 primes in [1, 50] written to prime.txt"));
    assert_eq!(ws.files_with_prefix("temp_primes")?, Vec::<String>::new());
    Ok(())
}

#[tokio::test]
async fn worker_count_does_not_change_result() -> Result<(), anyhow::Error> {
    let ws = workspace!("worker_count_does_not_change_result")?;
    let mut results = vec![];
    for workers in ["1", "3", "7"] {
        let output = format!("prime_{workers}.txt");
        let cmd = forkmerge(
            &ws,
            &format!("primes_{workers}"),
            &[
                "primes", "--low", "100", "--high", "2000", "--workers", workers, "--output",
                &output,
            ],
        )?;
        let out = cmd.wait_terminate(TIMEOUT).await?;
        assert!(out.status.success(), "{}", out.stderr);
        results.push(read_primes(&ws.dir().join(&output))?);
    }
    assert_eq!(results[0].len(), 278);
    assert!(results.iter().all(|r| *r == results[0]));
    Ok(())
}

#[tokio::test]
async fn sweep_writes_timing_log() -> Result<(), anyhow::Error> {
    let ws = workspace!("sweep_writes_timing_log")?;
    let cmd = forkmerge(
        &ws,
        "sweep",
        &["primes", "--low", "1", "--high", "50", "--max-workers", "3"],
    )?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);

    let re = Regex::new(r"(?m)^Processes = (\d+), Time = \d+\.\d{6} sec$")?;
    let counts = re
        .captures_iter(&out.stdout)
        .map(|c| c[1].to_owned())
        .collect::<Vec<_>>();
    assert_eq!(counts, ["1", "2", "3"]);
    assert!(out.stdout.starts_with("Logical cores available: "));

    let timing = fs::read_to_string(ws.dir().join("timing_manual.csv"))?;
    let lines = timing.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Processes,Time");
    let row = Regex::new(r"^\d+,\d+\.\d{6}$")?;
    assert!(lines[1..].iter().all(|l| row.is_match(l)), "{timing}");

    let primes = read_primes(&ws.dir().join("prime.txt"))?;
    assert_eq!(primes.len(), 15);
    assert_eq!(ws.files_with_prefix("temp_primes_")?, Vec::<String>::new());
    Ok(())
}

#[tokio::test]
async fn sweep_is_capped_by_range() -> Result<(), anyhow::Error> {
    let ws = workspace!("sweep_is_capped_by_range")?;
    let cmd = forkmerge(
        &ws,
        "sweep",
        &["primes", "--low", "10", "--high", "12", "--max-workers", "8"],
    )?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);

    let timing = fs::read_to_string(ws.dir().join("timing_manual.csv"))?;
    assert_eq!(timing.lines().count(), 4);
    assert_eq!(read_primes(&ws.dir().join("prime.txt"))?, [11]);
    Ok(())
}

#[tokio::test]
async fn rerun_replaces_previous_output() -> Result<(), anyhow::Error> {
    let ws = workspace!("rerun_replaces_previous_output")?;
    for name in ["first", "second"] {
        let cmd = forkmerge(
            &ws,
            name,
            &["primes", "--low", "1", "--high", "50", "--workers", "2", "--sort"],
        )?;
        let out = cmd.wait_terminate(TIMEOUT).await?;
        assert!(out.status.success(), "{}", out.stderr);
        assert_eq!(fs::read_to_string(ws.dir().join("prime.txt"))?, PRIMES_TO_50);
        let timing = fs::read_to_string(ws.dir().join("timing_manual.csv"))?;
        let lines = timing.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2, "{timing}");
        assert_eq!(lines[0], "Processes,Time");
        assert!(lines[1].starts_with("2,"));
    }
    Ok(())
}

#[tokio::test]
async fn range_is_read_from_prompt() -> Result<(), anyhow::Error> {
    let ws = workspace!("range_is_read_from_prompt")?;
    let cmd = forkmerge(&ws, "prompt", &["primes", "--workers", "2", "--sort"])?;
    cmd.wait_output(TIMEOUT, |s| s.contains("Enter lower and upper range: "))
        .await?;
    cmd.send("1 50\n").await?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);
    assert_eq!(fs::read_to_string(ws.dir().join("prime.txt"))?, PRIMES_TO_50);
    Ok(())
}

#[tokio::test]
async fn empty_range_fails() -> Result<(), anyhow::Error> {
    let ws = workspace!("empty_range_fails")?;
    let cmd = forkmerge(&ws, "primes", &["primes", "--low", "50", "--high", "1"])?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert_eq!(out.status.code(), Some(1));
    assert!(
        out.stderr.starts_with("forkmerge: job failed at partition stage: "),
        "{}",
        out.stderr
    );
    assert!(!ws.dir().join("prime.txt").exists());
    Ok(())
}

#[tokio::test]
async fn report_summarizes_timing_log() -> Result<(), anyhow::Error> {
    let ws = workspace!("report_summarizes_timing_log")?;
    fs::write(
        ws.dir().join("timing.csv"),
        "Processes,Time\n1,4.000000\n2,2.000000\n4,1.250000\n8,1.600000\n",
    )?;
    let cmd = forkmerge(&ws, "report", &["report", "--timing", "timing.csv"])?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);
    assert!(out.stdout.contains("Optimal processes: 4"), "{}", out.stdout);
    assert!(out.stdout.contains("Theoretical max speedup: 3.200"), "{}", out.stdout);
    Ok(())
}

#[tokio::test]
async fn report_rejects_malformed_log() -> Result<(), anyhow::Error> {
    let ws = workspace!("report_rejects_malformed_log")?;
    fs::write(ws.dir().join("timing.csv"), "Processes,Time\n1,fast\n")?;
    let cmd = forkmerge(&ws, "report", &["report", "--timing", "timing.csv"])?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert_eq!(out.status.code(), Some(1));
    Ok(())
}
