#![cfg(test)]

use std::{fs, time::Duration};

use forkmerge_test_utils::{Workspace, logged_command::LoggedCommand, workspace};
use regex::Regex;
use tokio::process::Command;

const TIMEOUT: Duration = Duration::from_secs(60);

fn forkmerge(ws: &Workspace, name: &str, args: &[&str]) -> Result<LoggedCommand, anyhow::Error> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_forkmerge"));
    command.args(args).current_dir(ws.dir());
    LoggedCommand::new(command, name, ws.dir())
}

fn parse_numbers(line: &str) -> Result<Vec<f64>, anyhow::Error> {
    Ok(line
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<Vec<f64>, _>>()?)
}

#[tokio::test]
async fn solve_two_by_two() -> Result<(), anyhow::Error> {
    let ws = workspace!("solve_two_by_two")?;
    fs::write(ws.dir().join("input.txt"), "2 1 5\n1 3 10\n")?;
    let cmd = forkmerge(&ws, "solve", &["solve", "--input", "input.txt"])?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);

    assert!(out.stdout.contains("Solutions :\nx1 = 1.00\nx2 = 3.00\n"), "{}", out.stdout);
    assert!(Regex::new(r"(?m)^Execution Time: \d+ ms$")?.is_match(&out.stdout));
    assert_eq!(ws.files_with_prefix("part")?, Vec::<String>::new());
    Ok(())
}

#[tokio::test]
async fn generated_system_is_solved() -> Result<(), anyhow::Error> {
    let ws = workspace!("generated_system_is_solved")?;
    let cmd = forkmerge(
        &ws,
        "generate",
        &["generate", "--size", "6", "--seed", "3", "--output", "system.txt"],
    )?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);
    assert!(out.stdout.contains("Generated 6x6 system in system.txt"));

    let cmd = forkmerge(
        &ws,
        "solve",
        &[
            "solve", "--input", "system.txt", "--workers", "4", "--output", "x.txt",
        ],
    )?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);
    assert_eq!(
        out.stdout.lines().filter(|l| l.starts_with('x')).count(),
        6
    );

    let x = parse_numbers(&fs::read_to_string(ws.dir().join("x.txt"))?)?;
    assert_eq!(x.len(), 6);
    let system = fs::read_to_string(ws.dir().join("system.txt"))?;
    for line in system.lines() {
        let row = parse_numbers(line)?;
        assert_eq!(row.len(), 7);
        let lhs = row[..6].iter().zip(&x).map(|(a, x)| a * x).sum::<f64>();
        let scale = row[..6].iter().zip(&x).map(|(a, x)| (a * x).abs()).sum::<f64>();
        assert!((lhs - row[6]).abs() < 1e-9 * (1.0 + scale), "{lhs} != {}", row[6]);
    }
    Ok(())
}

#[tokio::test]
async fn seeded_random_system_is_reproducible() -> Result<(), anyhow::Error> {
    let ws = workspace!("seeded_random_system_is_reproducible")?;
    let mut outputs = vec![];
    for workers in ["1", "8"] {
        let cmd = forkmerge(
            &ws,
            &format!("solve_{workers}"),
            &["solve", "--size", "5", "--seed", "42", "--workers", workers],
        )?;
        let out = cmd.wait_terminate(TIMEOUT).await?;
        assert!(out.status.success(), "{}", out.stderr);
        outputs.push(
            out.stdout
                .lines()
                .filter(|l| l.starts_with('x'))
                .map(str::to_owned)
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(outputs[0].len(), 5);
    assert_eq!(outputs[0], outputs[1]);
    Ok(())
}

#[tokio::test]
async fn size_is_read_from_prompt() -> Result<(), anyhow::Error> {
    let ws = workspace!("size_is_read_from_prompt")?;
    let cmd = forkmerge(&ws, "solve", &["solve", "--seed", "7", "--workers", "2"])?;
    cmd.wait_output(TIMEOUT, |s| s.contains("Enter N: ")).await?;
    cmd.send("3\n").await?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);
    let re = Regex::new(r"(?m)^x\d = -?\d+\.\d{2}$")?;
    assert_eq!(re.find_iter(&out.stdout).count(), 3);
    Ok(())
}

#[tokio::test]
async fn singular_system_fails() -> Result<(), anyhow::Error> {
    let ws = workspace!("singular_system_fails")?;
    fs::write(ws.dir().join("input.txt"), "1 2 3\n2 4 6\n")?;
    let cmd = forkmerge(&ws, "solve", &["solve", "--input", "input.txt"])?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert_eq!(out.status.code(), Some(1));
    assert!(
        out.stderr
            .starts_with("forkmerge: cannot create job: coefficient matrix is singular"),
        "{}",
        out.stderr
    );
    assert!(!out.stdout.contains("Solutions"));
    Ok(())
}

#[tokio::test]
async fn worker_rejects_singular_baseline() -> Result<(), anyhow::Error> {
    let ws = workspace!("worker_rejects_singular_baseline")?;
    let cmd = forkmerge(
        &ws,
        "worker",
        &[
            "worker",
            "cramer",
            "--index",
            "0",
            "--assignment",
            "stride:0/1/2",
            "--sink",
            "part_0",
        ],
    )?;
    cmd.send("logdet -inf 0\n1 2 3\n2 4 6\n").await?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert_eq!(out.status.code(), Some(5));
    assert!(out.stderr.starts_with("cramer worker 0: "), "{}", out.stderr);
    Ok(())
}

#[tokio::test]
async fn worker_writes_sink() -> Result<(), anyhow::Error> {
    let ws = workspace!("worker_writes_sink")?;
    let cmd = forkmerge(
        &ws,
        "worker",
        &[
            "worker",
            "primes",
            "--index",
            "1",
            "--assignment",
            "range:10-20",
            "--sink",
            "temp_primes_1",
        ],
    )?;
    let out = cmd.wait_terminate(TIMEOUT).await?;
    assert!(out.status.success(), "{}", out.stderr);
    assert_eq!(
        fs::read_to_string(ws.dir().join("temp_primes_1"))?,
        "11\n13\n17\n19\n"
    );
    Ok(())
}

#[tokio::test]
async fn usage_errors_exit_with_two() -> Result<(), anyhow::Error> {
    let ws = workspace!("usage_errors_exit_with_two")?;
    for (i, args) in [
        &["frobnicate"][..],
        &["primes", "--low", "1"],
        &["solve", "--workers", "0"],
        &["generate", "--size"],
        &["worker", "primes", "--index", "x"],
        &["worker", "sort"],
    ]
    .into_iter()
    .enumerate()
    {
        let cmd = forkmerge(&ws, &format!("usage_{i}"), args)?;
        let out = cmd.wait_terminate(TIMEOUT).await?;
        assert_eq!(out.status.code(), Some(2), "{args:?}: {}", out.stderr);
    }
    Ok(())
}
