//! Build and hygiene tasks for the workspace.

use std::process::{Command, ExitCode, Stdio};

use clap::{Parser, Subcommand};

/// Build and hygiene tasks for the workspace.
#[derive(Parser)]
#[command(name = "xtask")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format the tree and apply clippy fixes.
    Tidy,
    /// Run the test suite under nextest.
    Test,
    /// Build API documentation for the workspace crates.
    Docs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tidy => tidy(),
        Commands::Test => test(),
        Commands::Docs => docs(),
    }
}

fn tidy() -> ExitCode {
    if !cargo("fmt", &["fmt", "--all"]) {
        return ExitCode::FAILURE;
    }
    if !cargo(
        "clippy",
        &[
            "clippy",
            "-q",
            "--fix",
            "--all",
            "--all-targets",
            "--all-features",
            "--allow-dirty",
            "--tests",
        ],
    ) {
        return ExitCode::FAILURE;
    }
    println!("\nTidy clean.");
    ExitCode::SUCCESS
}

fn test() -> ExitCode {
    if !cargo("nextest", &["nextest", "run", "--all"]) {
        return ExitCode::FAILURE;
    }
    println!("\nAll tests passed.");
    ExitCode::SUCCESS
}

fn docs() -> ExitCode {
    if cargo("doc", &["doc", "--no-deps", "--all-features"]) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Run a cargo subcommand with inherited output. Returns whether it passed.
fn cargo(label: &str, args: &[&str]) -> bool {
    println!("Running cargo {label}...");
    match Command::new("cargo")
        .args(args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
    {
        Ok(status) if status.success() => true,
        Ok(_) => {
            eprintln!("cargo {label} failed");
            false
        }
        Err(err) => {
            eprintln!("Failed to run cargo {label}: {err}");
            false
        }
    }
}
