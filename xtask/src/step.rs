use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

/// What a failing step does to the overall task.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Abort,
    Warn,
}

/// Run one `cargo` invocation, report it, and return its output.
pub fn cargo(label: &str, args: &[&str], envs: &[(&str, String)], on_failure: OnFailure) -> Result<Output> {
    println!("{}", format!("  {label}...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
        .output()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;

    if output.status.success() {
        println!(
            "{}",
            format!("  ✓ {label} passed in {:.2}s", start.elapsed().as_secs_f64()).green()
        );
    } else {
        match on_failure {
            OnFailure::Abort => {
                eprintln!("{}", format!("  ✗ {label} failed").red().bold());
                eprintln!();
                eprintln!("{}", String::from_utf8_lossy(&output.stdout));
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
                anyhow::bail!("{label} failed");
            }
            OnFailure::Warn => {
                eprintln!("{}", format!("  ⚠ {label} reported problems").yellow().bold());
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            }
        }
    }
    println!();
    Ok(output)
}
