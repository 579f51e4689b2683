use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, OnFailure};

pub fn run(unit_only: bool, integration_only: bool, proptest_cases: Option<u32>) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();
    let envs: Vec<(&str, String)> = proptest_cases
        .map(|cases| ("PROPTEST_CASES", cases.to_string()))
        .into_iter()
        .collect();

    if !integration_only {
        let out = cargo("Unit tests", &["test", "--lib", "--workspace"], &envs, OnFailure::Abort)?;
        print_summary(&String::from_utf8_lossy(&out.stdout));
    }

    if !unit_only {
        // Integration tests drive the driver against satiator-sim.
        let out = cargo(
            "Simulator integration tests",
            &["test", "-p", "satiator", "--tests"],
            &envs,
            OnFailure::Abort,
        )?;
        print_summary(&String::from_utf8_lossy(&out.stdout));
    }

    cargo("Doc tests", &["test", "--doc", "--workspace"], &[], OnFailure::Warn)?;

    println!(
        "{}",
        format!("✓ All tests completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}

fn print_summary(output: &str) {
    let (passed, failed) = totals(output);
    println!("{}", format!("     {passed} passed, {failed} failed").dimmed());
}

/// Sum the counts of every "test result:" line (one per test binary).
fn totals(output: &str) -> (usize, usize) {
    let count = |line: &str, key: &str| {
        line.split(';')
            .find_map(|part| part.trim().strip_suffix(key))
            .and_then(|n| n.trim().rsplit(' ').next())
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0)
    };
    output
        .lines()
        .filter(|line| line.contains("test result:"))
        .fold((0, 0), |(p, f), line| {
            (
                p.saturating_add(count(line, "passed")),
                f.saturating_add(count(line, "failed")),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::totals;

    #[test]
    fn totals_sum_every_binary() {
        let out = "test result: ok. 5 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out\n\
                   running 3 tests\n\
                   test result: FAILED. 2 passed; 1 failed; 0 ignored; 0 measured; 0 filtered out\n";
        assert_eq!(totals(out), (7, 1));
    }

    #[test]
    fn totals_default_to_zero() {
        assert_eq!(totals("no tests here"), (0, 0));
    }
}
