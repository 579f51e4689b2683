use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, OnFailure};

/// rustc has no SH-2 target; any bare-metal target proves the driver
/// compiles without `std`.
pub const NO_STD_TARGET: &str = "thumbv6m-none-eabi";

pub fn run(target: &str) -> Result<()> {
    println!();
    println!("{}", "🔍 Checking the Satiator driver...".cyan().bold());
    println!();

    let total_start = Instant::now();

    cargo("Host workspace check", &["check", "--workspace", "--all-targets"], &[], OnFailure::Abort)?;

    let base = ["check", "-p", "satiator", "--target", target, "--no-default-features"];
    cargo(&format!("no_std check ({target})"), &base, &[], OnFailure::Abort)?;
    let mut with_defmt = base.to_vec();
    with_defmt.extend(["--features", "defmt"]);
    cargo(&format!("no_std check ({target}, defmt)"), &with_defmt, &[], OnFailure::Abort)?;

    cargo(
        "Clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        &[],
        OnFailure::Warn,
    )?;

    let fmt = cargo("Formatting check", &["fmt", "--all", "--check"], &[], OnFailure::Warn)?;
    if !fmt.status.success() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    println!(
        "{}",
        format!("✓ All checks completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}
