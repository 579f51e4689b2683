// Host tooling: unwrap/expect/panic are acceptable here.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;
mod doc;
mod step;
mod test;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Satiator driver development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the driver builds on host and on a bare-metal target, plus lints
    Check {
        /// Bare-metal target used to prove the driver stays no_std
        #[arg(long, default_value = check::NO_STD_TARGET)]
        target: String,
    },
    /// Run unit, integration (simulator) and doc tests
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
        /// Cases per proptest property (sets PROPTEST_CASES)
        #[arg(long)]
        proptest_cases: Option<u32>,
    },
    /// Build and optionally open documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { target } => check::run(&target),
        Commands::Test {
            unit,
            integration,
            proptest_cases,
        } => test::run(unit, integration, proptest_cases),
        Commands::Doc { open } => doc::run(open),
    }
}
