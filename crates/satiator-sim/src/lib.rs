//! Host-side simulator for the Satiator driver.
//!
//! [`SimCdBlock`] implements [`satiator::CdBlock`] on top of a register
//! model of the CD block and a simulated Satiator firmware with an
//! in-memory FAT volume. [`SimHost`] stands in for the SH-2 status register
//! and the BIOS. Together they let the whole driver run under `cargo test`.
//!
//! # Quick start
//!
//! ```
//! use satiator::{Mode, OpenFlags, Satiator};
//! use satiator_sim::{SimCdBlock, SimHost};
//!
//! let mut dev = SimCdBlock::new();
//! dev.firmware.fs.insert_file("/HELLO.TXT", b"hi");
//!
//! let mut sat = Satiator::new(dev, SimHost::new());
//! sat.set_mode(Mode::StorageApi).unwrap();
//! let fd = sat.open("HELLO.TXT", OpenFlags::READ).unwrap();
//! let mut buf = [0u8; 8];
//! assert_eq!(sat.read(fd, &mut buf).unwrap(), 2);
//! ```

// Simulator crate: host-only, panics are test failures.
#![allow(clippy::indexing_slicing)]
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![warn(clippy::print_stdout)]

pub mod cdblock;
pub mod firmware;
pub mod fs;
pub mod host;

pub use cdblock::{DeviceMode, SimCdBlock, Stats};
pub use firmware::{Identity, Reply, SimFirmware};
pub use fs::{Entry, SimFs};
pub use host::SimHost;

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per process.
///
/// Tests call this first so driver and simulator log points show up with
/// `--nocapture`.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
