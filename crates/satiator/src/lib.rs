//! Driver for the Satiator SD card peripheral on the Saturn CD block.
//!
//! The Satiator sits where the CD drive used to be. By default it emulates
//! the drive; after an unlock sequence it exposes a FatFs-backed file API
//! through the CD block's command registers and data transfer port.
//!
//! # Architecture
//!
//! ```text
//! File API / system ops (fs, system)
//!         ↓
//! Mode switch (mode)
//!         ↓
//! Buffer transfer (transfer)
//!         ↓
//! Command executor + status (executor, frame)
//!         ↓
//! CdBlock register access (bus) + HostServices (host)
//! ```
//!
//! Everything runs synchronously: each call busy-waits on the HIRQ
//! register until the device answers. A [`Satiator`] value owns the bus, so
//! the borrow checker serialises access to the single command channel.
//!
//! # Features
//!
//! - `defmt`: log through `defmt` (on target)
//! - `tracing`: log through `tracing` (host builds, simulator)
//!
//! # Example
//!
//! ```no_run
//! use satiator::{CdBlock, HostServices, Mode, OpenFlags, Satiator};
//!
//! fn dump<B: CdBlock, H: HostServices>(sat: &mut Satiator<B, H>) -> satiator::Result<usize> {
//!     sat.set_mode(Mode::StorageApi)?;
//!     let fd = sat.open("README.TXT", OpenFlags::READ)?;
//!     let mut buf = [0u8; 512];
//!     let n = sat.read(fd, &mut buf)?;
//!     sat.close(fd)?;
//!     Ok(n)
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)]
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this driver crate:
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
mod fmt;

pub mod bus;
pub mod cart;
pub mod config;
pub mod error;
pub mod frame;
pub mod fs;
pub mod host;
pub mod mode;
pub mod regs;
pub mod system;
pub mod transfer;

mod driver;
mod executor;

#[cfg(test)]
mod testing;

pub use bus::{CdBlock, CommandReg, MmioCdBlock};
pub use cart::{locate, CartridgeHeader};
pub use config::{Config, Deadline, InterruptPolicy, MAX_TRANSFER, RENAME_BOUND, STAT_HEADER_LEN};
pub use driver::Satiator;
pub use error::{Error, FsError, Result};
pub use executor::STATUS_FRAME;
pub use frame::{CommandFrame, StatusResponse};
pub use fs::{Attributes, FatTimestamp, Handle, OpenFlags, StatInfo, Whence};
pub use host::{HostServices, SaturnHost};
pub use mode::Mode;
pub use transfer::Payload;
