//! Driver configuration and protocol limits.
//!
//! Limits that are part of the Satiator protocol live here as constants so
//! every layer validates against the same numbers. Run-time policy knobs
//! are grouped in [`Config`], built once and handed to
//! [`Satiator::with_config`](crate::Satiator::with_config).

use embassy_time::Duration;

/// Largest payload a single buffer transfer may carry, in bytes.
pub const MAX_TRANSFER: usize = 2048;

/// Size of the device-side buffer used to pack both rename operands
/// (`old`, NUL, `new`).
pub const RENAME_BOUND: usize = 512;

/// Fixed header preceding the name in a stat record
/// (size u32, date u16, time u16, attrib u8).
pub const STAT_HEADER_LEN: usize = 9;

/// Whether CPU interrupts are masked while a command is in flight.
///
/// Masking protects a command sequence from interrupt handlers that touch
/// the CD block, but it is slow on the SH-2 and starves interrupt-driven
/// consumers (VBlank audio, controller polling). The default leaves
/// interrupts alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptPolicy {
    /// Never touch the interrupt mask.
    #[default]
    Leave,
    /// Mask all interrupt levels around each command frame.
    MaskDuringCommand,
}

/// Upper bound on each busy-wait of the command executor.
///
/// The hardware itself has no timeout; an unresponsive device blocks the
/// caller forever under [`Deadline::Never`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deadline {
    /// Poll until the device answers.
    #[default]
    Never,
    /// Give up with [`Error::Timeout`](crate::Error::Timeout) once a single
    /// wait exceeds this duration.
    After(Duration),
}

/// Run-time driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    /// Interrupt masking around command frames.
    pub interrupt_policy: InterruptPolicy,
    /// Bound on each hardware wait.
    pub deadline: Deadline,
}

impl Config {
    /// Hardware-faithful defaults: no masking, no deadline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interrupt_policy: InterruptPolicy::Leave,
            deadline: Deadline::Never,
        }
    }

    /// Replace the interrupt policy.
    #[must_use]
    pub const fn with_interrupt_policy(mut self, policy: InterruptPolicy) -> Self {
        self.interrupt_policy = policy;
        self
    }

    /// Replace the wait deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_hardware_faithful() {
        let cfg = Config::default();
        assert_eq!(cfg, Config::new());
        assert_eq!(cfg.interrupt_policy, InterruptPolicy::Leave);
        assert_eq!(cfg.deadline, Deadline::Never);
    }

    #[test]
    fn builder_replaces_fields() {
        let cfg = Config::new()
            .with_interrupt_policy(InterruptPolicy::MaskDuringCommand)
            .with_deadline(Deadline::After(Duration::from_millis(50)));
        assert_eq!(cfg.interrupt_policy, InterruptPolicy::MaskDuringCommand);
        assert_eq!(cfg.deadline, Deadline::After(Duration::from_millis(50)));
    }

    #[allow(clippy::assertions_on_constants)]
    #[test]
    fn limits_fit_the_wire_format() {
        // Transfer lengths travel in a 16-bit register.
        assert!(MAX_TRANSFER <= usize::from(u16::MAX));
        assert!(RENAME_BOUND <= MAX_TRANSFER);
        assert!(MAX_TRANSFER % 4 == 0);
    }
}
