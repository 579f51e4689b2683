//! The driver session.

use crate::bus::CdBlock;
use crate::config::Config;
use crate::frame::StatusResponse;
use crate::host::HostServices;
use crate::mode::Mode;

/// A Satiator driver session.
///
/// Owns the CD block bus, the host services, the tracked device [`Mode`]
/// and the single response snapshot. Every operation takes `&mut self`:
/// the command registers and the transfer channel admit one command at a
/// time, and the type system is what serialises callers. Share it across
/// execution contexts only behind an external lock.
pub struct Satiator<B, H> {
    pub(crate) bus: B,
    pub(crate) host: H,
    pub(crate) config: Config,
    pub(crate) mode: Mode,
    pub(crate) status: StatusResponse,
}

impl<B: CdBlock, H: HostServices> Satiator<B, H> {
    /// Create a session with the hardware-faithful default [`Config`].
    ///
    /// No register is touched until the first operation. The device mode
    /// starts as [`Mode::Unknown`].
    pub fn new(bus: B, host: H) -> Self {
        Self::with_config(bus, host, Config::new())
    }

    /// Create a session with an explicit configuration.
    pub fn with_config(bus: B, host: H, config: Config) -> Self {
        Self {
            bus,
            host,
            config,
            mode: Mode::Unknown,
            status: StatusResponse::default(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration. Takes effect from the next command.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// The mode the driver believes the device is in.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The response captured by the most recent status query.
    ///
    /// Overwritten by every command that checks status; copy out what you
    /// need before issuing the next one.
    pub fn last_status(&self) -> StatusResponse {
        self.status
    }

    /// Borrow the bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Borrow the bus mutably, e.g. to inject faults in a simulator.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Borrow the host services.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Tear the session down and hand back its parts.
    pub fn release(self) -> (B, H) {
        (self.bus, self.host)
    }
}
