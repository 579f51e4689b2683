//! Device personality switch.
//!
//! The Satiator either emulates the CD drive (the console sees a disc) or
//! exposes the SD card API. Switching into API mode is a two-step unlock
//! followed by a presence probe, because the unlock frame is also accepted
//! by genuine MPEG cards which must not be mistaken for a Satiator.
//!
//! The tracked [`Mode`] changes only after the device has confirmed the
//! transition.

use crate::bus::{CdBlock, CommandReg};
use crate::driver::Satiator;
use crate::error::{Error, Result};
use crate::frame::CommandFrame;
use crate::host::HostServices;
use crate::regs::{
    FRAME_ENTER_DISC_EMULATION, FRAME_HARDWARE_INFO, FRAME_STOP_DRIVE, FRAME_UNLOCK_API,
    HIRQ_EFLS, HIRQ_MPED, SATIATOR_MPEG_VERSION,
};

/// Device personality as tracked by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Nothing has been requested yet; the device state is not known.
    #[default]
    Unknown,
    /// The SD card API is exposed.
    StorageApi,
    /// The device emulates a CD drive.
    DiscEmulation,
}

impl Mode {
    /// Short name for log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::StorageApi => "storage-api",
            Self::DiscEmulation => "disc-emulation",
        }
    }
}

impl<B: CdBlock, H: HostServices> Satiator<B, H> {
    /// Switch the device personality.
    ///
    /// The first call from [`Mode::Unknown`] first puts the device in the
    /// disc emulation baseline, then proceeds to `target`. That bootstrap
    /// runs for every target, [`Mode::Unknown`] included, so a fresh
    /// session always ends up in a known mode. Once the mode is known,
    /// requesting the current mode (or [`Mode::Unknown`]) is a no-op that
    /// touches no register.
    ///
    /// Entering [`Mode::StorageApi`] fails with [`Error::NotPresent`] when
    /// the presence probe does not identify a Satiator. The tracked mode is
    /// left unchanged in that case, but the unlock frame has already been
    /// sent: the hardware may be half-way through the transition and the
    /// driver has no way to tell.
    pub fn set_mode(&mut self, target: Mode) -> Result<()> {
        if self.mode == Mode::Unknown {
            // Assume API mode so the baseline request below always sends
            // the leave-API frame.
            self.mode = Mode::StorageApi;
            if let Err(err) = self.set_mode(Mode::DiscEmulation) {
                self.mode = Mode::Unknown;
                return Err(err);
            }
        }

        if target == self.mode || target == Mode::Unknown {
            return Ok(());
        }

        match target {
            Mode::DiscEmulation => {
                self.execute(CommandFrame::raw(FRAME_ENTER_DISC_EMULATION), HIRQ_MPED)?;
            }
            Mode::StorageApi => {
                self.execute(CommandFrame::raw(FRAME_UNLOCK_API), HIRQ_EFLS)?;
                if !self.probe_presence()? {
                    warn!(
                        "presence probe failed after unlock; device state unknown, tracked mode stays {}",
                        self.mode.as_str()
                    );
                    return Err(Error::NotPresent);
                }
                self.execute(CommandFrame::raw(FRAME_STOP_DRIVE), 0)?;
            }
            Mode::Unknown => {}
        }

        info!("mode {} -> {}", self.mode.as_str(), target.as_str());
        self.mode = target;
        Ok(())
    }

    /// Ask the CD block for its hardware info and check the MPEG version
    /// field: a Satiator reports 2, a genuine MPEG card 1.
    pub fn probe_presence(&mut self) -> Result<bool> {
        self.execute(CommandFrame::raw(FRAME_HARDWARE_INFO), 0)?;
        let version = self.bus.read_cr(CommandReg::Cr3) & 0xFF;
        Ok(version == u16::from(SATIATOR_MPEG_VERSION))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::testing::{FakeBus, FakeHost};

    fn driver() -> Satiator<FakeBus, FakeHost> {
        Satiator::new(FakeBus::new(), FakeHost::default())
    }

    #[test]
    fn first_request_bootstraps_to_disc_emulation() {
        let mut sat = driver();
        sat.set_mode(Mode::DiscEmulation).unwrap();
        assert_eq!(sat.mode(), Mode::DiscEmulation);
        assert_eq!(sat.bus.issued, [FRAME_ENTER_DISC_EMULATION]);
    }

    #[test]
    fn entering_api_unlocks_probes_and_stops_drive() {
        let mut sat = driver();
        sat.set_mode(Mode::DiscEmulation).unwrap();
        sat.bus.respond([0; 4]).respond([0, 0, 0x0002, 0]).respond([0; 4]);
        sat.set_mode(Mode::StorageApi).unwrap();
        assert_eq!(sat.mode(), Mode::StorageApi);
        assert_eq!(
            &sat.bus.issued[1..],
            [FRAME_UNLOCK_API, FRAME_HARDWARE_INFO, FRAME_STOP_DRIVE]
        );
    }

    #[test]
    fn probe_failure_keeps_tracked_mode() {
        let mut sat = driver();
        sat.set_mode(Mode::DiscEmulation).unwrap();
        // MPEG version 1: a genuine MPEG card.
        sat.bus.respond([0; 4]).respond([0, 0, 0x0001, 0]);
        assert_eq!(sat.set_mode(Mode::StorageApi), Err(Error::NotPresent));
        assert_eq!(sat.mode(), Mode::DiscEmulation);
        assert_eq!(sat.bus.issued.len(), 3);
    }

    #[test]
    fn unknown_request_on_fresh_session_still_bootstraps() {
        let mut sat = driver();
        sat.set_mode(Mode::Unknown).unwrap();
        assert_eq!(sat.mode(), Mode::DiscEmulation);
        assert_eq!(sat.bus.issued, [FRAME_ENTER_DISC_EMULATION]);

        let before = sat.bus.accesses;
        sat.set_mode(Mode::Unknown).unwrap();
        assert_eq!(sat.bus.accesses, before);
    }

    #[test]
    fn same_mode_request_touches_no_register() {
        let mut sat = driver();
        sat.set_mode(Mode::DiscEmulation).unwrap();
        let before = sat.bus.accesses;
        sat.set_mode(Mode::DiscEmulation).unwrap();
        assert_eq!(sat.bus.accesses, before);
    }

    #[test]
    fn probe_reads_only_low_byte_of_cr3() {
        let mut sat = driver();
        sat.bus.respond([0, 0, 0xAB02, 0]);
        assert!(sat.probe_presence().unwrap());
    }
}
