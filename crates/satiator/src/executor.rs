//! Register command executor, status decoder and call builder.

use embassy_time::Instant;

use crate::bus::{CdBlock, CommandReg};
use crate::config::{Deadline, InterruptPolicy};
use crate::driver::Satiator;
use crate::error::{Error, Result};
use crate::frame::{CommandFrame, StatusResponse};
use crate::host::HostServices;
use crate::regs::{HIRQ_CMOK, HIRQ_MPED, OP_GET_STATUS};

/// The fixed "get status" frame.
pub const STATUS_FRAME: CommandFrame = CommandFrame::new(OP_GET_STATUS, 0, 0, 0);

impl<B: CdBlock, H: HostServices> Satiator<B, H> {
    /// Issue `frame` and block until the device accepts it and, if
    /// `completion` is non-zero, until any of the `completion` HIRQ bits is
    /// raised.
    ///
    /// With [`Deadline::Never`] an unresponsive device blocks forever.
    pub fn execute(&mut self, frame: CommandFrame, completion: u16) -> Result<()> {
        let [w0, w1, w2, w3] = frame.words();
        trace!("cmd {:#x} {:#x} {:#x} {:#x} wait {:#x}", w0, w1, w2, w3, completion);

        let saved = match self.config.interrupt_policy {
            InterruptPolicy::Leave => None,
            InterruptPolicy::MaskDuringCommand => Some(self.host.mask_interrupts()),
        };
        let result = self.issue(frame, completion);
        if let Some(saved) = saved {
            self.host.restore_interrupts(saved);
        }
        result
    }

    fn issue(&mut self, frame: CommandFrame, completion: u16) -> Result<()> {
        self.bus.write_hirq(!(HIRQ_CMOK | completion));
        for (reg, word) in CommandReg::ALL.into_iter().zip(frame.words()) {
            self.bus.write_cr(reg, word);
        }
        self.wait_for(HIRQ_CMOK)?;
        if completion != 0 {
            self.wait_for(completion)?;
        }
        Ok(())
    }

    /// Poll HIRQ until any bit of `bits` is set.
    pub(crate) fn wait_for(&mut self, bits: u16) -> Result<()> {
        let limit = match self.config.deadline {
            Deadline::Never => None,
            Deadline::After(duration) => Some((Instant::now(), duration)),
        };
        loop {
            if self.bus.read_hirq() & bits != 0 {
                return Ok(());
            }
            if let Some((start, duration)) = limit {
                if start.elapsed() > duration {
                    warn!("HIRQ {:#x} not raised before deadline", bits);
                    return Err(Error::Timeout);
                }
            }
        }
    }

    /// Snapshot CR1..CR4 after a "get status" frame.
    ///
    /// The snapshot replaces the previous one and is returned for
    /// convenience; [`Satiator::last_status`] reads it back.
    pub fn get_status(&mut self) -> Result<StatusResponse> {
        self.execute(STATUS_FRAME, 0)?;
        self.status = StatusResponse(CommandReg::ALL.map(|reg| self.bus.read_cr(reg)));
        Ok(self.status)
    }

    /// Fetch the status and fail with its error byte if non-zero.
    pub fn check_status(&mut self) -> Result<()> {
        let code = self.get_status()?.error_code();
        if code != 0 {
            debug!("device status {}", code);
            return Err(Error::from_status(code));
        }
        Ok(())
    }

    /// The 32-bit length/offset field of the last status snapshot.
    pub fn extract_length(&self) -> u32 {
        self.status.length()
    }

    /// Pack, issue and status-check a Satiator API command.
    ///
    /// Completion is signalled by `MPED`.
    pub fn simple_call(&mut self, opcode: u8, target: u8, flags: u16, length: u32) -> Result<()> {
        self.execute(CommandFrame::new(opcode, target, flags, length), HIRQ_MPED)?;
        self.check_status()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use embassy_time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::error::FsError;
    use crate::regs::{HIRQ_EFLS, OP_CLOSE};
    use crate::testing::{FakeBus, FakeHost};

    fn driver() -> Satiator<FakeBus, FakeHost> {
        Satiator::new(FakeBus::new(), FakeHost::default())
    }

    #[test]
    fn execute_clears_cmok_and_completion_then_writes_frame() {
        let mut sat = driver();
        sat.execute(CommandFrame::raw([1, 2, 3, 4]), HIRQ_EFLS).unwrap();
        assert_eq!(sat.bus.hirq_writes, [!(HIRQ_CMOK | HIRQ_EFLS)]);
        assert_eq!(sat.bus.issued, [[1, 2, 3, 4]]);
    }

    #[test]
    fn execute_waits_for_completion_bits() {
        let mut sat = Satiator::with_config(
            FakeBus::new(),
            FakeHost::default(),
            Config::new().with_deadline(Deadline::After(Duration::from_millis(20))),
        );
        // Only CMOK is raised: a completion wait on MPED must time out.
        sat.bus.raise_on_issue = HIRQ_CMOK;
        assert_eq!(sat.execute(STATUS_FRAME, HIRQ_MPED), Err(Error::Timeout));
        // Without a completion mask CMOK alone is enough.
        assert_eq!(sat.execute(STATUS_FRAME, 0), Ok(()));
    }

    #[test]
    fn get_status_snapshots_all_four_registers() {
        let mut sat = driver();
        sat.bus.respond([0x0000, 0x0011, 0x0022, 0x0033]);
        let status = sat.get_status().unwrap();
        assert_eq!(status.words(), [0x0000, 0x0011, 0x0022, 0x0033]);
        assert_eq!(sat.last_status(), status);
        assert_eq!(sat.bus.issued, [[0x9000, 0, 0, 0]]);
    }

    #[test]
    fn check_status_surfaces_error_byte() {
        let mut sat = driver();
        sat.bus.respond([0x0400, 0, 0, 0]);
        assert_eq!(sat.check_status(), Err(Error::Fs(FsError::NoFile)));
        assert_eq!(sat.check_status().map_err(Error::code), Ok(()));
    }

    #[test]
    fn simple_call_packs_and_checks() {
        let mut sat = driver();
        sat.bus.respond([0, 0, 0, 0]).respond([0, 0, 0x0001, 0x0002]);
        sat.simple_call(OP_CLOSE, 7, 0x00AA, 0x0003_0004).unwrap();
        assert_eq!(sat.bus.issued[0], [0xA107, 0x00AA, 0x0003, 0x0004]);
        assert_eq!(sat.bus.issued[1], [0x9000, 0, 0, 0]);
        assert_eq!(sat.extract_length(), 0x0001_0002);
        // Call frame waits on MPED.
        assert_eq!(sat.bus.hirq_writes[0], !(HIRQ_CMOK | HIRQ_MPED));
    }

    #[test]
    fn interrupts_masked_only_when_configured() {
        let mut sat = driver();
        sat.execute(STATUS_FRAME, 0).unwrap();
        assert_eq!(sat.host.masked, 0);

        sat.set_config(Config::new().with_interrupt_policy(InterruptPolicy::MaskDuringCommand));
        sat.execute(STATUS_FRAME, 0).unwrap();
        assert_eq!(sat.host.masked, 1);
        assert_eq!(sat.host.restored, [0x70]);
    }

    #[test]
    fn interrupts_restored_after_timeout() {
        let mut sat = Satiator::with_config(
            FakeBus::new(),
            FakeHost::default(),
            Config::new()
                .with_interrupt_policy(InterruptPolicy::MaskDuringCommand)
                .with_deadline(Deadline::After(Duration::from_millis(5))),
        );
        sat.bus.raise_on_issue = 0;
        assert_eq!(sat.execute(STATUS_FRAME, 0), Err(Error::Timeout));
        assert_eq!(sat.host.restored.len(), 1);
    }
}
