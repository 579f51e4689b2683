//! Register-level model of the CD block with a Satiator behind it.
//!
//! Frames are decoded when CR4 is written, as on hardware. Completion is
//! immediate: by the time the driver starts polling, the HIRQ bits for the
//! command are already raised. Faults can be injected to exercise the
//! driver's error paths.

use std::collections::VecDeque;

use satiator::regs::{
    FRAME_ENTER_DISC_EMULATION, FRAME_HARDWARE_INFO, FRAME_STOP_DRIVE, FRAME_UNLOCK_API,
    HIRQ_CMOK, HIRQ_DRDY, HIRQ_EFLS, HIRQ_EHST, HIRQ_MPED, OP_GET_STATUS, OP_READ_BUFFER,
    OP_WRITE_BUFFER, SATIATOR_MPEG_VERSION,
};
use satiator::transfer::{words_for, WRITE_TRAILER_WORDS};
use satiator::{CdBlock, CommandFrame, CommandReg, FsError};

use crate::firmware::{Reply, SimFirmware};

/// MPEG version a genuine MPEG card reports in the hardware info.
pub const GENUINE_MPEG_VERSION: u8 = 1;

/// Device personality as seen from inside the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Emulating the CD drive.
    Disc,
    /// Serving the SD card API.
    Api,
}

#[derive(Debug)]
enum Transfer {
    Idle,
    /// Host → device: payload words plus trailer still expected.
    Receiving { len: usize, words: Vec<u32>, expected: usize },
    /// Device → host.
    Sending(VecDeque<u32>),
}

/// Counters and logs the tests assert on.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    /// Every register or data port access.
    pub accesses: usize,
    /// Writes to the command registers.
    pub register_writes: usize,
    /// Every frame issued, in order.
    pub commands: Vec<CommandFrame>,
    /// Host → device transfers whose trailer was missing or non-zero.
    pub trailer_errors: usize,
    /// Data words read with no transfer in progress, or written past the
    /// announced length.
    pub data_overruns: usize,
}

/// A simulated CD block.
#[derive(Debug)]
pub struct SimCdBlock {
    hirq: u16,
    cr: [u16; 4],
    pending: [u16; 4],
    mode: DeviceMode,
    mpeg_version: u8,
    status: [u16; 4],
    buffer: Vec<u8>,
    transfer: Transfer,
    /// Firmware state behind the API.
    pub firmware: SimFirmware,
    /// Access counters and the command log.
    pub stats: Stats,
    unresponsive: bool,
    refuse_transfers: Option<u8>,
}

impl Default for SimCdBlock {
    fn default() -> Self {
        Self::new()
    }
}

fn index(reg: CommandReg) -> usize {
    match reg {
        CommandReg::Cr1 => 0,
        CommandReg::Cr2 => 1,
        CommandReg::Cr3 => 2,
        CommandReg::Cr4 => 3,
    }
}

impl SimCdBlock {
    /// A Satiator in disc emulation with an empty SD card.
    pub fn new() -> Self {
        Self {
            hirq: 0,
            cr: [0; 4],
            pending: [0; 4],
            mode: DeviceMode::Disc,
            mpeg_version: SATIATOR_MPEG_VERSION,
            status: [0; 4],
            buffer: Vec::new(),
            transfer: Transfer::Idle,
            firmware: SimFirmware::new(),
            stats: Stats::default(),
            unresponsive: false,
            refuse_transfers: None,
        }
    }

    /// A genuine MPEG card: accepts the unlock frame but fails the probe.
    pub fn genuine_mpeg_card() -> Self {
        Self { mpeg_version: GENUINE_MPEG_VERSION, ..Self::new() }
    }

    /// Current personality.
    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Stop raising any HIRQ bit, as a hung device would.
    pub fn set_unresponsive(&mut self, unresponsive: bool) {
        self.unresponsive = unresponsive;
    }

    /// Refuse buffer transfers with `code` in CR1's high byte.
    pub fn refuse_transfers(&mut self, code: Option<u8>) {
        self.refuse_transfers = code;
    }

    /// Bytes currently held in the device buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn raise(&mut self, bits: u16) {
        if !self.unresponsive {
            self.hirq |= bits;
        }
    }

    fn issue(&mut self, frame: CommandFrame) {
        self.stats.commands.push(frame);
        tracing::trace!(words = ?frame.words(), "frame");

        match frame.words() {
            FRAME_ENTER_DISC_EMULATION => {
                // Completes even when already emulating.
                self.mode = DeviceMode::Disc;
                self.cr = [0; 4];
                self.raise(HIRQ_CMOK | HIRQ_MPED);
                return;
            }
            FRAME_UNLOCK_API => {
                if self.mpeg_version == SATIATOR_MPEG_VERSION {
                    self.mode = DeviceMode::Api;
                }
                self.cr = [0; 4];
                self.raise(HIRQ_CMOK | HIRQ_EFLS);
                return;
            }
            FRAME_HARDWARE_INFO => {
                self.cr = [0, 0, u16::from(self.mpeg_version), 0];
                self.raise(HIRQ_CMOK);
                return;
            }
            FRAME_STOP_DRIVE => {
                self.cr = [0; 4];
                self.raise(HIRQ_CMOK);
                return;
            }
            _ => {}
        }

        match frame.opcode() {
            OP_GET_STATUS => {
                self.cr = self.status;
                self.raise(HIRQ_CMOK);
            }
            OP_WRITE_BUFFER | OP_READ_BUFFER => self.open_transfer(frame),
            _ => {
                let reply = if self.mode == DeviceMode::Api {
                    self.firmware.handle(frame, &mut self.buffer)
                } else {
                    Reply { code: FsError::NotReady.code(), ..Reply::default() }
                };
                self.status = reply.words();
                self.cr = [0; 4];
                self.raise(HIRQ_CMOK | HIRQ_MPED);
            }
        }
    }

    fn open_transfer(&mut self, frame: CommandFrame) {
        if let Some(code) = self.refuse_transfers {
            self.cr = [u16::from(code) << 8, 0, 0, 0];
            self.raise(HIRQ_CMOK | HIRQ_EHST);
            return;
        }
        let len = frame.length() as usize;
        self.transfer = if frame.opcode() == OP_WRITE_BUFFER {
            Transfer::Receiving {
                len,
                words: Vec::new(),
                expected: words_for(len) + WRITE_TRAILER_WORDS,
            }
        } else if len == 0 {
            Transfer::Idle
        } else {
            let mut bytes = self.buffer.clone();
            bytes.resize(words_for(len) * 4, 0);
            Transfer::Sending(
                bytes
                    .chunks_exact(4)
                    .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
                    .collect(),
            )
        };
        self.cr = [0; 4];
        self.raise(HIRQ_CMOK | HIRQ_EHST | HIRQ_DRDY);
    }

    fn finish_receive(&mut self, len: usize, words: &[u32]) {
        let split = words.len() - WRITE_TRAILER_WORDS;
        if words[split..].iter().any(|w| *w != 0) {
            self.stats.trailer_errors += 1;
        }
        let mut bytes: Vec<u8> = words[..split].iter().flat_map(|w| w.to_be_bytes()).collect();
        bytes.truncate(len);
        self.buffer = bytes;
    }
}

impl CdBlock for SimCdBlock {
    fn read_hirq(&mut self) -> u16 {
        self.stats.accesses += 1;
        self.hirq
    }

    fn write_hirq(&mut self, value: u16) {
        self.stats.accesses += 1;
        self.hirq &= value;
    }

    fn read_cr(&mut self, reg: CommandReg) -> u16 {
        self.stats.accesses += 1;
        self.cr[index(reg)]
    }

    fn write_cr(&mut self, reg: CommandReg, value: u16) {
        self.stats.accesses += 1;
        self.stats.register_writes += 1;
        self.pending[index(reg)] = value;
        if reg == CommandReg::Cr4 {
            self.issue(CommandFrame::raw(self.pending));
        }
    }

    fn read_data(&mut self) -> u32 {
        self.stats.accesses += 1;
        match &mut self.transfer {
            Transfer::Sending(words) => {
                let word = words.pop_front().unwrap_or(0);
                if words.is_empty() {
                    self.transfer = Transfer::Idle;
                }
                word
            }
            _ => {
                self.stats.data_overruns += 1;
                0
            }
        }
    }

    fn write_data(&mut self, value: u32) {
        self.stats.accesses += 1;
        let Transfer::Receiving { len, words, expected } = &mut self.transfer else {
            self.stats.data_overruns += 1;
            return;
        };
        words.push(value);
        if words.len() == *expected {
            let (len, words) = (*len, std::mem::take(words));
            self.transfer = Transfer::Idle;
            self.finish_receive(len, &words);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn issue(sim: &mut SimCdBlock, words: [u16; 4]) {
        for (reg, word) in CommandReg::ALL.into_iter().zip(words) {
            sim.write_cr(reg, word);
        }
    }

    #[test]
    fn unlock_enters_api_only_on_satiator() {
        let mut sim = SimCdBlock::new();
        issue(&mut sim, FRAME_UNLOCK_API);
        assert_eq!(sim.mode(), DeviceMode::Api);

        let mut card = SimCdBlock::genuine_mpeg_card();
        issue(&mut card, FRAME_UNLOCK_API);
        assert_eq!(card.mode(), DeviceMode::Disc);
        issue(&mut card, FRAME_HARDWARE_INFO);
        assert_eq!(card.read_cr(CommandReg::Cr3), 1);
    }

    #[test]
    fn write_buffer_collects_payload_and_checks_trailer() {
        let mut sim = SimCdBlock::new();
        issue(&mut sim, [0x9100, 0, 0, 5]);
        assert_eq!(sim.read_hirq() & (HIRQ_EHST | HIRQ_DRDY), HIRQ_EHST | HIRQ_DRDY);
        for w in [0x4142_4344, 0x4500_0000, 0, 7] {
            sim.write_data(w);
        }
        assert_eq!(sim.buffer(), b"ABCDE");
        assert_eq!(sim.stats.trailer_errors, 1);
    }

    #[test]
    fn api_commands_outside_api_mode_report_not_ready() {
        let mut sim = SimCdBlock::new();
        issue(&mut sim, [0xA100, 0, 0, 0]);
        issue(&mut sim, [0x9000, 0, 0, 0]);
        assert_eq!(sim.read_cr(CommandReg::Cr1) >> 8, u16::from(FsError::NotReady.code()));
    }

    #[test]
    fn unresponsive_device_raises_nothing() {
        let mut sim = SimCdBlock::new();
        sim.set_unresponsive(true);
        issue(&mut sim, [0x9000, 0, 0, 0]);
        assert_eq!(sim.read_hirq(), 0);
    }
}
