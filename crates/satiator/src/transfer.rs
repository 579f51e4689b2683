//! Buffer transfer engine.
//!
//! Every variable-length payload (names, file data, stat records, info
//! blobs) crosses the 32-bit data transfer register, one word at a time.
//! Words carry bytes in console (big-endian) order; a partial final word is
//! zero-padded on the way out and trimmed on the way in.

use crate::bus::{CdBlock, CommandReg};
use crate::config::MAX_TRANSFER;
use crate::driver::Satiator;
use crate::error::{Error, Result};
use crate::frame::CommandFrame;
use crate::host::HostServices;
use crate::regs::{HIRQ_DRDY, HIRQ_EHST, OP_READ_BUFFER, OP_WRITE_BUFFER};

/// Zero words that must follow the payload of every host → device transfer.
pub const WRITE_TRAILER_WORDS: usize = 2;

/// A payload and the direction it travels.
pub enum Payload<'a> {
    /// Host → device.
    Out(&'a [u8]),
    /// Device → host; fills the whole slice.
    In(&'a mut [u8]),
}

impl Payload<'_> {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Payload::Out(data) => data.len(),
            Payload::In(buf) => buf.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Number of data-register words needed for `len` bytes.
#[must_use]
pub const fn words_for(len: usize) -> usize {
    len.div_ceil(4)
}

fn pack_word(chunk: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    for (dst, src) in bytes.iter_mut().zip(chunk) {
        *dst = *src;
    }
    u32::from_be_bytes(bytes)
}

impl<B: CdBlock, H: HostServices> Satiator<B, H> {
    /// Move `payload` through the data transfer register.
    ///
    /// Fails with invalid-parameter before touching hardware if the payload
    /// exceeds [`MAX_TRANSFER`], and with [`Error::Transfer`] if the device
    /// refuses the transfer.
    pub fn transfer(&mut self, payload: Payload<'_>) -> Result<()> {
        let opcode = match payload {
            Payload::Out(_) => OP_WRITE_BUFFER,
            Payload::In(_) => OP_READ_BUFFER,
        };
        self.open_channel(opcode, payload.len())?;

        match payload {
            Payload::Out(data) => {
                for chunk in data.chunks(4) {
                    self.bus.write_data(pack_word(chunk));
                }
                for _ in 0..WRITE_TRAILER_WORDS {
                    self.bus.write_data(0);
                }
            }
            Payload::In(buf) => {
                for chunk in buf.chunks_mut(4) {
                    let word = self.bus.read_data().to_be_bytes();
                    for (dst, src) in chunk.iter_mut().zip(word) {
                        *dst = src;
                    }
                }
            }
        }
        Ok(())
    }

    /// Send `data` to the device buffer.
    pub fn write_buffer(&mut self, data: &[u8]) -> Result<()> {
        self.transfer(Payload::Out(data))
    }

    /// Fill `buf` from the device buffer.
    pub fn read_buffer(&mut self, buf: &mut [u8]) -> Result<()> {
        self.transfer(Payload::In(buf))
    }

    #[allow(clippy::arithmetic_side_effects)]
    pub(crate) fn open_channel(&mut self, opcode: u8, len: usize) -> Result<()> {
        if len > MAX_TRANSFER {
            return Err(Error::INVALID_PARAMETER);
        }
        let length = u32::try_from(len).map_err(|_| Error::INVALID_PARAMETER)?;
        self.execute(CommandFrame::new(opcode, 0, 0, length), HIRQ_EHST)?;
        let code = self.bus.read_cr(CommandReg::Cr1) >> 8;
        if code != 0 {
            warn!("buffer transfer of {} bytes refused ({})", len, code);
            return Err(Error::Transfer);
        }
        self.wait_for(HIRQ_DRDY)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use crate::testing::{FakeBus, FakeHost};

    fn driver() -> Satiator<FakeBus, FakeHost> {
        Satiator::new(FakeBus::new(), FakeHost::default())
    }

    #[test]
    fn write_packs_big_endian_and_appends_trailer() {
        let mut sat = driver();
        sat.write_buffer(b"ABCDEF").unwrap();
        assert_eq!(sat.bus.issued, [[0x9100, 0, 0, 6]]);
        assert_eq!(sat.bus.data_out, [0x4142_4344, 0x4546_0000, 0, 0]);
    }

    #[test]
    fn empty_write_still_sends_trailer() {
        let mut sat = driver();
        sat.write_buffer(&[]).unwrap();
        assert_eq!(sat.bus.data_out, [0, 0]);
    }

    #[test]
    fn read_has_no_trailer_and_trims_last_word() {
        let mut sat = driver();
        sat.bus.data_in.extend([0x6869_6A6B, 0x6C6D_FFFF]);
        let mut buf = [0u8; 6];
        sat.read_buffer(&mut buf).unwrap();
        assert_eq!(&buf, b"hijklm");
        assert_eq!(sat.bus.issued, [[0x9200, 0, 0, 6]]);
        assert!(sat.bus.data_out.is_empty());
        assert!(sat.bus.data_in.is_empty());
    }

    #[test]
    fn transfer_waits_on_host_transfer_flag() {
        let mut sat = driver();
        sat.read_buffer(&mut [0u8; 4]).unwrap();
        assert_eq!(sat.bus.hirq_writes, [!(crate::regs::HIRQ_CMOK | HIRQ_EHST)]);
    }

    #[test]
    fn refused_transfer_collapses_to_transfer_error() {
        let mut sat = driver();
        sat.bus.respond([0x0700, 0, 0, 0]);
        assert_eq!(sat.write_buffer(b"x"), Err(Error::Transfer));
        assert!(sat.bus.data_out.is_empty());
    }

    #[test]
    fn oversized_transfer_touches_nothing() {
        let mut sat = driver();
        let big = vec![0u8; MAX_TRANSFER + 1];
        assert_eq!(sat.write_buffer(&big), Err(Error::INVALID_PARAMETER));
        assert_eq!(sat.bus.accesses, 0);
    }

    #[test]
    fn word_count_rounds_up() {
        assert_eq!(words_for(0), 0);
        assert_eq!(words_for(1), 1);
        assert_eq!(words_for(4), 1);
        assert_eq!(words_for(5), 2);
        assert_eq!(words_for(MAX_TRANSFER), MAX_TRANSFER / 4);
    }
}
