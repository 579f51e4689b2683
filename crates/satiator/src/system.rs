//! Device information, maintenance commands and the firmware handoff.

use core::convert::Infallible;

use crate::bus::CdBlock;
use crate::config::MAX_TRANSFER;
use crate::driver::Satiator;
use crate::error::{Error, Result};
use crate::host::HostServices;
use crate::mode::Mode;
use crate::regs::{
    INFO_BOOTLOADER_VERSION, INFO_FW_VERSION, INFO_SD_LATENCY, INFO_SERIAL_NUMBER,
    MENU_LOAD_ADDRESS, MKFS_MAGIC_FLAGS, MKFS_MAGIC_LENGTH, MPEG_ROM_MENU_INDEX,
    MPEG_ROM_MENU_SIZE, OP_EMULATE, OP_INFO, OP_MKFS, OP_READ_BUFFER, S_BOOT_NO_AUTOLOAD,
};

impl<B: CdBlock, H: HostServices> Satiator<B, H> {
    fn info_call(&mut self, selector: u8, flags: u16) -> Result<()> {
        self.simple_call(OP_INFO, selector, flags, 0)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.read_buffer(&mut raw)?;
        Ok(u32::from_be_bytes(raw))
    }

    /// Copy the firmware version string into `buf` with a NUL terminator;
    /// returns its length (at most `buf.len() - 1`).
    pub fn firmware_version(&mut self, buf: &mut [u8]) -> Result<usize> {
        let room = buf.len().checked_sub(1).ok_or(Error::INVALID_PARAMETER)?;
        self.info_call(INFO_FW_VERSION, 0)?;
        self.read_terminated(buf, room)
    }

    /// The firmware version as a string of at most `N` bytes.
    ///
    /// Longer versions are cut; anything after the first NUL or invalid
    /// UTF-8 byte is dropped.
    pub fn firmware_version_string<const N: usize>(&mut self) -> Result<heapless::String<N>> {
        let mut raw = [0u8; N];
        self.info_call(INFO_FW_VERSION, 0)?;
        let len = usize::try_from(self.extract_length())
            .unwrap_or(usize::MAX)
            .min(N)
            .min(MAX_TRANSFER);
        let raw = raw.get_mut(..len).ok_or(Error::INVALID_PARAMETER)?;
        self.read_buffer(raw)?;
        let raw: &[u8] = raw;

        let raw = match raw.iter().position(|b| *b == 0) {
            Some(nul) => raw.get(..nul).unwrap_or_default(),
            None => raw,
        };
        let text = match core::str::from_utf8(raw) {
            Ok(text) => text,
            Err(err) => core::str::from_utf8(raw.get(..err.valid_up_to()).unwrap_or_default())
                .unwrap_or_default(),
        };
        let mut version = heapless::String::new();
        version.push_str(text).map_err(|_| Error::INVALID_PARAMETER)?;
        Ok(version)
    }

    /// Bootloader version word.
    pub fn bootloader_version(&mut self) -> Result<u32> {
        self.info_call(INFO_BOOTLOADER_VERSION, 0)?;
        self.read_u32()
    }

    /// Device serial number.
    pub fn serial_number(&mut self) -> Result<u32> {
        self.info_call(INFO_SERIAL_NUMBER, 0)?;
        self.read_u32()
    }

    /// Run the SD card latency benchmark, one sample (in microseconds) per
    /// slot of `samples`. Returns the number of read errors the device saw.
    pub fn sd_latency(&mut self, samples: &mut [u16]) -> Result<u16> {
        let bytes = samples.len().checked_mul(2).ok_or(Error::INVALID_PARAMETER)?;
        if bytes > MAX_TRANSFER {
            return Err(Error::INVALID_PARAMETER);
        }
        let count = u16::try_from(samples.len()).map_err(|_| Error::INVALID_PARAMETER)?;

        self.info_call(INFO_SD_LATENCY, count)?;
        let errors = self.status.aux();

        // Two samples per data word; unpack in place instead of staging
        // the bytes.
        self.open_channel(OP_READ_BUFFER, bytes)?;
        for pair in samples.chunks_mut(2) {
            let [a, b, c, d] = self.bus.read_data().to_be_bytes();
            let words = [u16::from_be_bytes([a, b]), u16::from_be_bytes([c, d])];
            for (sample, word) in pair.iter_mut().zip(words) {
                *sample = word;
            }
        }
        Ok(errors)
    }

    /// Format the SD card. `flags` are FatFs `FM_*` format options.
    ///
    /// The command carries two magic words the firmware checks before
    /// erasing anything.
    pub fn format(&mut self, flags: u8) -> Result<()> {
        info!("formatting SD card (flags {:#x})", flags);
        self.simple_call(OP_MKFS, flags, MKFS_MAGIC_FLAGS, MKFS_MAGIC_LENGTH)
    }

    /// Load the disc descriptor at `path` into the emulated drive.
    pub fn emulate(&mut self, path: &str) -> Result<()> {
        self.path_call(OP_EMULATE, path)
    }

    /// Reboot into the Satiator menu firmware.
    ///
    /// Switches to [`Mode::StorageApi`], has the BIOS stage the menu image
    /// and jumps to it with interrupts masked. On hardware this does not
    /// return; if the jump comes back the interrupt state is restored and
    /// [`Error::HandoffReturned`] is reported.
    pub fn handoff(&mut self) -> Result<Infallible> {
        self.set_mode(Mode::StorageApi)?;

        let ret = self
            .host
            .load_mpeg_rom(MPEG_ROM_MENU_INDEX, MPEG_ROM_MENU_SIZE, MENU_LOAD_ADDRESS);
        if ret < 0 {
            warn!("BIOS refused to stage menu image ({})", ret);
            return Err(Error::Bios(ret));
        }

        info!("jumping to menu at {:#x}", MENU_LOAD_ADDRESS);
        let saved = self.host.mask_interrupts();
        // SAFETY: the BIOS reported the menu image staged at the entry point.
        unsafe { self.host.jump(MENU_LOAD_ADDRESS, S_BOOT_NO_AUTOLOAD) };
        self.host.restore_interrupts(saved);

        warn!("menu firmware returned control");
        Err(Error::HandoffReturned)
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

    /// Responses for the mode bootstrap into storage API from `Unknown`.
    fn script_enter_api(bus: &mut FakeBus) {
        bus.respond([0; 4]).respond([0; 4]).respond([0, 0, 0x0002, 0]).respond([0; 4]);
    }

    #[test]
    fn info_selector_travels_in_target_byte() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0; 4]).respond([0; 4]);
        sat.bus.data_in.push_back(0x0102_0304);
        assert_eq!(sat.serial_number().unwrap(), 0x0102_0304);
        assert_eq!(sat.bus.issued[0], [0x9502, 0, 0, 0]);
        assert_eq!(sat.bus.issued[2], [0x9200, 0, 0, 4]);
    }

    #[test]
    fn bootloader_version_uses_selector_one() {
        let mut sat = driver();
        sat.bus.data_in.push_back(7);
        assert_eq!(sat.bootloader_version().unwrap(), 7);
        assert_eq!(sat.bus.issued[0], [0x9501, 0, 0, 0]);
    }

    #[test]
    fn firmware_version_is_clamped_and_terminated() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0, 0, 0, 10]);
        sat.bus.data_in.extend([0x7631_2E32, 0x3300_0000]);
        let mut buf = [0xFFu8; 6];
        assert_eq!(sat.firmware_version(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"v1.23\0");
    }

    #[test]
    fn firmware_version_string_stops_at_nul() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0, 0, 0, 8]);
        sat.bus.data_in.extend([0x7631_2E30, 0x0000_0000]);
        let version: heapless::String<16> = sat.firmware_version_string().unwrap();
        assert_eq!(version.as_str(), "v1.0");
    }

    #[test]
    fn sd_latency_reads_samples_and_error_count() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0, 2, 0, 0]);
        sat.bus.data_in.extend([0x0010_0020, 0x0030_0000]);
        let mut samples = [0u16; 3];
        assert_eq!(sat.sd_latency(&mut samples).unwrap(), 2);
        assert_eq!(samples, [0x10, 0x20, 0x30]);
        assert_eq!(sat.bus.issued[0], [0x9503, 3, 0, 0]);
        assert_eq!(sat.bus.issued[2], [0x9200, 0, 0, 6]);
    }

    #[test]
    fn sd_latency_rejects_oversized_request() {
        let mut sat = driver();
        let mut samples = vec![0u16; MAX_TRANSFER / 2 + 1];
        assert_eq!(sat.sd_latency(&mut samples), Err(Error::INVALID_PARAMETER));
        assert_eq!(sat.bus.accesses, 0);
    }

    #[test]
    fn format_carries_magic_words() {
        let mut sat = driver();
        sat.format(0x07).unwrap();
        assert_eq!(sat.bus.issued[0], [0x9407, 0xFEED, 0xDEAD, 0xBEEF]);
    }

    #[test]
    fn emulate_sends_descriptor_path() {
        let mut sat = driver();
        sat.emulate("GAME.CUE").unwrap();
        assert_eq!(sat.bus.issued[0], [0x9100, 0, 0, 8]);
        assert_eq!(sat.bus.issued[1], [0xAD00, 0, 0, 8]);
    }

    #[test]
    fn handoff_stages_masks_jumps_and_reports_return() {
        let mut sat = driver();
        script_enter_api(&mut sat.bus);
        assert_eq!(sat.handoff(), Err(Error::HandoffReturned));
        assert_eq!(sat.mode(), Mode::StorageApi);
        assert_eq!(sat.host.loads, [(2, 2, 0x0020_0000)]);
        assert_eq!(sat.host.jumps, [(0x0020_0000, 1)]);
        assert_eq!(sat.host.masked, 1);
        assert_eq!(sat.host.restored, [0x70]);
        assert_eq!(Error::HandoffReturned.code(), -0x1000);
    }

    #[test]
    fn handoff_surfaces_bios_failure_without_jumping() {
        let mut sat = driver();
        script_enter_api(&mut sat.bus);
        sat.host.load_result = -3;
        assert_eq!(sat.handoff(), Err(Error::Bios(-3)));
        assert!(sat.host.jumps.is_empty());
        assert_eq!(sat.host.masked, 0);
    }

    #[test]
    fn handoff_needs_a_satiator() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0; 4]).respond([0, 0, 0x0001, 0]);
        assert_eq!(sat.handoff(), Err(Error::NotPresent));
        assert!(sat.host.loads.is_empty());
    }
}
