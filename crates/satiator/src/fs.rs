//! SD card file API.
//!
//! Thin wrappers over the device's FatFs: each call optionally pushes a
//! payload (path or data) into the device buffer, issues one API command,
//! checks its status, and optionally pulls a payload back. The device keeps
//! all file state; a [`Handle`] is just the number it handed out.

use core::ops::BitOr;

use crate::bus::CdBlock;
use crate::config::{MAX_TRANSFER, RENAME_BOUND, STAT_HEADER_LEN};
use crate::driver::Satiator;
use crate::error::{Error, Result};
use crate::host::HostServices;
use crate::regs::{
    OP_CHDIR, OP_CLOSE, OP_MKDIR, OP_OPEN, OP_OPENDIR, OP_READ, OP_READDIR, OP_RENAME, OP_SEEK,
    OP_SETTIME, OP_STAT, OP_TRUNCATE, OP_UNLINK, OP_WRITE,
};

/// An open file on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle(pub u8);

/// FatFs `FA_*` open mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenFlags(pub u16);

impl OpenFlags {
    /// Open for reading.
    pub const READ: Self = Self(0x01);
    /// Open for writing.
    pub const WRITE: Self = Self(0x02);
    /// Fail if the file does not exist (the default).
    pub const OPEN_EXISTING: Self = Self(0x00);
    /// Create; fail if the file exists.
    pub const CREATE_NEW: Self = Self(0x04);
    /// Create, truncating an existing file.
    pub const CREATE_ALWAYS: Self = Self(0x08);
    /// Open, creating the file if needed.
    pub const OPEN_ALWAYS: Self = Self(0x10);
    /// As `OPEN_ALWAYS`, positioned at end of file.
    pub const OPEN_APPEND: Self = Self(0x30);

    /// Whether all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Seek origin, carried in the flags word of the SEEK command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Whence {
    /// From the start of the file.
    Start = 0,
    /// From the current position.
    Current = 1,
    /// From the end of the file.
    End = 2,
}

/// FAT attribute bits of a stat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attributes(pub u8);

impl Attributes {
    /// Read only.
    pub const READ_ONLY: u8 = 0x01;
    /// Hidden.
    pub const HIDDEN: u8 = 0x02;
    /// System.
    pub const SYSTEM: u8 = 0x04;
    /// Directory.
    pub const DIRECTORY: u8 = 0x10;
    /// Archive.
    pub const ARCHIVE: u8 = 0x20;

    /// Whether the entry is a directory.
    #[must_use]
    pub const fn is_dir(self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }
}

/// A decoded stat record: 9-byte big-endian header followed by the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatInfo<'a> {
    /// File size in bytes.
    pub size: u32,
    /// FAT date word.
    pub date: u16,
    /// FAT time word.
    pub time: u16,
    /// Attribute bits.
    pub attrib: Attributes,
    /// Entry name, possibly truncated by the caller's buffer.
    pub name: &'a [u8],
}

impl<'a> StatInfo<'a> {
    /// Decode `record`, the first `STAT_HEADER_LEN + name_len` bytes of the
    /// buffer passed to [`Satiator::stat`].
    #[must_use]
    pub fn parse(record: &'a [u8]) -> Option<Self> {
        let header = record.get(..STAT_HEADER_LEN)?;
        let name = record.get(STAT_HEADER_LEN..)?;
        let &[s0, s1, s2, s3, d0, d1, t0, t1, attrib] = header else {
            return None;
        };
        Some(Self {
            size: u32::from_be_bytes([s0, s1, s2, s3]),
            date: u16::from_be_bytes([d0, d1]),
            time: u16::from_be_bytes([t0, t1]),
            attrib: Attributes(attrib),
            name,
        })
    }

    /// The name as UTF-8, if it is.
    #[must_use]
    pub fn name_str(&self) -> Option<&'a str> {
        core::str::from_utf8(self.name).ok()
    }
}

/// A FAT timestamp (date in the high half, time in the low half).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FatTimestamp(pub u32);

impl FatTimestamp {
    /// Encode a calendar time. Returns `None` outside the FAT range
    /// (years 1980 to 2107) or for out-of-range fields.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)]
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        let years = year.checked_sub(1980).filter(|y| *y < 128)?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        let date = (u32::from(years) << 9) | (u32::from(month) << 5) | u32::from(day);
        let time = (u32::from(hour) << 11) | (u32::from(minute) << 5) | u32::from(second / 2);
        Some(Self((date << 16) | time))
    }
}

fn checked_len(len: usize) -> Result<u32> {
    if len > MAX_TRANSFER {
        return Err(Error::INVALID_PARAMETER);
    }
    u32::try_from(len).map_err(|_| Error::INVALID_PARAMETER)
}

fn to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

impl<B: CdBlock, H: HostServices> Satiator<B, H> {
    /// Send `path` and issue `opcode` with its length.
    pub(crate) fn path_call(&mut self, opcode: u8, path: &str) -> Result<()> {
        let len = checked_len(path.len())?;
        self.write_buffer(path.as_bytes())?;
        self.simple_call(opcode, 0, 0, len)
    }

    /// Open `path` and return its handle.
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Handle> {
        let len = checked_len(path.len())?;
        self.write_buffer(path.as_bytes())?;
        self.simple_call(OP_OPEN, 0, flags.0, len)?;
        let handle = self.status.low_word().to_be_bytes()[1];
        debug!("open {} -> handle {}", path, handle);
        Ok(Handle(handle))
    }

    /// Close a handle.
    pub fn close(&mut self, fd: Handle) -> Result<()> {
        self.simple_call(OP_CLOSE, fd.0, 0, 0)
    }

    /// Move the file position; returns the resulting offset.
    ///
    /// `offset` travels as a 32-bit two's-complement value, so negative
    /// offsets are meaningful relative to [`Whence::Current`] and
    /// [`Whence::End`].
    #[allow(clippy::cast_sign_loss)]
    pub fn seek(&mut self, fd: Handle, offset: i32, whence: Whence) -> Result<u32> {
        self.simple_call(OP_SEEK, fd.0, whence as u16, offset as u32)?;
        Ok(self.extract_length())
    }

    /// Read up to `buf.len()` bytes; returns the number read, which is short
    /// at end of file.
    pub fn read(&mut self, fd: Handle, buf: &mut [u8]) -> Result<usize> {
        let len = checked_len(buf.len())?;
        self.simple_call(OP_READ, fd.0, 0, len)?;
        let got = to_usize(self.extract_length()).min(buf.len());
        let dst = buf.get_mut(..got).ok_or(Error::INVALID_PARAMETER)?;
        self.read_buffer(dst)?;
        Ok(got)
    }

    /// Write `data`; returns the number of bytes the device accepted.
    pub fn write(&mut self, fd: Handle, data: &[u8]) -> Result<usize> {
        let len = checked_len(data.len())?;
        self.write_buffer(data)?;
        self.simple_call(OP_WRITE, fd.0, 0, len)?;
        Ok(to_usize(self.extract_length()))
    }

    /// Flush buffered data. The device flushes as a side effect of a
    /// zero-length relative seek; returns the current offset.
    pub fn sync(&mut self, fd: Handle) -> Result<u32> {
        self.seek(fd, 0, Whence::Current)
    }

    /// Truncate the file at its current position; returns the new length.
    pub fn truncate(&mut self, fd: Handle) -> Result<u32> {
        self.simple_call(OP_TRUNCATE, fd.0, 0, 0)?;
        Ok(self.extract_length())
    }

    /// Stat `path`, or with `None` fetch the next entry of the directory
    /// opened by [`Satiator::opendir`].
    ///
    /// The record is copied into `buf` (truncating the name if `buf` is
    /// short); returns the length of the name that was kept. Decode the
    /// record with [`StatInfo::parse`].
    pub fn stat(&mut self, path: Option<&str>, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < STAT_HEADER_LEN {
            return Err(Error::INVALID_PARAMETER);
        }
        match path {
            Some(path) => self.path_call(OP_STAT, path)?,
            None => self.simple_call(OP_READDIR, 0, 0, 0)?,
        }
        let len = to_usize(self.extract_length()).min(buf.len());
        let dst = buf.get_mut(..len).ok_or(Error::INVALID_PARAMETER)?;
        self.read_buffer(dst)?;
        len.checked_sub(STAT_HEADER_LEN).ok_or(Error::ShortRecord(len))
    }

    /// Fetch the next directory entry; see [`Satiator::stat`].
    pub fn readdir(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stat(None, buf)
    }

    /// Rename `old` to `new`.
    ///
    /// Both names travel in one payload, `old` NUL `new`, which must fit
    /// the device's [`RENAME_BOUND`]-byte buffer.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let mut packed: heapless::Vec<u8, RENAME_BOUND> = heapless::Vec::new();
        let too_long = Error::NameTooLong { bound: RENAME_BOUND };
        packed.extend_from_slice(old.as_bytes()).map_err(|_| too_long)?;
        packed.push(0).map_err(|_| too_long)?;
        packed.extend_from_slice(new.as_bytes()).map_err(|_| too_long)?;

        let len = checked_len(packed.len())?;
        self.write_buffer(&packed)?;
        self.simple_call(OP_RENAME, 0, 0, len)
    }

    /// Delete a file.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        self.path_call(OP_UNLINK, path)
    }

    /// Create a directory.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        self.path_call(OP_MKDIR, path)
    }

    /// Open a directory for iteration with [`Satiator::readdir`].
    pub fn opendir(&mut self, path: &str) -> Result<()> {
        self.path_call(OP_OPENDIR, path)
    }

    /// Change the working directory.
    pub fn chdir(&mut self, path: &str) -> Result<()> {
        self.path_call(OP_CHDIR, path)
    }

    /// Copy the working directory into `buf` with a NUL terminator;
    /// returns the number of path bytes written (at most `buf.len() - 1`).
    ///
    /// The device has no dedicated query: changing to `"."` reports the
    /// resulting directory.
    pub fn getcwd(&mut self, buf: &mut [u8]) -> Result<usize> {
        let room = buf.len().checked_sub(1).ok_or(Error::INVALID_PARAMETER)?;
        self.path_call(OP_CHDIR, ".")?;
        self.read_terminated(buf, room)
    }

    /// Set the device clock.
    pub fn settime(&mut self, timestamp: FatTimestamp) -> Result<()> {
        self.simple_call(OP_SETTIME, 0, 0, timestamp.0)
    }

    /// Read `min(room, reported length)` bytes into `buf` and NUL-terminate.
    pub(crate) fn read_terminated(&mut self, buf: &mut [u8], room: usize) -> Result<usize> {
        let len = to_usize(self.extract_length()).min(room).min(MAX_TRANSFER);
        let dst = buf.get_mut(..len).ok_or(Error::INVALID_PARAMETER)?;
        self.read_buffer(dst)?;
        if let Some(nul) = buf.get_mut(len) {
            *nul = 0;
        }
        Ok(len)
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
    use crate::error::FsError;
    use crate::testing::{FakeBus, FakeHost};

    fn driver() -> Satiator<FakeBus, FakeHost> {
        Satiator::new(FakeBus::new(), FakeHost::default())
    }

    #[test]
    fn open_sends_name_then_open_with_flags() {
        let mut sat = driver();
        // write-buffer, open, status (handle 3)
        sat.bus.respond([0; 4]).respond([0; 4]).respond([0, 0, 0, 3]);
        let fd = sat.open("A.BIN", OpenFlags::READ | OpenFlags::OPEN_EXISTING).unwrap();
        assert_eq!(fd, Handle(3));
        assert_eq!(sat.bus.issued[0], [0x9100, 0, 0, 5]);
        assert_eq!(sat.bus.issued[1], [0xA000, 0x0001, 0, 5]);
    }

    #[test]
    fn seek_carries_whence_in_flags_and_returns_offset() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0, 0, 0x0001, 0x0000]);
        assert_eq!(sat.seek(Handle(2), -4, Whence::End).unwrap(), 0x1_0000);
        assert_eq!(sat.bus.issued[0], [0xA202, 2, 0xFFFF, 0xFFFC]);
    }

    #[test]
    fn sync_is_a_zero_relative_seek() {
        let mut sat = driver();
        sat.sync(Handle(1)).unwrap();
        assert_eq!(sat.bus.issued[0], [0xA201, 1, 0, 0]);
    }

    #[test]
    fn read_clamps_to_reported_length() {
        let mut sat = driver();
        // read, status (3 bytes available), read-buffer
        sat.bus.respond([0; 4]).respond([0, 0, 0, 3]).respond([0; 4]);
        sat.bus.data_in.push_back(0x7879_7A00);
        let mut buf = [0xEEu8; 8];
        assert_eq!(sat.read(Handle(1), &mut buf).unwrap(), 3);
        assert_eq!(&buf[..4], b"xyz\xEE");
        assert_eq!(sat.bus.issued[2], [0x9200, 0, 0, 3]);
    }

    #[test]
    fn oversized_read_and_write_never_touch_hardware() {
        let mut sat = driver();
        let mut big = vec![0u8; MAX_TRANSFER + 1];
        assert_eq!(sat.read(Handle(0), &mut big), Err(Error::INVALID_PARAMETER));
        assert_eq!(sat.write(Handle(0), &big), Err(Error::INVALID_PARAMETER));
        assert_eq!(sat.bus.accesses, 0);
    }

    #[test]
    fn stat_rejects_buffer_shorter_than_header() {
        let mut sat = driver();
        assert_eq!(sat.stat(Some("X"), &mut [0u8; 8]), Err(Error::INVALID_PARAMETER));
        assert_eq!(sat.bus.accesses, 0);
    }

    #[test]
    fn readdir_issues_readdir_with_no_payload() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0, 0, 0, 11]).respond([0; 4]);
        sat.bus.data_in.extend([0x0000_0010, 0x0000_0000, 0x1041_4200]);
        let mut buf = [0u8; 32];
        assert_eq!(sat.stat(None, &mut buf).unwrap(), 2);
        assert_eq!(sat.bus.issued[0], [0xAB00, 0, 0, 0]);
        let info = StatInfo::parse(&buf[..11]).unwrap();
        assert_eq!(info.size, 16);
        assert!(info.attrib.is_dir());
        assert_eq!(info.name, b"AB");
    }

    #[test]
    fn stat_record_shorter_than_header_is_reported() {
        let mut sat = driver();
        // write-buffer, stat, status (5 bytes reported), read-buffer
        sat.bus.respond([0; 4]).respond([0; 4]).respond([0, 0, 0, 5]);
        sat.bus.data_in.extend([0x0000_0001, 0x0200_0000]);
        let mut buf = [0u8; 32];
        assert_eq!(sat.stat(Some("X"), &mut buf), Err(Error::ShortRecord(5)));
        assert_eq!(Error::ShortRecord(5).code(), -2);
        assert_eq!(sat.bus.issued[3], [0x9200, 0, 0, 5]);
    }

    #[test]
    fn stat_truncates_to_buffer() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0; 4]).respond([0, 0, 0, 40]);
        let mut buf = [0u8; 12];
        assert_eq!(sat.stat(Some("LONGNAME"), &mut buf).unwrap(), 3);
    }

    #[test]
    fn rename_packs_names_with_separator() {
        let mut sat = driver();
        sat.rename("AB", "C").unwrap();
        assert_eq!(sat.bus.issued[0], [0x9100, 0, 0, 4]);
        assert_eq!(sat.bus.data_out[0], 0x4142_0043);
        assert_eq!(sat.bus.issued[1], [0xA700, 0, 0, 4]);
    }

    #[test]
    fn rename_rejects_oversized_operands_before_hardware() {
        let mut sat = driver();
        let old = "a".repeat(300);
        let new = "b".repeat(212);
        assert_eq!(
            sat.rename(&old, &new),
            Err(Error::NameTooLong { bound: RENAME_BOUND })
        );
        assert_eq!(sat.bus.accesses, 0);
    }

    #[test]
    fn getcwd_clamps_and_terminates() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0; 4]).respond([0, 0, 0, 6]);
        sat.bus.data_in.extend([0x2F47_414D, 0x4553_0000]);
        let mut buf = [0xFFu8; 4];
        assert_eq!(sat.getcwd(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"/GA\0");
        // The query is a chdir to ".".
        assert_eq!(sat.bus.issued[1], [0xAC00, 0, 0, 1]);
    }

    #[test]
    fn getcwd_rejects_empty_buffer() {
        let mut sat = driver();
        assert_eq!(sat.getcwd(&mut []), Err(Error::INVALID_PARAMETER));
    }

    #[test]
    fn close_propagates_device_error() {
        let mut sat = driver();
        sat.bus.respond([0; 4]).respond([0x0900, 0, 0, 0]);
        assert_eq!(sat.close(Handle(9)), Err(Error::Fs(FsError::InvalidObject)));
    }

    #[test]
    fn fat_timestamp_encoding() {
        // 2020-06-15 12:34:56
        let ts = FatTimestamp::new(2020, 6, 15, 12, 34, 56).unwrap();
        assert_eq!(ts.0 >> 16, (40 << 9) | (6 << 5) | 15);
        assert_eq!(ts.0 & 0xFFFF, (12 << 11) | (34 << 5) | 28);
        assert!(FatTimestamp::new(1979, 1, 1, 0, 0, 0).is_none());
        assert!(FatTimestamp::new(2020, 13, 1, 0, 0, 0).is_none());
    }

    #[test]
    fn stat_info_rejects_short_record() {
        assert!(StatInfo::parse(&[0u8; 8]).is_none());
    }
}
