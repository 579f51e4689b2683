//! Satiator API command handlers.
//!
//! Each handler consumes the device buffer (path, rename pair or write
//! data) and may leave a reply in it (read data, stat record, info blob),
//! mirroring how the real firmware shares one buffer between the two
//! transfer directions.

use satiator::fs::OpenFlags;
use satiator::regs::{
    INFO_BOOTLOADER_VERSION, INFO_FW_VERSION, INFO_SD_LATENCY, INFO_SERIAL_NUMBER,
    MKFS_MAGIC_FLAGS, MKFS_MAGIC_LENGTH, OP_CHDIR, OP_CLOSE, OP_EMULATE, OP_INFO, OP_MKDIR,
    OP_MKFS, OP_OPEN, OP_OPENDIR, OP_READ, OP_READDIR, OP_RENAME, OP_SEEK, OP_SETTIME, OP_STAT,
    OP_TRUNCATE, OP_UNLINK, OP_WRITE,
};
use satiator::{CommandFrame, FsError, MAX_TRANSFER};

use crate::fs::SimFs;

/// Result of one API command, as it will appear in the status response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reply {
    /// FatFs result code; 0 on success.
    pub code: u8,
    /// Response word1.
    pub aux: u16,
    /// Response length field.
    pub length: u32,
}

impl Reply {
    fn ok(length: u32) -> Self {
        Self { code: 0, aux: 0, length }
    }

    fn err(err: FsError) -> Self {
        Self { code: err.code(), ..Self::default() }
    }

    /// The four status words.
    pub fn words(&self) -> [u16; 4] {
        [
            u16::from(self.code) << 8,
            self.aux,
            (self.length >> 16) as u16,
            (self.length & 0xFFFF) as u16,
        ]
    }
}

fn len32(len: usize) -> Result<u32, FsError> {
    u32::try_from(len).map_err(|_| FsError::IntErr)
}

/// Device identity and maintenance state.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Firmware version string.
    pub firmware: String,
    /// Bootloader version word.
    pub bootloader: u32,
    /// Serial number.
    pub serial: u32,
    /// Latency samples handed out by the benchmark, cycled.
    pub latency_us: Vec<u16>,
    /// Read errors the benchmark reports.
    pub latency_errors: u16,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            firmware: "sim-r1".to_owned(),
            bootloader: 0x0001_0002,
            serial: 0x05A7_1A70,
            latency_us: vec![120, 95, 310],
            latency_errors: 0,
        }
    }
}

/// Simulated Satiator firmware.
#[derive(Debug, Default)]
pub struct SimFirmware {
    /// The SD card volume.
    pub fs: SimFs,
    /// Identity reported through the info command.
    pub identity: Identity,
    /// Disc descriptor handed to the emulate command.
    pub emulating: Option<String>,
    /// Number of completed format commands.
    pub formats: usize,
}

impl SimFirmware {
    /// Firmware over an empty volume.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one API command against `buffer`.
    pub fn handle(&mut self, frame: CommandFrame, buffer: &mut Vec<u8>) -> Reply {
        match self.dispatch(frame, buffer) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::debug!(opcode = frame.opcode(), ?err, "api command failed");
                Reply::err(err)
            }
        }
    }

    fn payload(buffer: &[u8], length: u32) -> Result<&str, FsError> {
        let len = usize::try_from(length).map_err(|_| FsError::InvalidParameter)?;
        let bytes = buffer.get(..len).ok_or(FsError::InvalidParameter)?;
        std::str::from_utf8(bytes).map_err(|_| FsError::InvalidName)
    }

    fn dispatch(&mut self, frame: CommandFrame, buffer: &mut Vec<u8>) -> Result<Reply, FsError> {
        let fd = frame.target();
        let length = frame.length();
        match frame.opcode() {
            OP_OPEN => {
                let path = Self::payload(buffer, length)?.to_owned();
                let fd = self.fs.open(&path, OpenFlags(frame.flags()))?;
                Ok(Reply::ok(u32::from(fd)))
            }
            OP_CLOSE => self.fs.close(fd).map(|()| Reply::ok(0)),
            OP_SEEK => {
                #[allow(clippy::cast_possible_wrap)]
                let offset = length as i32;
                self.fs.seek(fd, offset, frame.flags()).map(Reply::ok)
            }
            OP_READ => {
                let want = usize::try_from(length).map_err(|_| FsError::InvalidParameter)?;
                if want > MAX_TRANSFER {
                    return Err(FsError::InvalidParameter);
                }
                *buffer = self.fs.read(fd, want)?;
                Ok(Reply::ok(len32(buffer.len())?))
            }
            OP_WRITE => {
                let len = usize::try_from(length).map_err(|_| FsError::InvalidParameter)?;
                let data = buffer.get(..len).ok_or(FsError::InvalidParameter)?;
                self.fs.write(fd, data).map(Reply::ok)
            }
            OP_TRUNCATE => self.fs.truncate(fd).map(Reply::ok),
            OP_STAT => {
                let path = Self::payload(buffer, length)?.to_owned();
                *buffer = self.fs.stat(&path)?.record();
                Ok(Reply::ok(len32(buffer.len())?))
            }
            OP_READDIR => {
                *buffer = self.fs.readdir()?.record();
                Ok(Reply::ok(len32(buffer.len())?))
            }
            OP_RENAME => {
                let packed = Self::payload(buffer, length)?;
                let (old, new) = packed.split_once('\0').ok_or(FsError::InvalidName)?;
                let (old, new) = (old.to_owned(), new.to_owned());
                self.fs.rename(&old, &new).map(|()| Reply::ok(0))
            }
            OP_UNLINK => {
                let path = Self::payload(buffer, length)?.to_owned();
                self.fs.unlink(&path).map(|()| Reply::ok(0))
            }
            OP_MKDIR => {
                let path = Self::payload(buffer, length)?.to_owned();
                self.fs.mkdir(&path).map(|()| Reply::ok(0))
            }
            OP_OPENDIR => {
                let path = Self::payload(buffer, length)?.to_owned();
                self.fs.opendir(&path).map(|()| Reply::ok(0))
            }
            OP_CHDIR => {
                let path = Self::payload(buffer, length)?.to_owned();
                let cwd = self.fs.chdir(&path)?;
                *buffer = cwd.as_bytes().to_vec();
                Ok(Reply::ok(len32(buffer.len())?))
            }
            OP_EMULATE => {
                let path = Self::payload(buffer, length)?.to_owned();
                self.fs.stat(&path)?;
                self.emulating = Some(self.fs.resolve(&path)?);
                Ok(Reply::ok(0))
            }
            OP_SETTIME => {
                self.fs.set_time(length);
                Ok(Reply::ok(0))
            }
            OP_MKFS => {
                if frame.flags() != MKFS_MAGIC_FLAGS || length != MKFS_MAGIC_LENGTH {
                    return Err(FsError::InvalidParameter);
                }
                self.fs.format();
                self.formats += 1;
                Ok(Reply::ok(0))
            }
            OP_INFO => self.info(fd, frame.flags(), buffer),
            _ => Err(FsError::InvalidParameter),
        }
    }

    fn info(&self, selector: u8, flags: u16, buffer: &mut Vec<u8>) -> Result<Reply, FsError> {
        let identity = &self.identity;
        match selector {
            INFO_FW_VERSION => *buffer = identity.firmware.as_bytes().to_vec(),
            INFO_BOOTLOADER_VERSION => *buffer = identity.bootloader.to_be_bytes().to_vec(),
            INFO_SERIAL_NUMBER => *buffer = identity.serial.to_be_bytes().to_vec(),
            INFO_SD_LATENCY => {
                *buffer = identity
                    .latency_us
                    .iter()
                    .cycle()
                    .take(usize::from(flags))
                    .flat_map(|sample| sample.to_be_bytes())
                    .collect();
                let reply = Reply { aux: identity.latency_errors, ..Reply::ok(len32(buffer.len())?) };
                return Ok(reply);
            }
            _ => return Err(FsError::InvalidParameter),
        }
        Ok(Reply::ok(len32(buffer.len())?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn call(fw: &mut SimFirmware, op: u8, target: u8, flags: u16, buf: &mut Vec<u8>) -> Reply {
        let len = u32::try_from(buf.len()).unwrap();
        fw.handle(CommandFrame::new(op, target, flags, len), buf)
    }

    #[test]
    fn reply_words_carry_code_and_length() {
        let reply = Reply { code: 4, aux: 7, length: 0x0001_0002 };
        assert_eq!(reply.words(), [0x0400, 7, 1, 2]);
    }

    #[test]
    fn open_reports_handle_in_length() {
        let mut fw = SimFirmware::new();
        fw.fs.insert_file("/A", b"x");
        let reply = call(&mut fw, OP_OPEN, 0, 0x01, &mut b"A".to_vec());
        assert_eq!(reply, Reply::ok(0));
        let reply = call(&mut fw, OP_OPEN, 0, 0x01, &mut b"A".to_vec());
        assert_eq!(reply.length, 1);
    }

    #[test]
    fn missing_file_reports_fatfs_code() {
        let mut fw = SimFirmware::new();
        let reply = call(&mut fw, OP_STAT, 0, 0, &mut b"NOPE".to_vec());
        assert_eq!(reply.code, FsError::NoFile.code());
    }

    #[test]
    fn mkfs_requires_magic() {
        let mut fw = SimFirmware::new();
        fw.fs.insert_file("/A", b"x");
        let mut buf = Vec::new();
        let reply = fw.handle(CommandFrame::new(OP_MKFS, 0, 0, 0), &mut buf);
        assert_eq!(reply.code, FsError::InvalidParameter.code());
        let reply = fw.handle(
            CommandFrame::new(OP_MKFS, 0, MKFS_MAGIC_FLAGS, MKFS_MAGIC_LENGTH),
            &mut buf,
        );
        assert_eq!(reply.code, 0);
        assert!(fw.fs.file("/A").is_none());
    }

    #[test]
    fn latency_cycles_samples() {
        let mut fw = SimFirmware::new();
        fw.identity.latency_errors = 3;
        let mut buf = Vec::new();
        let reply = fw.handle(CommandFrame::new(OP_INFO, INFO_SD_LATENCY, 4, 0), &mut buf);
        assert_eq!(reply.aux, 3);
        assert_eq!(buf, [0, 120, 0, 95, 1, 54, 0, 120]);
    }
}
