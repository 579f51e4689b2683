//! CD block register map and Satiator command set.
//!
//! The Satiator sits on the Saturn's CD block bus and answers the same four
//! command registers (CR1–CR4) the stock CD block uses. Commands in the
//! `0x90`–`0xAD` range are Satiator extensions; the few stock CD block
//! commands used here (`0x01`, `0x04`, `0xE0`) drive the personality switch.
//!
//! # Key protocol constraints
//!
//! ## HIRQ is write-zero-to-clear
//! Writing a word to HIRQ clears every flag whose bit is 0 in the written
//! value and leaves the others untouched. The executor clears exactly
//! `CMOK | completion_mask` by writing the complement of that set.
//!
//! ## CR4 write issues the command
//! The CD block latches the command when CR4 is written, so the four
//! registers are always written in order CR1, CR2, CR3, CR4.
//!
//! ## Write-buffer trailer
//! After the payload words of a host → device buffer transfer, two extra
//! zero words must be written to the data register. Without them the
//! Satiator firmware does not complete the transfer.

// ---------------------------------------------------------------------------
// Register addresses (SH-2 A-bus, CS2 area)
// ---------------------------------------------------------------------------

/// HIRQ: interrupt-flag register (16-bit, write-zero-to-clear).
pub const CDB_REG_HIRQ: usize = 0x2589_0008;

/// HIRQ mask register (16-bit). Not touched by the driver.
pub const CDB_REG_HIRQMASK: usize = 0x2589_000C;

/// Command register 1 (16-bit).
pub const CDB_REG_CR1: usize = 0x2589_0018;

/// Command register 2 (16-bit).
pub const CDB_REG_CR2: usize = 0x2589_001C;

/// Command register 3 (16-bit).
pub const CDB_REG_CR3: usize = 0x2589_0020;

/// Command register 4 (16-bit). Writing it issues the command.
pub const CDB_REG_CR4: usize = 0x2589_0024;

/// Data transfer register (32-bit). The single bulk-payload channel.
pub const CDB_REG_DATATRNS: usize = 0x2581_8000;

// ---------------------------------------------------------------------------
// HIRQ flags
// ---------------------------------------------------------------------------

/// Command accepted.
pub const HIRQ_CMOK: u16 = 0x0001;
/// Data transfer ready.
pub const HIRQ_DRDY: u16 = 0x0002;
/// Sector read complete.
pub const HIRQ_CSCT: u16 = 0x0004;
/// Buffer full.
pub const HIRQ_BFUL: u16 = 0x0008;
/// CD play pending ended.
pub const HIRQ_PEND: u16 = 0x0010;
/// Disc changed.
pub const HIRQ_DCHG: u16 = 0x0020;
/// Selector settings processed (eject).
pub const HIRQ_ESEL: u16 = 0x0040;
/// Host transfer ready (buffer transfer may start).
pub const HIRQ_EHST: u16 = 0x0080;
/// Duplicate / move complete (erase done).
pub const HIRQ_ECPY: u16 = 0x0100;
/// File system / flash operation finished.
pub const HIRQ_EFLS: u16 = 0x0200;
/// Subcode Q decoded (disc queue).
pub const HIRQ_SCDQ: u16 = 0x0400;
/// MPEG operation ended. The Satiator raises it when an API command completes.
pub const HIRQ_MPED: u16 = 0x0800;
/// MPEG media inserted.
pub const HIRQ_MPCM: u16 = 0x1000;
/// MPEG media standby.
pub const HIRQ_MPST: u16 = 0x2000;

// ---------------------------------------------------------------------------
// Satiator API opcodes (word0 high byte)
// ---------------------------------------------------------------------------

/// Snapshot the response of the previous command into CR1–CR4.
pub const OP_GET_STATUS: u8 = 0x90;
/// Host → device buffer transfer.
pub const OP_WRITE_BUFFER: u8 = 0x91;
/// Device → host buffer transfer.
pub const OP_READ_BUFFER: u8 = 0x92;
/// Leave API mode and resume CD drive emulation.
pub const OP_LEAVE_API: u8 = 0x93;
/// Format the SD card.
pub const OP_MKFS: u8 = 0x94;
/// Device information query; sub-selector in the target byte.
pub const OP_INFO: u8 = 0x95;
/// Set the real-time clock from a FAT timestamp.
pub const OP_SETTIME: u8 = 0x96;
/// Open a file.
pub const OP_OPEN: u8 = 0xA0;
/// Close a file handle.
pub const OP_CLOSE: u8 = 0xA1;
/// Seek within a file.
pub const OP_SEEK: u8 = 0xA2;
/// Read from a file into the device buffer.
pub const OP_READ: u8 = 0xA3;
/// Write the device buffer into a file.
pub const OP_WRITE: u8 = 0xA4;
/// Truncate a file at its current position.
pub const OP_TRUNCATE: u8 = 0xA5;
/// Stat a named file.
pub const OP_STAT: u8 = 0xA6;
/// Rename a file.
pub const OP_RENAME: u8 = 0xA7;
/// Delete a file.
pub const OP_UNLINK: u8 = 0xA8;
/// Create a directory.
pub const OP_MKDIR: u8 = 0xA9;
/// Open a directory for iteration.
pub const OP_OPENDIR: u8 = 0xAA;
/// Return the next entry of the open directory.
pub const OP_READDIR: u8 = 0xAB;
/// Change the working directory.
pub const OP_CHDIR: u8 = 0xAC;
/// Load a disc descriptor into the emulated drive.
pub const OP_EMULATE: u8 = 0xAD;

// ---------------------------------------------------------------------------
// INFO sub-selectors (word0 low byte)
// ---------------------------------------------------------------------------

/// Firmware version string.
pub const INFO_FW_VERSION: u8 = 0;
/// Bootloader version word.
pub const INFO_BOOTLOADER_VERSION: u8 = 1;
/// Serial number word.
pub const INFO_SERIAL_NUMBER: u8 = 2;
/// SD card latency benchmark.
pub const INFO_SD_LATENCY: u8 = 3;

// ---------------------------------------------------------------------------
// Raw frames used by the personality switch
// ---------------------------------------------------------------------------

/// Leave API mode; the drive goes back to serving the emulated disc.
pub const FRAME_ENTER_DISC_EMULATION: [u16; 4] = [0x9300, 0x0001, 0x0000, 0x0000];

/// CD block "authenticate MPEG card" command. The Satiator treats this
/// exact parameter set as the API unlock sequence.
pub const FRAME_UNLOCK_API: [u16; 4] = [0xE000, 0x0000, 0x00C1, 0x05E7];

/// CD block "get hardware info". CR3 low byte reports the MPEG version.
pub const FRAME_HARDWARE_INFO: [u16; 4] = [0x0100, 0x0000, 0x0000, 0x0000];

/// CD block "initialise CD system" with standby; halts the emulated drive.
pub const FRAME_STOP_DRIVE: [u16; 4] = [0x0400, 0x0001, 0x0000, 0x040F];

/// MPEG version reported by a Satiator. Genuine MPEG cards report 1.
pub const SATIATOR_MPEG_VERSION: u8 = 2;

// ---------------------------------------------------------------------------
// Format safeguard
// ---------------------------------------------------------------------------

/// First format confirmation constant, carried in word1.
pub const MKFS_MAGIC_FLAGS: u16 = 0xFEED;

/// Second format confirmation constant, carried in the length field.
pub const MKFS_MAGIC_LENGTH: u32 = 0xDEAD_BEEF;

// ---------------------------------------------------------------------------
// Host firmware handoff
// ---------------------------------------------------------------------------

/// BIOS vector holding the "load MPEG ROM" routine.
pub const BIOS_GET_MPEG_ROM_VECTOR: usize = 0x0600_0298;

/// Index of the Satiator menu image in the MPEG ROM area.
pub const MPEG_ROM_MENU_INDEX: u32 = 2;

/// Size argument passed to the "load MPEG ROM" routine.
pub const MPEG_ROM_MENU_SIZE: u32 = 2;

/// Load address and entry point of the staged menu image.
pub const MENU_LOAD_ADDRESS: u32 = 0x0020_0000;

/// Parameter passed to the menu entry point: do not auto-boot a disc image.
pub const S_BOOT_NO_AUTOLOAD: u32 = 1;
