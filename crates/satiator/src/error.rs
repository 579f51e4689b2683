//! Driver error type.
//!
//! The Satiator firmware runs FatFs and reports its `FRESULT` codes in the
//! high byte of the first status word. Every failure the driver returns maps
//! into that single signed domain through [`Error::code`]: FatFs codes come
//! back negated, transfer failures share one code, and the firmware handoff
//! owns a reserved sentinel.

use thiserror_no_std::Error;

/// FatFs result codes as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FsError {
    /// `FR_DISK_ERR`: low-level disk I/O error.
    DiskErr = 1,
    /// `FR_INT_ERR`: assertion failure inside FatFs.
    IntErr = 2,
    /// `FR_NOT_READY`: the SD card is not ready.
    NotReady = 3,
    /// `FR_NO_FILE`: file not found (also: directory iteration exhausted).
    NoFile = 4,
    /// `FR_NO_PATH`: path not found.
    NoPath = 5,
    /// `FR_INVALID_NAME`: malformed path name.
    InvalidName = 6,
    /// `FR_DENIED`: access denied or directory full.
    Denied = 7,
    /// `FR_EXIST`: object already exists.
    Exist = 8,
    /// `FR_INVALID_OBJECT`: stale or invalid handle.
    InvalidObject = 9,
    /// `FR_WRITE_PROTECTED`: medium is write protected.
    WriteProtected = 10,
    /// `FR_INVALID_DRIVE`: invalid logical drive.
    InvalidDrive = 11,
    /// `FR_NOT_ENABLED`: volume has no work area.
    NotEnabled = 12,
    /// `FR_NO_FILESYSTEM`: no valid FAT volume.
    NoFilesystem = 13,
    /// `FR_MKFS_ABORTED`: format aborted.
    MkfsAborted = 14,
    /// `FR_TIMEOUT`: could not get a grant to access the volume.
    Timeout = 15,
    /// `FR_LOCKED`: operation rejected by file sharing policy.
    Locked = 16,
    /// `FR_NOT_ENOUGH_CORE`: working buffer could not be allocated.
    NotEnoughCore = 17,
    /// `FR_TOO_MANY_OPEN_FILES`: handle table full.
    TooManyOpenFiles = 18,
    /// `FR_INVALID_PARAMETER`: parameter rejected.
    InvalidParameter = 19,
}

impl FsError {
    /// Decode a non-zero status byte. Codes outside the FatFs table are
    /// returned unchanged as `Err`.
    pub const fn from_code(code: u8) -> core::result::Result<Self, u8> {
        Ok(match code {
            1 => Self::DiskErr,
            2 => Self::IntErr,
            3 => Self::NotReady,
            4 => Self::NoFile,
            5 => Self::NoPath,
            6 => Self::InvalidName,
            7 => Self::Denied,
            8 => Self::Exist,
            9 => Self::InvalidObject,
            10 => Self::WriteProtected,
            11 => Self::InvalidDrive,
            12 => Self::NotEnabled,
            13 => Self::NoFilesystem,
            14 => Self::MkfsAborted,
            15 => Self::Timeout,
            16 => Self::Locked,
            17 => Self::NotEnoughCore,
            18 => Self::TooManyOpenFiles,
            19 => Self::InvalidParameter,
            other => return Err(other),
        })
    }

    /// The raw FatFs code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Short description for log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DiskErr => "disk error",
            Self::IntErr => "internal error",
            Self::NotReady => "not ready",
            Self::NoFile => "no such file",
            Self::NoPath => "no such path",
            Self::InvalidName => "invalid name",
            Self::Denied => "access denied",
            Self::Exist => "already exists",
            Self::InvalidObject => "invalid object",
            Self::WriteProtected => "write protected",
            Self::InvalidDrive => "invalid drive",
            Self::NotEnabled => "volume not enabled",
            Self::NoFilesystem => "no filesystem",
            Self::MkfsAborted => "format aborted",
            Self::Timeout => "volume timeout",
            Self::Locked => "locked",
            Self::NotEnoughCore => "out of memory",
            Self::TooManyOpenFiles => "too many open files",
            Self::InvalidParameter => "invalid parameter",
        }
    }
}

impl core::fmt::Display for FsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reserved code for "the non-returning handoff returned".
pub const HANDOFF_RETURNED_CODE: i32 = -0x1000;

/// Code shared by every transfer-stage failure.
pub const TRANSFER_FAILED_CODE: i32 = -1;

/// Code reported when the presence probe fails.
pub const NOT_PRESENT_CODE: i32 = -1;

/// Errors returned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The device (or local validation) reported a FatFs error.
    #[error("filesystem error: {0}")]
    Fs(FsError),
    /// The device reported a status byte outside the FatFs table.
    #[error("unknown device status {0:#04x}")]
    Status(u8),
    /// The buffer transfer was refused; the device's code is not kept.
    #[error("buffer transfer failed")]
    Transfer,
    /// The presence probe did not identify a Satiator.
    #[error("satiator not detected")]
    NotPresent,
    /// A configured deadline expired while waiting on HIRQ.
    #[error("device did not answer before the deadline")]
    Timeout,
    /// The packed rename operands exceed the device buffer.
    #[error("rename operands exceed {bound} bytes")]
    NameTooLong {
        /// Size of the packing buffer.
        bound: usize,
    },
    /// The device returned a stat record shorter than its fixed header.
    #[error("stat record of {0} bytes is shorter than its header")]
    ShortRecord(usize),
    /// The BIOS refused to stage the alternate firmware image.
    #[error("BIOS load failed with {0}")]
    Bios(i32),
    /// The non-returning jump into the alternate firmware returned.
    #[error("firmware handoff returned")]
    HandoffReturned,
}

impl Error {
    /// Shorthand for the local argument-validation failure.
    pub const INVALID_PARAMETER: Self = Self::Fs(FsError::InvalidParameter);

    /// Decode a non-zero status byte.
    #[must_use]
    pub const fn from_status(code: u8) -> Self {
        match FsError::from_code(code) {
            Ok(fs) => Self::Fs(fs),
            Err(raw) => Self::Status(raw),
        }
    }

    /// The signed integer code for this error.
    ///
    /// Device codes are negated; driver-local failures reuse the nearest
    /// FatFs code so callers keep a single numeric domain.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn code(self) -> i32 {
        match self {
            Self::Fs(fs) => -(fs.code() as i32),
            Self::Status(raw) => -(raw as i32),
            Self::Transfer => TRANSFER_FAILED_CODE,
            Self::NotPresent => NOT_PRESENT_CODE,
            Self::Timeout => -(FsError::Timeout.code() as i32),
            Self::NameTooLong { .. } => -(FsError::InvalidName.code() as i32),
            Self::ShortRecord(_) => -(FsError::IntErr.code() as i32),
            Self::Bios(ret) => ret,
            Self::HandoffReturned => HANDOFF_RETURNED_CODE,
        }
    }
}

impl From<FsError> for Error {
    fn from(fs: FsError) -> Self {
        Self::Fs(fs)
    }
}

/// Driver result type.
pub type Result<T> = core::result::Result<T, Error>;
