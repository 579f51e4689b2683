//! Command frames and status responses.
//!
//! Wire layout of both (four 16-bit words in CR1..CR4 order):
//!
//! ```text
//! word0  [15:8] opcode / error code   [7:0] target (handle or sub-selector)
//! word1  flags
//! word2  length/offset bits 31..16
//! word3  length/offset bits 15..0
//! ```

/// A four-word command, written to CR1..CR4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandFrame(pub [u16; 4]);

#[allow(clippy::arithmetic_side_effects)]
impl CommandFrame {
    /// Pack a Satiator API command.
    ///
    /// `target` is the file handle or info sub-selector; `length` carries a
    /// byte count, offset or magic value depending on the opcode.
    #[must_use]
    pub const fn new(opcode: u8, target: u8, flags: u16, length: u32) -> Self {
        Self([
            ((opcode as u16) << 8) | target as u16,
            flags,
            (length >> 16) as u16,
            (length & 0xFFFF) as u16,
        ])
    }

    /// A raw frame, for stock CD block commands.
    #[must_use]
    pub const fn raw(words: [u16; 4]) -> Self {
        Self(words)
    }

    /// The opcode byte.
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        (self.0[0] >> 8) as u8
    }

    /// The target byte.
    #[must_use]
    pub const fn target(&self) -> u8 {
        (self.0[0] & 0xFF) as u8
    }

    /// The flags word.
    #[must_use]
    pub const fn flags(&self) -> u16 {
        self.0[1]
    }

    /// The 32-bit length field.
    #[must_use]
    pub const fn length(&self) -> u32 {
        ((self.0[2] as u32) << 16) | self.0[3] as u32
    }

    /// The words in register order.
    #[must_use]
    pub const fn words(&self) -> [u16; 4] {
        self.0
    }
}

/// The four response registers captured after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusResponse(pub [u16; 4]);

#[allow(clippy::arithmetic_side_effects)]
impl StatusResponse {
    /// Error code byte; zero means success.
    #[must_use]
    pub const fn error_code(&self) -> u8 {
        (self.0[0] >> 8) as u8
    }

    /// `(word2 << 16) | word3`: byte count, offset or handle depending on
    /// the command that produced it.
    #[must_use]
    pub const fn length(&self) -> u32 {
        ((self.0[2] as u32) << 16) | self.0[3] as u32
    }

    /// Response word1. The SD latency benchmark reports its error count here.
    #[must_use]
    pub const fn aux(&self) -> u16 {
        self.0[1]
    }

    /// Response word3 on its own. `open` returns the handle here.
    #[must_use]
    pub const fn low_word(&self) -> u16 {
        self.0[3]
    }

    /// The raw words.
    #[must_use]
    pub const fn words(&self) -> [u16; 4] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_packs_opcode_target_flags_and_split_length() {
        let frame = CommandFrame::new(0xA3, 0x05, 0x0001, 0x0012_3456);
        assert_eq!(frame.words(), [0xA305, 0x0001, 0x0012, 0x3456]);
        assert_eq!(frame.opcode(), 0xA3);
        assert_eq!(frame.target(), 0x05);
        assert_eq!(frame.flags(), 0x0001);
        assert_eq!(frame.length(), 0x0012_3456);
    }

    #[test]
    fn status_decodes_error_byte_and_length() {
        let status = StatusResponse([0x0400, 0x0003, 0xDEAD, 0xBEEF]);
        assert_eq!(status.error_code(), 4);
        assert_eq!(status.length(), 0xDEAD_BEEF);
        assert_eq!(status.aux(), 3);
        assert_eq!(status.low_word(), 0xBEEF);
    }

    #[test]
    fn low_status_byte_is_not_an_error() {
        let status = StatusResponse([0x00FF, 0, 0, 0]);
        assert_eq!(status.error_code(), 0);
    }
}
