//! Register-level access to the CD block.
//!
//! [`CdBlock`] is the hardware seam of the driver: everything above it speaks
//! frames and payloads, everything below it is four command registers, the
//! HIRQ flag word and the 32-bit data register. [`MmioCdBlock`] is the
//! console implementation; host tests plug in a simulated device instead.

use crate::regs::{
    CDB_REG_CR1, CDB_REG_CR2, CDB_REG_CR3, CDB_REG_CR4, CDB_REG_DATATRNS, CDB_REG_HIRQ,
};

/// One of the four 16-bit command/response registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandReg {
    /// CR1: word0 of a frame (opcode, target).
    Cr1,
    /// CR2: word1 (flags).
    Cr2,
    /// CR3: word2 (length high half).
    Cr3,
    /// CR4: word3 (length low half). Writing it issues the command.
    Cr4,
}

impl CommandReg {
    /// All command registers in the order a frame must be written.
    pub const ALL: [CommandReg; 4] = [Self::Cr1, Self::Cr2, Self::Cr3, Self::Cr4];

    /// Bus address of the register.
    #[must_use]
    pub const fn address(self) -> usize {
        match self {
            Self::Cr1 => CDB_REG_CR1,
            Self::Cr2 => CDB_REG_CR2,
            Self::Cr3 => CDB_REG_CR3,
            Self::Cr4 => CDB_REG_CR4,
        }
    }
}

/// Raw access to the CD block registers.
///
/// Implementations perform exactly one bus access per call and never cache:
/// HIRQ in particular changes underneath the driver while it polls.
pub trait CdBlock {
    /// Read the HIRQ flag word.
    fn read_hirq(&mut self) -> u16;

    /// Write the HIRQ flag word (bits written as 0 are cleared).
    fn write_hirq(&mut self, value: u16);

    /// Read a command/response register.
    fn read_cr(&mut self, reg: CommandReg) -> u16;

    /// Write a command register.
    fn write_cr(&mut self, reg: CommandReg, value: u16);

    /// Pop one word from the data transfer register.
    fn read_data(&mut self) -> u32;

    /// Push one word into the data transfer register.
    fn write_data(&mut self, value: u32);
}

impl<T: CdBlock + ?Sized> CdBlock for &mut T {
    fn read_hirq(&mut self) -> u16 {
        (**self).read_hirq()
    }

    fn write_hirq(&mut self, value: u16) {
        (**self).write_hirq(value);
    }

    fn read_cr(&mut self, reg: CommandReg) -> u16 {
        (**self).read_cr(reg)
    }

    fn write_cr(&mut self, reg: CommandReg, value: u16) {
        (**self).write_cr(reg, value);
    }

    fn read_data(&mut self) -> u32 {
        (**self).read_data()
    }

    fn write_data(&mut self, value: u32) {
        (**self).write_data(value);
    }
}

/// Memory-mapped CD block on the Saturn A-bus.
///
/// Zero-sized; owning one is the license to drive the registers. There is
/// no `Clone`: two owners would interleave frames.
pub struct MmioCdBlock {
    _private: (),
}

impl MmioCdBlock {
    /// Take ownership of the CD block register window.
    ///
    /// # Safety
    ///
    /// Must run on a Saturn (or a target mapping the CD block at the
    /// addresses in [`crate::regs`]), and at most one `MmioCdBlock` may exist
    /// at a time. Nothing else, including interrupt handlers, may issue CD
    /// block commands while it is alive.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn reg16(address: usize) -> *mut u16 {
        address as *mut u16
    }
}

impl CdBlock for MmioCdBlock {
    fn read_hirq(&mut self) -> u16 {
        // SAFETY: `new` guarantees the CD block is mapped and exclusively ours.
        unsafe { Self::reg16(CDB_REG_HIRQ).read_volatile() }
    }

    fn write_hirq(&mut self, value: u16) {
        // SAFETY: as above.
        unsafe { Self::reg16(CDB_REG_HIRQ).write_volatile(value) }
    }

    fn read_cr(&mut self, reg: CommandReg) -> u16 {
        // SAFETY: as above; CR addresses are 16-bit aligned registers.
        unsafe { Self::reg16(reg.address()).read_volatile() }
    }

    fn write_cr(&mut self, reg: CommandReg, value: u16) {
        // SAFETY: as above.
        unsafe { Self::reg16(reg.address()).write_volatile(value) }
    }

    fn read_data(&mut self) -> u32 {
        // SAFETY: as above; the data register is a 32-bit aligned FIFO port.
        unsafe { (CDB_REG_DATATRNS as *const u32).read_volatile() }
    }

    fn write_data(&mut self, value: u32) {
        // SAFETY: as above.
        unsafe { (CDB_REG_DATATRNS as *mut u32).write_volatile(value) }
    }
}
