//! Host CPU and BIOS services the driver needs beyond the CD block.
//!
//! Interrupt masking and the firmware handoff touch the SH-2 status register
//! and the BIOS vector table. The driver reaches them through
//! [`HostServices`] so host builds can substitute a recording fake.

use crate::regs::BIOS_GET_MPEG_ROM_VECTOR;

/// SH-2 status register interrupt-mask field (I3–I0) set to level 15.
pub const SR_IMASK_ALL: u32 = 0x0000_00F0;

/// CPU and firmware services used by the driver.
pub trait HostServices {
    /// Raise the CPU interrupt mask to block every level.
    /// Returns the state to hand back to [`HostServices::restore_interrupts`].
    fn mask_interrupts(&mut self) -> u32;

    /// Restore the interrupt state returned by `mask_interrupts`.
    fn restore_interrupts(&mut self, saved: u32);

    /// Call the BIOS "load MPEG ROM" routine, staging image `index` of
    /// `size` units at `address`. Negative return values are BIOS errors.
    fn load_mpeg_rom(&mut self, index: u32, size: u32, address: u32) -> i32;

    /// Transfer control to `entry`, passing `param` as first argument.
    ///
    /// # Safety
    ///
    /// `entry` must hold a valid program image for the host CPU. On real
    /// hardware this never returns; if it does, the caller must assume the
    /// machine state is unknown.
    unsafe fn jump(&mut self, entry: u32, param: u32);
}

type GetMpegRomFn = unsafe extern "C" fn(u32, u32, u32) -> i32;
type EntryFn = unsafe extern "C" fn(u32);

/// [`HostServices`] for a real Saturn.
///
/// Rust has no SH-2 inline assembly, so status register access comes from
/// two tiny assembly shims the integrator links in (`stc sr,r0` /
/// `ldc r4,sr`).
pub struct SaturnHost {
    read_sr: unsafe extern "C" fn() -> u32,
    write_sr: unsafe extern "C" fn(u32),
}

impl SaturnHost {
    /// Build the host services from status register accessors.
    ///
    /// # Safety
    ///
    /// `read_sr` must return the SH-2 status register and `write_sr` must
    /// load its argument into it, with no other side effects.
    #[must_use]
    pub const unsafe fn new(
        read_sr: unsafe extern "C" fn() -> u32,
        write_sr: unsafe extern "C" fn(u32),
    ) -> Self {
        Self { read_sr, write_sr }
    }
}

impl HostServices for SaturnHost {
    fn mask_interrupts(&mut self) -> u32 {
        // SAFETY: contract of `SaturnHost::new`.
        let sr = unsafe { (self.read_sr)() };
        // SAFETY: as above.
        unsafe { (self.write_sr)(sr | SR_IMASK_ALL) };
        sr
    }

    fn restore_interrupts(&mut self, saved: u32) {
        // SAFETY: contract of `SaturnHost::new`.
        unsafe { (self.write_sr)(saved) }
    }

    fn load_mpeg_rom(&mut self, index: u32, size: u32, address: u32) -> i32 {
        // SAFETY: the BIOS keeps a routine pointer at this fixed vector for
        // the lifetime of the machine.
        let routine = unsafe { (BIOS_GET_MPEG_ROM_VECTOR as *const usize).read_volatile() };
        // SAFETY: the vector holds the address of a C-ABI BIOS routine.
        let routine: GetMpegRomFn = unsafe { core::mem::transmute::<usize, GetMpegRomFn>(routine) };
        // SAFETY: arguments follow the BIOS calling convention.
        unsafe { routine(index, size, address) }
    }

    unsafe fn jump(&mut self, entry: u32, param: u32) {
        // SAFETY: caller guarantees `entry` holds a valid image.
        let entry: EntryFn = unsafe { core::mem::transmute::<usize, EntryFn>(entry as usize) };
        // SAFETY: as above.
        unsafe { entry(param) }
    }
}
