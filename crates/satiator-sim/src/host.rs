//! Simulated SH-2 status register and BIOS.

use satiator::host::SR_IMASK_ALL;
use satiator::HostServices;

/// Records every host service the driver uses.
#[derive(Debug, Default)]
pub struct SimHost {
    /// Simulated status register.
    pub sr: u32,
    /// Value returned by the BIOS "load MPEG ROM" call.
    pub load_result: i32,
    /// Arguments of each BIOS load call.
    pub loads: Vec<(u32, u32, u32)>,
    /// Entry point and parameter of each jump, with the SR seen at the time.
    pub jumps: Vec<(u32, u32, u32)>,
    /// Number of mask/restore pairs started.
    pub masks: usize,
}

impl SimHost {
    /// Host with interrupts enabled and a BIOS that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every interrupt level is currently masked.
    pub fn interrupts_masked(&self) -> bool {
        self.sr & SR_IMASK_ALL == SR_IMASK_ALL
    }
}

impl HostServices for SimHost {
    fn mask_interrupts(&mut self) -> u32 {
        let saved = self.sr;
        self.sr |= SR_IMASK_ALL;
        self.masks += 1;
        saved
    }

    fn restore_interrupts(&mut self, saved: u32) {
        self.sr = saved;
    }

    fn load_mpeg_rom(&mut self, index: u32, size: u32, address: u32) -> i32 {
        tracing::debug!(index, size, address, "bios load");
        self.loads.push((index, size, address));
        self.load_result
    }

    unsafe fn jump(&mut self, entry: u32, param: u32) {
        // Nothing to run: control comes straight back, which the driver
        // must report.
        tracing::debug!(entry, param, "jump");
        self.jumps.push((entry, param, self.sr));
    }
}
