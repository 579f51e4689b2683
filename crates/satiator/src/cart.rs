//! Satiator cartridge detection.
//!
//! A Satiator cartridge exposes a header somewhere in the A-bus CS0 window,
//! aligned to 256 bytes and starting with a fixed signature.

/// Start of the window scanned for the cartridge header.
pub const CART_WINDOW_BASE: usize = 0x0200_0000;

/// Size of the scanned window.
pub const CART_WINDOW_LEN: usize = 0x0010_0000;

/// Alignment of the header inside the window.
pub const CART_STRIDE: usize = 0x100;

/// Signature at the start of the header.
pub const CART_SIGNATURE: [u8; 12] = *b"SatiatorCart";

/// A located cartridge header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CartridgeHeader {
    address: usize,
}

impl CartridgeHeader {
    /// Address of the header.
    pub const fn address(&self) -> usize {
        self.address
    }

    /// The signature the header starts with.
    pub const fn signature(&self) -> &'static [u8; 12] {
        &CART_SIGNATURE
    }
}

/// Offset of the first signature match in `window`, checking only
/// stride-aligned offsets.
pub fn locate(window: &[u8]) -> Option<usize> {
    (0..window.len())
        .step_by(CART_STRIDE)
        .find(|&offset| window.get(offset..).is_some_and(|rest| rest.starts_with(&CART_SIGNATURE)))
}

/// Scan the cartridge window of the running console.
///
/// # Safety
///
/// The whole window at [`CART_WINDOW_BASE`] must be mapped and readable
/// with no side effects, which holds on a Saturn but nowhere else.
pub unsafe fn find_cartridge() -> Option<CartridgeHeader> {
    // SAFETY: caller guarantees the window is mapped and readable.
    let window =
        unsafe { core::slice::from_raw_parts(CART_WINDOW_BASE as *const u8, CART_WINDOW_LEN) };
    let offset = locate(window)?;
    let address = CART_WINDOW_BASE.checked_add(offset)?;
    debug!("cartridge header at {:#x}", address);
    Some(CartridgeHeader { address })
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_has_no_cartridge() {
        assert_eq!(locate(&[]), None);
        assert_eq!(locate(&vec![0xFF; 4096]), None);
    }

    #[test]
    fn finds_first_aligned_signature() {
        let mut window = vec![0u8; 4096];
        window[0x300..0x30C].copy_from_slice(&CART_SIGNATURE);
        window[0x500..0x50C].copy_from_slice(&CART_SIGNATURE);
        assert_eq!(locate(&window), Some(0x300));
    }

    #[test]
    fn misaligned_signature_is_ignored() {
        let mut window = vec![0u8; 4096];
        window[0x301..0x30D].copy_from_slice(&CART_SIGNATURE);
        assert_eq!(locate(&window), None);
    }

    #[test]
    fn signature_cut_by_window_end_is_ignored() {
        let mut window = vec![0u8; 0x206];
        window[0x200..].copy_from_slice(&CART_SIGNATURE[..6]);
        assert_eq!(locate(&window), None);
    }
}
