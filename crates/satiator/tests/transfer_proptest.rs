//! Property-based tests for the buffer transfer engine and file I/O.
//! Verifies invariants hold for every payload size, not just fixed examples.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use proptest::collection::vec;
use proptest::prelude::*;
use satiator::{CommandFrame, Error, Mode, OpenFlags, Satiator, Whence, MAX_TRANSFER};
use satiator_sim::{SimCdBlock, SimHost};

fn session() -> Satiator<SimCdBlock, SimHost> {
    let mut sat = Satiator::new(SimCdBlock::new(), SimHost::new());
    sat.set_mode(Mode::StorageApi).expect("enter storage API");
    sat
}

proptest! {
    /// Any payload up to the limit survives a trip through the device buffer,
    /// with the write trailer always present.
    #[test]
    fn device_buffer_is_lossless(data in vec(any::<u8>(), 0..=MAX_TRANSFER)) {
        let mut sat = session();
        sat.write_buffer(&data).unwrap();
        prop_assert_eq!(sat.bus().buffer(), &data[..]);

        let mut back = vec![0u8; data.len()];
        sat.read_buffer(&mut back).unwrap();
        prop_assert_eq!(back, data);
        prop_assert_eq!(sat.bus().stats.trailer_errors, 0);
        prop_assert_eq!(sat.bus().stats.data_overruns, 0);
    }

    /// Anything past the limit is refused before the bus sees a single access.
    #[test]
    fn oversized_payload_never_reaches_bus(extra in 1usize..4096) {
        let mut sat = session();
        let before = sat.bus().stats.accesses;
        let data = vec![0u8; MAX_TRANSFER + extra];
        prop_assert_eq!(sat.write_buffer(&data), Err(Error::INVALID_PARAMETER));
        prop_assert_eq!(sat.bus().stats.accesses, before);
    }

    /// Reads from any offset return exactly the stored bytes from there on,
    /// never more than asked for.
    #[test]
    fn read_at_offset_matches_file(
        data in vec(any::<u8>(), 1..=MAX_TRANSFER),
        offset_seed in any::<usize>(),
        want in 0usize..=MAX_TRANSFER,
    ) {
        let mut dev = SimCdBlock::new();
        dev.firmware.fs.insert_file("/F.BIN", &data);
        let mut sat = Satiator::new(dev, SimHost::new());
        sat.set_mode(Mode::StorageApi).unwrap();

        let offset = offset_seed % data.len();
        let fd = sat.open("F.BIN", OpenFlags::READ).unwrap();
        let pos = sat.seek(fd, i32::try_from(offset).unwrap(), Whence::Start).unwrap();
        prop_assert_eq!(pos as usize, offset);

        let mut buf = vec![0u8; want];
        let n = sat.read(fd, &mut buf).unwrap();
        let expected = &data[offset..data.len().min(offset + want)];
        prop_assert_eq!(n, expected.len());
        prop_assert_eq!(&buf[..n], expected);
    }

    /// The 32-bit length field splits across word2/word3 high half first.
    #[test]
    fn frame_length_splits_high_half_first(op in any::<u8>(), target in any::<u8>(), len in any::<u32>()) {
        let words = CommandFrame::new(op, target, 0, len).words();
        prop_assert_eq!(words[0], u16::from(op) << 8 | u16::from(target));
        prop_assert_eq!(u32::from(words[2]) << 16 | u32::from(words[3]), len);
    }
}
