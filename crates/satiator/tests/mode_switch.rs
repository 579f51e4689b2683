//! Mode state machine and executor policies against the simulator.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use embassy_time::Duration;
use satiator::regs::{
    FRAME_ENTER_DISC_EMULATION, FRAME_HARDWARE_INFO, FRAME_STOP_DRIVE, FRAME_UNLOCK_API,
};
use satiator::{
    Config, Deadline, Error, FsError, Handle, InterruptPolicy, Mode, OpenFlags, Satiator,
};
use satiator_sim::{DeviceMode, SimCdBlock, SimHost};

fn frames(sat: &Satiator<SimCdBlock, SimHost>) -> Vec<[u16; 4]> {
    sat.bus().stats.commands.iter().map(|f| f.words()).collect()
}

#[test]
fn first_api_request_bootstraps_through_disc_emulation() {
    satiator_sim::init_tracing();
    let mut sat = Satiator::new(SimCdBlock::new(), SimHost::new());
    assert_eq!(sat.mode(), Mode::Unknown);

    sat.set_mode(Mode::StorageApi).unwrap();
    assert_eq!(sat.mode(), Mode::StorageApi);
    assert_eq!(sat.bus().mode(), DeviceMode::Api);
    assert_eq!(
        frames(&sat),
        [FRAME_ENTER_DISC_EMULATION, FRAME_UNLOCK_API, FRAME_HARDWARE_INFO, FRAME_STOP_DRIVE]
    );
}

#[test]
fn repeated_request_writes_no_register() {
    let mut sat = Satiator::new(SimCdBlock::new(), SimHost::new());
    sat.set_mode(Mode::StorageApi).unwrap();
    let writes = sat.bus().stats.register_writes;
    let accesses = sat.bus().stats.accesses;

    sat.set_mode(Mode::StorageApi).unwrap();
    sat.set_mode(Mode::Unknown).unwrap();
    assert_eq!(sat.bus().stats.register_writes, writes);
    assert_eq!(sat.bus().stats.accesses, accesses);
}

#[test]
fn failed_probe_keeps_tracked_mode() {
    let mut sat = Satiator::new(SimCdBlock::genuine_mpeg_card(), SimHost::new());
    sat.set_mode(Mode::DiscEmulation).unwrap();

    let err = sat.set_mode(Mode::StorageApi).unwrap_err();
    assert_eq!(err, Error::NotPresent);
    assert_eq!(err.code(), -1);
    assert_eq!(sat.mode(), Mode::DiscEmulation);
    // Probe failed, so no stop-drive frame followed the unlock.
    assert_eq!(frames(&sat).last(), Some(&FRAME_HARDWARE_INFO));
}

#[test]
fn unknown_request_on_fresh_session_reaches_disc_baseline() {
    let mut sat = Satiator::new(SimCdBlock::new(), SimHost::new());
    sat.set_mode(Mode::Unknown).unwrap();
    assert_eq!(sat.mode(), Mode::DiscEmulation);
    assert_eq!(sat.bus().mode(), DeviceMode::Disc);
    assert_eq!(frames(&sat), [FRAME_ENTER_DISC_EMULATION]);
    assert_eq!(sat.bus().stats.register_writes, 4);
}

#[test]
fn leaving_api_disables_file_commands() {
    let mut dev = SimCdBlock::new();
    dev.firmware.fs.insert_file("/A.TXT", b"a");
    let mut sat = Satiator::new(dev, SimHost::new());
    sat.set_mode(Mode::StorageApi).unwrap();
    let fd = sat.open("A.TXT", OpenFlags::READ).unwrap();
    sat.close(fd).unwrap();

    sat.set_mode(Mode::DiscEmulation).unwrap();
    assert_eq!(sat.bus().mode(), DeviceMode::Disc);
    assert_eq!(sat.open("A.TXT", OpenFlags::READ), Err(Error::Fs(FsError::NotReady)));

    sat.set_mode(Mode::StorageApi).unwrap();
    assert!(sat.open("A.TXT", OpenFlags::READ).is_ok());
}

#[test]
fn deadline_turns_a_hung_device_into_timeout() {
    let config = Config::new().with_deadline(Deadline::After(Duration::from_millis(20)));
    let mut sat = Satiator::with_config(SimCdBlock::new(), SimHost::new(), config);
    sat.set_mode(Mode::StorageApi).unwrap();

    sat.bus_mut().set_unresponsive(true);
    let err = sat.close(Handle(0)).unwrap_err();
    assert_eq!(err, Error::Timeout);
    assert_eq!(err.code(), -15);
}

#[test]
fn failed_bootstrap_leaves_mode_unknown() {
    let config = Config::new().with_deadline(Deadline::After(Duration::from_millis(10)));
    let mut dev = SimCdBlock::new();
    dev.set_unresponsive(true);
    let mut sat = Satiator::with_config(dev, SimHost::new(), config);
    assert_eq!(sat.set_mode(Mode::StorageApi), Err(Error::Timeout));
    assert_eq!(sat.mode(), Mode::Unknown);
}

#[test]
fn interrupt_masking_is_opt_in_and_always_restored() {
    let mut sat = Satiator::new(SimCdBlock::new(), SimHost::new());
    sat.set_mode(Mode::StorageApi).unwrap();
    assert_eq!(sat.host().masks, 0);

    sat.set_config(Config::new().with_interrupt_policy(InterruptPolicy::MaskDuringCommand));
    let fd = sat.open("NEW.BIN", OpenFlags(0x02 | 0x04)).unwrap();
    sat.close(fd).unwrap();
    // write-buffer, open, status, close, status
    assert_eq!(sat.host().masks, 5);
    assert!(!sat.host().interrupts_masked());
}
