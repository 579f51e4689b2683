//! Scripted fakes for unit tests.
//!
//! `FakeBus` answers every issued frame with the next scripted register
//! snapshot and raises a fixed set of HIRQ bits. It knows nothing about the
//! Satiator command set; integration tests use `satiator-sim` for that.
#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use std::collections::VecDeque;
use std::vec::Vec;

use crate::bus::{CdBlock, CommandReg};
use crate::host::HostServices;

fn index(reg: CommandReg) -> usize {
    match reg {
        CommandReg::Cr1 => 0,
        CommandReg::Cr2 => 1,
        CommandReg::Cr3 => 2,
        CommandReg::Cr4 => 3,
    }
}

pub(crate) struct FakeBus {
    pub hirq: u16,
    pub cr: [u16; 4],
    pub raise_on_issue: u16,
    pub responses: VecDeque<[u16; 4]>,
    pub issued: Vec<[u16; 4]>,
    pub hirq_writes: Vec<u16>,
    pub data_in: VecDeque<u32>,
    pub data_out: Vec<u32>,
    pub accesses: usize,
    pending: [u16; 4],
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            hirq: 0,
            cr: [0; 4],
            raise_on_issue: 0x3FFF,
            responses: VecDeque::new(),
            issued: Vec::new(),
            hirq_writes: Vec::new(),
            data_in: VecDeque::new(),
            data_out: Vec::new(),
            accesses: 0,
            pending: [0; 4],
        }
    }

    /// Queue the CR snapshot the next issued frame will leave behind.
    pub fn respond(&mut self, words: [u16; 4]) -> &mut Self {
        self.responses.push_back(words);
        self
    }
}

impl CdBlock for FakeBus {
    fn read_hirq(&mut self) -> u16 {
        self.accesses += 1;
        self.hirq
    }

    fn write_hirq(&mut self, value: u16) {
        self.accesses += 1;
        self.hirq_writes.push(value);
        self.hirq &= value;
    }

    fn read_cr(&mut self, reg: CommandReg) -> u16 {
        self.accesses += 1;
        self.cr[index(reg)]
    }

    fn write_cr(&mut self, reg: CommandReg, value: u16) {
        self.accesses += 1;
        self.pending[index(reg)] = value;
        if reg == CommandReg::Cr4 {
            self.issued.push(self.pending);
            self.cr = self.responses.pop_front().unwrap_or_default();
            self.hirq |= self.raise_on_issue;
        }
    }

    fn read_data(&mut self) -> u32 {
        self.accesses += 1;
        self.data_in.pop_front().unwrap_or(0)
    }

    fn write_data(&mut self, value: u32) {
        self.accesses += 1;
        self.data_out.push(value);
    }
}

#[derive(Default)]
pub(crate) struct FakeHost {
    pub masked: usize,
    pub restored: Vec<u32>,
    pub load_result: i32,
    pub loads: Vec<(u32, u32, u32)>,
    pub jumps: Vec<(u32, u32)>,
}

impl HostServices for FakeHost {
    fn mask_interrupts(&mut self) -> u32 {
        self.masked += 1;
        0x0000_0070
    }

    fn restore_interrupts(&mut self, saved: u32) {
        self.restored.push(saved);
    }

    fn load_mpeg_rom(&mut self, index: u32, size: u32, address: u32) -> i32 {
        self.loads.push((index, size, address));
        self.load_result
    }

    unsafe fn jump(&mut self, entry: u32, param: u32) {
        self.jumps.push((entry, param));
    }
}
