use std::collections::VecDeque;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::bus::{CpuRequest, CpuRequestType};

/// The 65C02 seen from the bus: a resumable executor that emits one bus
/// request per cycle and is suspended until the bus master resolves it.
///
/// `resume` receives the resolved previous request (a default, `None` typed
/// request on the very first call) and returns the next one. Returning a
/// `None` typed request stops the CPU until the next reset.
pub trait Cpu {
    fn resume(&mut self, resolved: &CpuRequest) -> CpuRequest;
    fn reset(&mut self);
}

const TRACE_LENGTH: usize = 64;

/// Ring of the last opcode fetches.
#[derive(Default, Clone, Serialize, Deserialize)]
pub struct InstructionTrace {
    entries: VecDeque<(u64, u16)>,
}

impl InstructionTrace {
    pub fn record(&mut self, request: &CpuRequest) {
        if request.kind != CpuRequestType::FetchOpcode {
            return;
        }
        trace!("[{}] PC 0x{:04x} op 0x{:02x}", request.tick, request.address, request.value);
        if self.entries.len() == TRACE_LENGTH {
            self.entries.pop_front();
        }
        self.entries.push_back((request.tick, request.address));
    }

    /// Program counter of the last fetched opcode.
    #[must_use]
    pub fn last_pc(&self) -> Option<u16> {
        self.entries.back().map(|(_, pc)| *pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u64, u16)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
