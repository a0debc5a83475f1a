use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::bus::{CpuRequestType, PageType};
use crate::suzy::request::SuzyRequest;

/// What a scheduled [`Action`] does when its tick comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Resolves the in-flight CPU request against the given page.
    Cpu(CpuRequestType, PageType),
    /// Executes one sprite engine memory request.
    Suzy(SuzyRequest),
    /// Expiry of one of the 12 Mikey timers.
    FireTimer(u8),
    /// Fetches 8 bytes of display memory for the pixel generator.
    DisplayDma(u16),
    SampleAudio,
    EndFrame,
}

impl ActionKind {
    /// Dispatch of a CPU request type against the page it targets.
    /// `None` requests schedule nothing.
    ///
    /// # Panics
    ///
    /// Fetching an instruction from a chip register page breaks the bus protocol.
    #[must_use]
    pub fn cpu(request: CpuRequestType, page: PageType) -> Option<Self> {
        match (request, page) {
            (CpuRequestType::None, _) => None,
            (
                CpuRequestType::FetchOpcode | CpuRequestType::FetchOperand,
                PageType::Mikey | PageType::Suzy,
            ) => panic!("CPU instruction fetch from {page:?} page"),
            (
                CpuRequestType::FetchOpcode
                | CpuRequestType::FetchOperand
                | CpuRequestType::Read
                | CpuRequestType::Write,
                PageType::Ram | PageType::BootRomLow | PageType::BootRomHigh,
            )
            | (CpuRequestType::Read | CpuRequestType::Write, PageType::Mikey | PageType::Suzy) => {
                Some(ActionKind::Cpu(request, page))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Action {
    tick: u64,
    seq: u64,
    kind: ActionKind,
}

impl Action {
    #[inline]
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }
}

// BinaryHeap is a max-heap, the earliest (tick, seq) has to compare greatest.
impl Ord for Action {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .tick
            .cmp(&self.tick)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Action {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick && self.seq == other.seq
    }
}

impl Eq for Action {}

/// Tick ordered queue of pending actions. Actions sharing a tick pop in
/// insertion order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ActionQueue {
    heap: BinaryHeap<Action>,
    next_seq: u64,
}

impl ActionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ActionKind, tick: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Action { tick, seq, kind });
    }

    pub fn pop(&mut self) -> Option<Action> {
        self.heap.pop()
    }

    #[must_use]
    pub fn peek_tick(&self) -> Option<u64> {
        self.heap.peek().map(Action::tick)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}
