use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::{
    FAST_CYCLE_TICKS, MAPCTL_MIK_BIT, MAPCTL_ROM_BIT, MAPCTL_SEQ_BIT, MAPCTL_SUZ_BIT,
    MAPCTL_VEC_BIT, MIK_PAGE, ROM_PAGE, SLOW_CYCLE_TICKS, SUZ_PAGE, VEC_PAGE,
};

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MapCtl:u8
    {
        const sequential_disable = MAPCTL_SEQ_BIT;
        const vector_disable     = MAPCTL_VEC_BIT;
        const kernel_disable     = MAPCTL_ROM_BIT;
        const mikey_disable      = MAPCTL_MIK_BIT;
        const suzy_disable       = MAPCTL_SUZ_BIT;
    }
}

impl MapCtl {
    /// Read back value of the MAPCTL register, high nibble always set.
    #[must_use]
    pub fn read(&self) -> u8 {
        0xf0 | (self.bits() & 0x0f)
    }

    #[must_use]
    pub fn fast_cycle_ticks(&self) -> u64 {
        if self.contains(MapCtl::sequential_disable) {
            SLOW_CYCLE_TICKS
        } else {
            FAST_CYCLE_TICKS
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    Ram,
    /// Page 0xFE, boot ROM low half.
    BootRomLow,
    /// Page 0xFF, vectors, MAPCTL and boot ROM high half.
    BootRomHigh,
    Mikey,
    Suzy,
}

/// High address byte to page type. Only pages 0xFC-0xFF ever change.
#[derive(Clone, Serialize, Deserialize)]
pub struct PageTable {
    pages: Vec<PageType>,
}

impl PageTable {
    #[must_use]
    pub fn new() -> Self {
        let mut pages = vec![PageType::Ram; 0x100];
        pages[SUZ_PAGE as usize] = PageType::Suzy;
        pages[MIK_PAGE as usize] = PageType::Mikey;
        pages[ROM_PAGE as usize] = PageType::BootRomLow;
        pages[VEC_PAGE as usize] = PageType::BootRomHigh;
        Self { pages }
    }

    #[inline]
    #[must_use]
    pub fn page(&self, address: u16) -> PageType {
        self.pages[(address >> 8) as usize]
    }

    pub fn remap(&mut self, map_ctl: MapCtl) {
        self.pages[ROM_PAGE as usize] = if map_ctl.contains(MapCtl::kernel_disable) {
            PageType::Ram
        } else {
            PageType::BootRomLow
        };
        self.pages[MIK_PAGE as usize] = if map_ctl.contains(MapCtl::mikey_disable) {
            PageType::Ram
        } else {
            PageType::Mikey
        };
        self.pages[SUZ_PAGE as usize] = if map_ctl.contains(MapCtl::suzy_disable) {
            PageType::Ram
        } else {
            PageType::Suzy
        };
    }
}

impl Default for PageTable {
    fn default() -> Self {
        PageTable::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuRequestType {
    #[default]
    None,
    FetchOpcode,
    FetchOperand,
    Read,
    Write,
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CpuInterrupt:u8
    {
        const irq   = 0b0000_0001;
        const nmi   = 0b0000_0010;
        const reset = 0b0000_0100;
    }
}

/// One bus transaction between the CPU and the bus master. The CPU fills in
/// the type, address and (for writes) the value, the bus master completes
/// the value for reads, the resolution tick and the pending interrupts.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuRequest {
    pub kind: CpuRequestType,
    pub address: u16,
    pub value: u8,
    pub tick: u64,
    pub interrupt: CpuInterrupt,
}

impl CpuRequest {
    #[must_use]
    pub fn fetch_opcode(address: u16) -> Self {
        Self { kind: CpuRequestType::FetchOpcode, address, ..Default::default() }
    }

    #[must_use]
    pub fn fetch_operand(address: u16) -> Self {
        Self { kind: CpuRequestType::FetchOperand, address, ..Default::default() }
    }

    #[must_use]
    pub fn read(address: u16) -> Self {
        Self { kind: CpuRequestType::Read, address, ..Default::default() }
    }

    #[must_use]
    pub fn write(address: u16, value: u8) -> Self {
        Self { kind: CpuRequestType::Write, address, value, ..Default::default() }
    }
}

impl fmt::Debug for CpuRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} addr:0x{:04x} data:0x{:02x} tick:{} int:{:?}",
            self.kind, self.address, self.value, self.tick, self.interrupt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pages() {
        let t = PageTable::new();
        assert_eq!(t.page(0x0000), PageType::Ram);
        assert_eq!(t.page(0xFBFF), PageType::Ram);
        assert_eq!(t.page(0xFC00), PageType::Suzy);
        assert_eq!(t.page(0xFD91), PageType::Mikey);
        assert_eq!(t.page(0xFE00), PageType::BootRomLow);
        assert_eq!(t.page(0xFFF9), PageType::BootRomHigh);
    }

    #[test]
    fn remap_follows_disable_bits() {
        let mut t = PageTable::new();
        t.remap(MapCtl::from_bits_truncate(0x07));
        assert_eq!(t.page(0xFC00), PageType::Ram);
        assert_eq!(t.page(0xFD00), PageType::Ram);
        assert_eq!(t.page(0xFE00), PageType::Ram);
        assert_eq!(t.page(0xFF00), PageType::BootRomHigh);
        t.remap(MapCtl::empty());
        assert_eq!(t.page(0xFC00), PageType::Suzy);
        assert_eq!(t.page(0xFD00), PageType::Mikey);
        assert_eq!(t.page(0xFE00), PageType::BootRomLow);
    }

    #[test]
    fn mapctl_read_and_cycle() {
        let m = MapCtl::from_bits_truncate(0x8c);
        assert_eq!(m.read(), 0xfc);
        assert_eq!(m.fast_cycle_ticks(), 5);
        assert_eq!(MapCtl::empty().read(), 0xf0);
        assert_eq!(MapCtl::empty().fast_cycle_ticks(), 4);
    }
}
