use log::trace;
use serde::{Deserialize, Serialize};

use crate::consts::RAM_SIZE;

#[derive(Clone, Serialize, Deserialize)]
pub struct Ram {
    data: Vec<u8>,
}

impl Ram {
    #[must_use]
    pub fn new() -> Ram {
        Ram {
            data: vec![0xFF; RAM_SIZE],
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    #[inline]
    pub fn set(&mut self, addr: u16, data: u8) {
        self.data[addr as usize] = data;
    }

    pub fn fill(&mut self, v: u8) {
        self.data.fill(v);
    }

    /// Copies `buf` at `dest`. Returns false, copying nothing, when it would run past the end of RAM.
    pub fn copy(&mut self, dest: u16, buf: &[u8]) -> bool {
        let d = dest as usize;
        if d + buf.len() > RAM_SIZE {
            return false;
        }
        self.data[d..(d + buf.len())].copy_from_slice(buf);
        true
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Little endian 32 bit read.
    #[must_use]
    pub fn u32(&self, addr: u16) -> u32 {
        let mut v = 0u32;
        for i in (0..4u16).rev() {
            v = (v << 8) | u32::from(self.get(addr.wrapping_add(i)));
        }
        v
    }

    pub fn set_u32(&mut self, addr: u16, value: u32) {
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.set(addr.wrapping_add(i as u16), b);
        }
    }

    /// Little endian 64 bit read, as done by the display DMA.
    #[must_use]
    pub fn u64(&self, addr: u16) -> u64 {
        u64::from(self.u32(addr)) | (u64::from(self.u32(addr.wrapping_add(4))) << 32)
    }

    /// Collision buffer read-modify-write. `value` is broadcast to the four byte lanes
    /// and written through `mask`. Returns the highest nibble found under `mask`
    /// before the write.
    pub fn col_rmw(&mut self, addr: u16, value: u8, mask: u32) -> u8 {
        let old = self.u32(addr);
        let broadcast = u32::from_le_bytes([value; 4]);
        self.set_u32(addr, (old & !mask) | (broadcast & mask));

        let masked = old & mask;
        let collision = (0..8)
            .map(|nibble| ((masked >> (nibble * 4)) & 0x0f) as u8)
            .max()
            .unwrap_or(0);
        trace!(
            "COLRMW 0x{addr:04x} 0x{old:08x} mask:0x{mask:08x} value:0x{value:02x} -> {collision}"
        );
        collision
    }

    /// Video buffer read-modify-write: bits set in `mask` are kept, `value` is or'ed in.
    pub fn vid_rmw(&mut self, addr: u16, value: u8, mask: u8) {
        let v = (self.get(addr) & mask) | value;
        self.set(addr, v);
    }

    pub fn xor(&mut self, addr: u16, value: u8) {
        let v = self.get(addr) ^ value;
        self.set(addr, v);
    }
}

impl Default for Ram {
    fn default() -> Self {
        Ram::new()
    }
}
