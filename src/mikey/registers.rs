use bitflags::bitflags;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::consts::{GREEN0, GREENF};

bitflags! {
    #[derive(Copy, Clone, Debug, Serialize, Deserialize)]
    pub struct SerCtlW:u8
    {
        const tx_int_en = 0b1000_0000;
        const rx_int_en = 0b0100_0000;
        const zero      = 0b0010_0000;
        const par_en    = 0b0001_0000;
        const reset_err = 0b0000_1000;
        const tx_open   = 0b0000_0100;
        const tx_brk    = 0b0000_0010;
        const par_even  = 0b0000_0001;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Serialize, Deserialize)]
    pub struct SerCtlR:u8
    {
        const tx_rdy    = 0b1000_0000;
        const rx_rdy    = 0b0100_0000;
        const tx_empty  = 0b0010_0000;
        const par_err   = 0b0001_0000;
        const overrun   = 0b0000_1000;
        const frame_err = 0b0000_0100;
        const rx_brk    = 0b0000_0010;
        const par_bit   = 0b0000_0001;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
    pub struct DispCtl:u8
    {
        const color      = 0b0000_1000;
        const fourbit    = 0b0000_0100;
        const flip       = 0b0000_0010;
        const dma_enable = 0b0000_0001;
    }
}

pub const PALETTE_LEN: usize = 32;

/// Plain storage registers of Mikey: palette, audio mixer and display setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MikeyRegisters {
    palette: [u8; PALETTE_LEN],
    attenuation: [u8; 4],
    pan: u8,
    stereo: u8,
    dispctl: DispCtl,
    disp_adr: u16,
    pbkup: u8,
}

impl MikeyRegisters {
    #[must_use]
    pub fn new() -> Self {
        Self {
            palette: [0; PALETTE_LEN],
            attenuation: [0xff; 4],
            pan: 0xff,
            stereo: 0,
            dispctl: DispCtl::empty(),
            disp_adr: 0,
            pbkup: 0,
        }
    }

    /// Raw palette byte, `index` 0-15 are the green registers, 16-31 blue/red.
    #[must_use]
    pub fn palette(&self, index: usize) -> u8 {
        self.palette[index]
    }

    /// Stores a palette register, `addr` in GREEN0..=BLUEREDF. Returns the palette index.
    pub fn set_palette(&mut self, addr: u16, value: u8) -> usize {
        let index = usize::from(addr - GREEN0);
        self.palette[index] = match addr {
            // Behave as 4 bits registers.
            GREEN0..=GREENF => value & 0x0f,
            _ => value,
        };
        trace!("Palette #{index} = 0x{:02x}", self.palette[index]);
        index
    }

    #[must_use]
    pub fn palette_bytes(&self) -> &[u8; PALETTE_LEN] {
        &self.palette
    }

    #[inline]
    #[must_use]
    pub fn attenuation(&self, channel: usize) -> u8 {
        self.attenuation[channel]
    }

    pub fn set_attenuation(&mut self, channel: usize, value: u8) {
        self.attenuation[channel] = value;
    }

    #[inline]
    #[must_use]
    pub fn pan(&self) -> u8 {
        self.pan
    }

    pub fn set_pan(&mut self, value: u8) {
        self.pan = value;
    }

    #[inline]
    #[must_use]
    pub fn stereo(&self) -> u8 {
        self.stereo
    }

    pub fn set_stereo(&mut self, value: u8) {
        self.stereo = value;
    }

    #[must_use]
    pub fn dispctl(&self) -> DispCtl {
        self.dispctl
    }

    pub fn set_dispctl(&mut self, v: u8) {
        self.dispctl = DispCtl::from_bits_truncate(v);
    }

    #[must_use]
    pub fn disp_adr(&self) -> u16 {
        self.disp_adr
    }

    /// The low byte is forced to a 4 byte boundary.
    pub fn set_disp_adr_low(&mut self, v: u8) {
        self.disp_adr = ((self.disp_adr & 0xff00) | u16::from(v)) & 0xfffc;
    }

    pub fn set_disp_adr_high(&mut self, v: u8) {
        self.disp_adr = (self.disp_adr & 0x00ff) | (u16::from(v) << 8);
    }

    #[must_use]
    pub fn pbkup(&self) -> u8 {
        self.pbkup
    }

    pub fn set_pbkup(&mut self, v: u8) {
        self.pbkup = v;
    }
}

impl Default for MikeyRegisters {
    fn default() -> Self {
        Self::new()
    }
}

/// RGBA of a pen from the raw palette bytes, each 4 bit component spread over 8 bits.
#[inline]
#[must_use]
pub fn pen_rgba(palette: &[u8; PALETTE_LEN], pen: u8) -> [u8; 4] {
    let pen = usize::from(pen & 0x0f);
    let green = palette[pen] & 0x0f;
    let bluered = palette[pen + 16];
    let red = bluered & 0x0f;
    let blue = bluered >> 4;
    [(red << 4) | red, (green << 4) | green, (blue << 4) | blue, 0xff]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BLUERED0;

    #[test]
    fn green_is_four_bits() {
        let mut regs = MikeyRegisters::new();
        assert_eq!(regs.set_palette(GREEN0 + 3, 0xfa), 3);
        assert_eq!(regs.palette(3), 0x0a);
        assert_eq!(regs.set_palette(BLUERED0 + 3, 0x5c), 19);
        assert_eq!(regs.palette(19), 0x5c);
        assert_eq!(pen_rgba(regs.palette_bytes(), 3), [0xcc, 0xaa, 0x55, 0xff]);
    }

    #[test]
    fn disp_adr_alignment() {
        let mut regs = MikeyRegisters::new();
        regs.set_disp_adr_high(0xc0);
        regs.set_disp_adr_low(0x37);
        assert_eq!(regs.disp_adr(), 0xc034);
    }

    #[test]
    fn mixer_reset_values() {
        let regs = MikeyRegisters::new();
        assert_eq!(regs.attenuation(2), 0xff);
        assert_eq!(regs.pan(), 0xff);
        assert_eq!(regs.stereo(), 0);
    }
}
