use core::fmt;

use log::trace;
use serde::{Deserialize, Serialize};

use super::timer::TimerCore;
use super::CTRLA_MAGMODE_BIT;

/// Waveshape generator of one audio channel. The 12 bit shift register and
/// the feedback taps are split between these registers and the paired
/// timer's control bytes.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
pub struct AudioChannel {
    volume: u8,
    feedback: u8,
    shift_register: u8,
    output: i8,
}

impl AudioChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn volume(&self) -> u8 {
        self.volume
    }

    #[inline]
    #[must_use]
    pub fn feedback(&self) -> u8 {
        self.feedback
    }

    #[inline]
    #[must_use]
    pub fn output(&self) -> i8 {
        self.output
    }

    #[inline]
    #[must_use]
    pub fn shift_register(&self) -> u8 {
        self.shift_register
    }

    pub fn set_volume(&mut self, value: u8) {
        self.volume = value;
    }

    pub fn set_feedback(&mut self, value: u8) {
        self.feedback = value;
    }

    pub fn set_output(&mut self, value: u8) {
        self.output = value as i8;
    }

    pub fn set_shift_register(&mut self, value: u8) {
        self.shift_register = value;
    }

    // B7 of the timer's control A is feedback tap 7, B7-B6 of the feedback register are taps 11-10.
    fn feedback_taps(&self, timer: &TimerCore) -> u16 {
        let mut fb = u16::from(self.feedback) & 0b0011_1111;
        fb |= (u16::from(self.feedback) & 0b1100_0000) << 4;
        fb |= u16::from(timer.control_a() & 0b1000_0000);
        fb
    }

    // B7-B4 of the timer's control B are shift register bits 11-8.
    fn full_shift_register(&self, timer: &TimerCore) -> u16 {
        u16::from(self.shift_register) | ((u16::from(timer.control_b()) & 0b1111_0000) << 4)
    }

    /// Clocks the shift register once, called on every expiry of the paired timer.
    pub fn trigger(&mut self, timer: &mut TimerCore) {
        /* "
        The inversion of the output of the gate is used as the data input to the shift register. [...]
        This same inverted output is taken from the exclusive or gate and sent to the waveshape selector.
        " */
        let taps = self.feedback_taps(timer);
        let shift = self.full_shift_register(timer);
        let bit = ((taps & shift).count_ones() & 1) ^ 1;
        let shift = ((shift << 1) | bit as u16) & 0x0fff;

        self.shift_register = (shift & 0xff) as u8;
        timer.set_control_b_high((shift >> 8) as u8);

        let volume = self.volume as i8;
        let integrate = timer.control_a() & CTRLA_MAGMODE_BIT != 0;

        self.output = match (integrate, bit) {
            // "In integrate mode, shift reg 0 = 1: add volume register to output."
            (true, 1) => self.output.saturating_add(volume),
            // "In integrate mode, shift reg 0 = 0: subtract volume register from output."
            (true, _) => self.output.saturating_sub(volume),
            // "In normal mode, shift reg 0 = 1: contains value of volume register."
            (false, 1) => volume,
            // "In normal mode, shift reg 0 = 0: contains 2's complement of volume register."
            (false, _) => volume.wrapping_neg(),
        };

        trace!("Audio #{} output:{} {:?}.", timer.id(), self.output, self);
    }
}

impl fmt::Debug for AudioChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "volume:{}, feedback:0x{:02x}, shift_register:0x{:02x} output:{}",
            self.volume, self.feedback, self.shift_register, self.output
        )
    }
}
