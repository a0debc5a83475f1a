pub mod comlynx_wire;

use comlynx_wire::{ComLynxWire, WireFrame};
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use super::registers::{SerCtlR, SerCtlW};

/// Timer 4 expiries per serial bit.
const TICKS_PER_BIT: u8 = 8;
/// Start bit, 8 data bits, parity bit, stop bit.
const BITS_PER_FRAME: u8 = 11;
const FRAME_LENGTH: u8 = TICKS_PER_BIT * BITS_PER_FRAME;

/// Serial port, clocked by the expiries of timer 4.
#[derive(Serialize, Deserialize)]
pub struct Uart {
    ctl_w: SerCtlW,
    ctl_r: SerCtlR,
    tx_holding: Option<u8>,
    tx_shift: Option<WireFrame>,
    tx_countdown: u8,
    rx_data: u8,
    wire: ComLynxWire,
}

impl Uart {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctl_w: SerCtlW::empty(),
            ctl_r: SerCtlR::tx_rdy | SerCtlR::tx_empty,
            tx_holding: None,
            tx_shift: None,
            tx_countdown: 0,
            rx_data: 0,
            wire: ComLynxWire::new(),
        }
    }

    pub fn set_wire(&mut self, wire: ComLynxWire) {
        self.wire = wire;
    }

    #[must_use]
    pub fn wire(&self) -> &ComLynxWire {
        &self.wire
    }

    #[must_use]
    pub fn has_peer(&self) -> bool {
        self.wire.peers() > 0
    }

    /// Level of interrupt bit 4.
    #[must_use]
    pub fn irq_level(&self) -> bool {
        (self.ctl_w.contains(SerCtlW::tx_int_en) && self.ctl_r.contains(SerCtlR::tx_rdy))
            || (self.ctl_w.contains(SerCtlW::rx_int_en) && self.ctl_r.contains(SerCtlR::rx_rdy))
    }

    #[must_use]
    pub fn serctl(&self) -> u8 {
        self.ctl_r.bits()
    }

    pub fn set_serctl(&mut self, v: u8) {
        self.ctl_w = SerCtlW::from_bits_truncate(v);
        if self.ctl_w.contains(SerCtlW::reset_err) {
            self.ctl_r
                .remove(SerCtlR::par_err | SerCtlR::frame_err | SerCtlR::overrun);
            self.ctl_w.remove(SerCtlW::reset_err);
        }
        if self.ctl_w.contains(SerCtlW::tx_brk) && self.tx_shift.is_none() {
            self.start_frame(WireFrame::Break);
        }
    }

    #[must_use]
    pub fn rx_data(&self) -> u8 {
        self.rx_data
    }

    /// Reading the receive register acknowledges it.
    pub fn serdat(&mut self) -> u8 {
        self.ctl_r.remove(SerCtlR::rx_rdy);
        self.rx_data
    }

    fn parity_bit(&self, v: u8) -> bool {
        if self.ctl_w.contains(SerCtlW::par_en) {
            let odd_ones = v.count_ones() & 1 == 1;
            odd_ones == self.ctl_w.contains(SerCtlW::par_even)
        } else {
            self.ctl_w.contains(SerCtlW::par_even)
        }
    }

    fn start_frame(&mut self, frame: WireFrame) {
        self.tx_shift = Some(frame);
        self.tx_countdown = FRAME_LENGTH;
        self.ctl_r.remove(SerCtlR::tx_empty);
    }

    pub fn set_serdat(&mut self, v: u8) {
        trace!("UART transmit 0x{v:02x}");
        if self.tx_shift.is_none() {
            let frame = WireFrame::Data(u16::from(v) | (u16::from(self.parity_bit(v)) << 8));
            self.start_frame(frame);
        } else {
            self.tx_holding = Some(v);
            self.ctl_r.remove(SerCtlR::tx_rdy);
        }
    }

    /// One timer 4 expiry.
    pub fn tick(&mut self) {
        self.tick_transmitter();
        if let Some(frame) = self.wire.receive() {
            self.receive(frame);
        }
    }

    fn tick_transmitter(&mut self) {
        let Some(frame) = self.tx_shift else {
            return;
        };
        self.tx_countdown -= 1;
        if self.tx_countdown > 0 {
            return;
        }
        self.wire.send(frame);
        self.tx_shift = None;
        if let Some(v) = self.tx_holding.take() {
            self.ctl_r.insert(SerCtlR::tx_rdy);
            self.set_serdat(v);
        } else if self.ctl_w.contains(SerCtlW::tx_brk) {
            self.start_frame(WireFrame::Break);
        } else {
            self.ctl_r.insert(SerCtlR::tx_empty);
        }
    }

    fn receive(&mut self, frame: WireFrame) {
        match frame {
            WireFrame::Data(d) => {
                let v = (d & 0xff) as u8;
                let par_bit = d & 0x100 != 0;
                trace!("UART receive 0x{v:02x}");
                if self.ctl_r.contains(SerCtlR::rx_rdy) {
                    warn!("UART overrun, 0x{:02x} lost.", self.rx_data);
                    self.ctl_r.insert(SerCtlR::overrun);
                }
                if self.ctl_w.contains(SerCtlW::par_en) && par_bit != self.parity_bit(v) {
                    self.ctl_r.insert(SerCtlR::par_err);
                }
                self.ctl_r.set(SerCtlR::par_bit, par_bit);
                self.ctl_r.remove(SerCtlR::rx_brk);
                self.ctl_r.insert(SerCtlR::rx_rdy);
                self.rx_data = v;
            }
            WireFrame::Break => {
                trace!("UART receive break");
                self.ctl_r.insert(SerCtlR::rx_brk);
            }
        }
    }
}

impl Default for Uart {
    fn default() -> Self {
        Uart::new()
    }
}
