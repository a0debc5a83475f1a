use std::sync::Arc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

const COUNTER_MASK: u16 = 0x7ff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartBank {
    Bank0,
    Bank1,
    /// Alternate bank 0 selected while AUDIN is high.
    Bank0A,
    Bank1A,
}

/// Byte source behind the cartridge port. Peripherals living on the
/// cartridge (game drive, EEPROM) plug in through the optional methods.
pub trait CartridgeImage {
    /// Byte addressed by the bank shift register and the ripple counter.
    fn bank_byte(&self, bank: CartBank, shift: u8, counter: u16) -> u8;

    fn has_bank(&self, bank: CartBank) -> bool {
        matches!(bank, CartBank::Bank0 | CartBank::Bank1)
    }

    /// Level driven on AUDIN by a cartridge peripheral, if any.
    fn audin(&self, _tick: u64) -> Option<bool> {
        None
    }

    fn write(&self, _bank: CartBank, _tick: u64, _value: u8) {}
}

/// Plain ROM cartridge, `page_size` bytes per shift register value.
pub struct FlatCartridgeImage {
    bank0: Vec<u8>,
    bank1: Vec<u8>,
    page_size: usize,
}

impl FlatCartridgeImage {
    #[must_use]
    pub fn new(bank0: Vec<u8>, bank1: Vec<u8>, page_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "Cart page size must be a power of two.");
        Self { bank0, bank1, page_size }
    }
}

impl CartridgeImage for FlatCartridgeImage {
    fn bank_byte(&self, bank: CartBank, shift: u8, counter: u16) -> u8 {
        let data = match bank {
            CartBank::Bank0 | CartBank::Bank0A => &self.bank0,
            CartBank::Bank1 | CartBank::Bank1A => &self.bank1,
        };
        let offset = usize::from(shift) * self.page_size + (usize::from(counter) & (self.page_size - 1));
        data.get(offset).copied().unwrap_or(0xff)
    }
}

/// Cartridge port state: bank shift register, ripple counter, strobe and AUDIN.
#[derive(Default, Serialize, Deserialize)]
pub struct Cartridge {
    #[serde(skip)]
    image: Option<Arc<dyn CartridgeImage>>,
    shift_register: u8,
    counter: u16,
    strobe: bool,
    address_data: bool,
    audin: bool,
}

impl Cartridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: Arc<dyn CartridgeImage>) {
        self.image = Some(image);
        self.reset();
    }

    /// Puts back the image of a restored save state, the port state is kept.
    pub fn reattach(&mut self, image: Option<Arc<dyn CartridgeImage>>) {
        self.image = image;
    }

    #[must_use]
    pub fn image(&self) -> Option<&Arc<dyn CartridgeImage>> {
        self.image.as_ref()
    }

    pub fn reset(&mut self) {
        self.shift_register = 0;
        self.counter = 0;
        self.strobe = false;
        self.address_data = false;
        self.audin = false;
    }

    pub fn set_address_data(&mut self, value: bool) {
        self.address_data = value;
    }

    /// A rising edge shifts the address data bit in, a high strobe holds the counter at 0.
    pub fn set_address_strobe(&mut self, value: bool) {
        if value {
            self.counter = 0;
        }
        if value && !self.strobe {
            let old = self.shift_register;
            self.shift_register = (old << 1) | u8::from(self.address_data);
            debug!("Cart shift register 0x{old:02x} <- {} = 0x{:02x}", u8::from(self.address_data), self.shift_register);
        }
        self.strobe = value;
    }

    pub fn set_audin(&mut self, value: bool) {
        self.audin = value;
    }

    #[must_use]
    pub fn audin(&self, tick: u64) -> bool {
        self.image
            .as_ref()
            .and_then(|i| i.audin(tick))
            .unwrap_or(self.audin)
    }

    fn bank(&self, bank: CartBank, alternate: CartBank) -> CartBank {
        match &self.image {
            Some(i) if self.audin && i.has_bank(alternate) => alternate,
            _ => bank,
        }
    }

    fn byte(&self, bank: CartBank) -> u8 {
        match &self.image {
            Some(i) => i.bank_byte(bank, self.shift_register, self.counter),
            None => 0xff,
        }
    }

    fn read(&mut self, bank: CartBank) -> u8 {
        let v = self.byte(bank);
        trace!("Cart {bank:?} read {:02x}:{:03x} = 0x{v:02x}", self.shift_register, self.counter);
        if !self.strobe {
            self.counter = (self.counter + 1) & COUNTER_MASK;
        }
        v
    }

    /// RCART0 read, advances the counter while the strobe is low.
    pub fn read_rcart0(&mut self) -> u8 {
        let bank = self.bank(CartBank::Bank0, CartBank::Bank0A);
        self.read(bank)
    }

    pub fn read_rcart1(&mut self) -> u8 {
        let bank = self.bank(CartBank::Bank1, CartBank::Bank1A);
        self.read(bank)
    }

    /// RCART0 without advancing the counter.
    #[must_use]
    pub fn peek_rcart0(&self) -> u8 {
        self.byte(self.bank(CartBank::Bank0, CartBank::Bank0A))
    }

    #[must_use]
    pub fn peek_rcart1(&self) -> u8 {
        self.byte(self.bank(CartBank::Bank1, CartBank::Bank1A))
    }

    fn write(&self, bank: CartBank, tick: u64, value: u8) {
        trace!("Cart {bank:?} write {:02x}:{:03x} = 0x{value:02x}", self.shift_register, self.counter);
        if let Some(i) = &self.image {
            i.write(bank, tick, value);
        }
    }

    /// Writes go to the image. A plain ROM ignores them.
    pub fn poke_rcart0(&mut self, tick: u64, value: u8) {
        self.write(CartBank::Bank0, tick, value);
    }

    pub fn poke_rcart1(&mut self, tick: u64, value: u8) {
        self.write(CartBank::Bank1, tick, value);
    }

    #[must_use]
    pub fn shift_register(&self) -> u8 {
        self.shift_register
    }

    #[must_use]
    pub fn counter(&self) -> u16 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn cart() -> Cartridge {
        let bank0: Vec<u8> = (0..4096u32)
            .map(|i| ((i / 512) as u8 * 0x10).wrapping_add((i % 512) as u8))
            .collect();
        let mut c = Cartridge::new();
        c.insert(Arc::new(FlatCartridgeImage::new(bank0, vec![], 512)));
        c
    }

    fn strobe_bit(c: &mut Cartridge, bit: bool) {
        c.set_address_data(bit);
        c.set_address_strobe(true);
        c.set_address_strobe(false);
    }

    #[test]
    fn shift_register_clocks_on_rising_edge() {
        let mut c = cart();
        strobe_bit(&mut c, true);
        strobe_bit(&mut c, false);
        strobe_bit(&mut c, true);
        assert_eq!(c.shift_register(), 0b101);
        c.set_address_data(true);
        c.set_address_strobe(true);
        c.set_address_strobe(true);
        assert_eq!(c.shift_register(), 0b1011);
    }

    #[test]
    fn counter_increments_only_with_strobe_low() {
        let mut c = cart();
        strobe_bit(&mut c, true);
        assert_eq!(c.read_rcart0(), 0x10);
        assert_eq!(c.read_rcart0(), 0x11);
        assert_eq!(c.counter(), 2);
        c.set_address_strobe(true);
        assert_eq!(c.counter(), 0);
        assert_eq!(c.read_rcart0(), 0x10);
        assert_eq!(c.counter(), 0);
    }

    #[test]
    fn peek_leaves_the_counter_alone() {
        let mut c = cart();
        assert_eq!(c.peek_rcart0(), 0x00);
        assert_eq!(c.peek_rcart0(), 0x00);
        assert_eq!(c.counter(), 0);
        assert_eq!(c.read_rcart0(), 0x00);
        assert_eq!(c.peek_rcart0(), 0x01);
        assert_eq!(c.counter(), 1);
    }

    #[derive(Default)]
    struct RecordingImage {
        writes: Mutex<Vec<(CartBank, u64, u8)>>,
    }

    impl CartridgeImage for RecordingImage {
        fn bank_byte(&self, _bank: CartBank, _shift: u8, _counter: u16) -> u8 {
            0
        }

        fn write(&self, bank: CartBank, tick: u64, value: u8) {
            self.writes.lock().push((bank, tick, value));
        }
    }

    #[test]
    fn writes_reach_the_image_on_both_banks() {
        let image = Arc::new(RecordingImage::default());
        let mut c = Cartridge::new();
        c.insert(image.clone());
        c.poke_rcart0(10, 0xa5);
        c.poke_rcart1(20, 0x5a);
        assert_eq!(*image.writes.lock(), vec![(CartBank::Bank0, 10, 0xa5), (CartBank::Bank1, 20, 0x5a)]);
        assert_eq!(c.counter(), 0);
    }

    #[test]
    fn empty_port_reads_ff() {
        let mut c = Cartridge::new();
        assert_eq!(c.read_rcart0(), 0xff);
        assert_eq!(c.read_rcart1(), 0xff);
    }
}
