pub mod math;
pub mod pen_unpacker;
pub mod registers;
pub mod request;
pub mod sprite_engine;

use log::{trace, warn};
use math::{divide, multiply, set_matha, set_mathc, set_mathe, set_mathm};
use registers::{joystick_swap, Joystick, SprSysR, SprSysW, Switches, SuzyRegisters};
use request::SuzyRequest;
use serde::{Deserialize, Serialize};
use sprite_engine::SpriteEngine;

use crate::cartridge::Cartridge;
use crate::consts::*;

/// Button states for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// A
    pub outer: bool,
    /// B
    pub inner: bool,
    pub option1: bool,
    pub option2: bool,
    pub pause: bool,
}

impl KeyInput {
    fn joystick(&self) -> Joystick {
        let mut j = Joystick::empty();
        j.set(Joystick::left, self.left);
        j.set(Joystick::right, self.right);
        j.set(Joystick::up, self.up);
        j.set(Joystick::down, self.down);
        j.set(Joystick::outside, self.outer);
        j.set(Joystick::inside, self.inner);
        j.set(Joystick::option_1, self.option1);
        j.set(Joystick::option_2, self.option2);
        j
    }
}

#[derive(Serialize, Deserialize)]
pub struct Suzy {
    registers: SuzyRegisters,
    engine: SpriteEngine,
}

impl Suzy {
    #[must_use]
    pub fn new() -> Self {
        let mut s = Self {
            registers: SuzyRegisters::new(),
            engine: SpriteEngine::new(),
        };
        s.registers.set_data(SUZYBUSEN, SUZYBUSEN_ENABLE);
        s
    }

    /// Latches the buttons into JOYSTICK and SWITCHES.
    pub fn set_keys(&mut self, keys: &KeyInput) {
        let mut j = keys.joystick();
        if !self.left_handed() {
            j = joystick_swap(j, Joystick::up, Joystick::down);
            j = joystick_swap(j, Joystick::left, Joystick::right);
        }
        trace!("Joystick: {:08b}", j.bits());
        self.registers.set_joystick(j);

        let mut sw = self.registers.switches();
        sw.set(Switches::pause, keys.pause);
        self.registers.set_switches(sw);
    }

    #[must_use]
    pub fn joystick(&self) -> Joystick {
        self.registers.joystick()
    }

    #[must_use]
    pub fn switches(&self) -> Switches {
        self.registers.switches()
    }

    /// Tick at which a CPU access started at `tick` completes.
    #[must_use]
    pub fn request_access(&self, tick: u64, addr: u16, is_write: bool) -> u64 {
        let cost = match addr {
            RCART0 | RCART1 => CART_READ_TICKS,
            _ if is_write => SUZY_WRITE_TICKS,
            _ => SUZY_READ_TICKS,
        };
        trace!("Suzy access 0x{addr:04x} @ {tick} -> {}", tick + cost);
        tick + cost
    }

    pub fn read(&mut self, addr: u16, cart: &mut Cartridge) -> u8 {
        let v = match addr {
            RCART0 => cart.read_rcart0(),
            RCART1 => cart.read_rcart1(),
            SPRSYS => self.registers.sprsys(),
            TMPADRL..=SWITCHES => self.registers.data(addr),
            _ => {
                trace!("Suzy read from unmapped 0x{addr:04x}");
                0xff
            }
        };
        trace!("Suzy peek 0x{addr:04x} = 0x{v:02x}");
        v
    }

    /// Register value as the CPU would read it, the cart counter does not move.
    #[must_use]
    pub fn peek(&self, addr: u16, cart: &Cartridge) -> u8 {
        match addr {
            RCART0 => cart.peek_rcart0(),
            RCART1 => cart.peek_rcart1(),
            SPRSYS => self.registers.sprsys(),
            TMPADRL..=SWITCHES => self.registers.data(addr),
            _ => 0xff,
        }
    }

    pub fn write(&mut self, tick: u64, addr: u16, v: u8, cart: &mut Cartridge) {
        trace!("Suzy poke 0x{addr:04x} = 0x{v:02x}");
        match addr {
            RCART0 => cart.poke_rcart0(tick, v),
            RCART1 => cart.poke_rcart1(tick, v),
            MATHA => {
                set_matha(&mut self.registers, v);
                multiply(&mut self.registers);
            }
            MATHC => set_mathc(&mut self.registers, v),
            MATHE => {
                set_mathe(&mut self.registers, v);
                divide(&mut self.registers);
            }
            MATHM => set_mathm(&mut self.registers, v),
            // "Any CPU write to an LSB will set the MSB to 0."
            TMPADRL | TILTACUML | HOFFL | VOFFL | VIDBASL | COLLBASL | VIDADRL | COLLADRL
            | SCBNEXTL | SPRDLINEL | HPOSSTRTL | VPOSSTRTL | SPRHSIZL | SPRVSIZL | STRETCHL
            | TILTL | SPRDOFFL | SPRVPOSL | COLLOFFL | VSIZACUML | HSIZOFFL | VSIZOFFL | SCBADRL
            | PROCADRL | MATHB | MATHD | MATHF | MATHH | MATHK | MATHP => {
                self.registers.set_u16(addr, u16::from(v));
            }
            SPRSYS => self.registers.set_sprsys(v),
            SUZYHREV | JOYSTICK | SWITCHES => {
                warn!("Write to read only Suzy register 0x{addr:04x} ignored.");
            }
            TMPADRL..=SWITCHES => self.registers.set_data(addr, v),
            _ => trace!("Suzy write to 0x{addr:04x} ignored"),
        }
    }

    /// Starts the sprite engine, returns its first request.
    pub fn start_sprites(&mut self) -> SuzyRequest {
        trace!("[SPRGO] = 0x{:02x}", self.registers.data(SPRGO));
        self.registers.sprsys_w_disable_flag(SprSysW::sprite_to_stop);
        self.engine.start(&mut self.registers)
    }

    /// Resumes the sprite engine with the result of its last request.
    pub fn resume(&mut self, response: u32) -> SuzyRequest {
        self.engine.advance(&mut self.registers, response)
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    #[must_use]
    pub fn is_sprite_working(&self) -> bool {
        self.registers.sprsys_r_is_flag_set(SprSysR::sprite_working)
    }

    #[must_use]
    pub fn registers(&self) -> &SuzyRegisters {
        &self.registers
    }

    #[must_use]
    pub fn left_handed(&self) -> bool {
        self.registers.sprsys_w_is_flag_set(SprSysW::left_handed)
    }
}

impl Default for Suzy {
    fn default() -> Self {
        Suzy::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(suzy: &mut Suzy, addr: u16, v: u8) {
        let mut cart = Cartridge::new();
        suzy.write(0, addr, v, &mut cart);
    }

    fn read(suzy: &mut Suzy, addr: u16) -> u8 {
        let mut cart = Cartridge::new();
        suzy.read(addr, &mut cart)
    }

    #[test]
    fn lsb_write_clears_msb() {
        let mut suzy = Suzy::new();
        write(&mut suzy, VIDBASL + 1, 0x12);
        write(&mut suzy, VIDBASL, 0x34);
        assert_eq!(suzy.registers().u16(VIDBASL), 0x0034);
        write(&mut suzy, VIDBASL + 1, 0x12);
        assert_eq!(suzy.registers().u16(VIDBASL), 0x1234);
        assert_eq!(read(&mut suzy, VIDBASL + 1), 0x12);
    }

    #[test]
    fn multiply_on_matha() {
        let mut suzy = Suzy::new();
        // CD = 300, AB = 200
        write(&mut suzy, MATHD, 0x2c);
        write(&mut suzy, MATHC, 0x01);
        write(&mut suzy, MATHB, 0xc8);
        assert_eq!(suzy.registers().efgh(), 0xffff_ffff);
        write(&mut suzy, MATHA, 0x00);
        assert_eq!(suzy.registers().efgh(), 60_000);
        assert_eq!(read(&mut suzy, SPRSYS) & SprSysR::math_working.bits(), 0);
    }

    #[test]
    fn divide_on_mathe() {
        let mut suzy = Suzy::new();
        // NP = 7
        write(&mut suzy, MATHP, 7);
        write(&mut suzy, MATHN, 0);
        // EFGH = 100
        write(&mut suzy, MATHH, 100);
        write(&mut suzy, MATHG, 0);
        write(&mut suzy, MATHF, 0);
        write(&mut suzy, MATHE, 0);
        assert_eq!(suzy.registers().abcd(), 14);
        assert_eq!(suzy.registers().jklm(), 2);
    }

    #[test]
    fn unmapped_reads_ff() {
        let mut suzy = Suzy::new();
        assert_eq!(read(&mut suzy, 0xfcc0), 0xff);
        assert_eq!(read(&mut suzy, SUZYHREV), 0x01);
    }

    #[test]
    fn read_only_registers_ignore_writes() {
        let mut suzy = Suzy::new();
        write(&mut suzy, SUZYHREV, 0x55);
        write(&mut suzy, JOYSTICK, 0x55);
        assert_eq!(read(&mut suzy, SUZYHREV), 0x01);
        assert_eq!(read(&mut suzy, JOYSTICK), 0x00);
    }

    #[test]
    fn access_costs() {
        let suzy = Suzy::new();
        assert_eq!(suzy.request_access(100, SPRGO, true), 100 + SUZY_WRITE_TICKS);
        assert_eq!(suzy.request_access(100, SPRSYS, false), 100 + SUZY_READ_TICKS);
        assert_eq!(suzy.request_access(100, RCART0, false), 100 + CART_READ_TICKS);
    }

    #[test]
    fn keys_follow_handedness() {
        let mut suzy = Suzy::new();
        let keys = KeyInput { up: true, left: true, outer: true, pause: true, ..Default::default() };
        suzy.set_keys(&keys);
        assert_eq!(suzy.joystick(), Joystick::down | Joystick::right | Joystick::outside);
        assert!(suzy.switches().contains(Switches::pause));
        assert!(suzy.switches().contains(Switches::cart0_inactive));

        write(&mut suzy, SPRSYS, SprSysW::left_handed.bits());
        suzy.set_keys(&KeyInput { up: true, left: true, ..Default::default() });
        assert_eq!(suzy.joystick(), Joystick::up | Joystick::left);
        assert!(!suzy.switches().contains(Switches::pause));
    }

    #[test]
    fn rcart_reads_go_through_the_cartridge() {
        let mut suzy = Suzy::new();
        let mut cart = Cartridge::new();
        assert_eq!(suzy.read(RCART0, &mut cart), 0xff);
        assert_eq!(suzy.read(RCART1, &mut cart), 0xff);
        assert_eq!(cart.counter(), 2);
    }

    #[test]
    fn sprgo_without_bus_enable_yields_none() {
        let mut suzy = Suzy::new();
        write(&mut suzy, SUZYBUSEN, 0);
        write(&mut suzy, SPRGO, SPRGO_GO);
        assert!(suzy.start_sprites().is_none());
        assert!(!suzy.is_busy());
    }
}
