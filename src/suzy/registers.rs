use crate::consts::{
    HSIZOFFL, JOYSTICK, MATHB, MATHD, MATHH, MATHM, MATHP, SCBADRL, SCBNEXTL, SPRCOLL, SPRCOLL_DONT_COLLIDE, SPRCOLL_NUMBER, SPRCTL0,
    SPRCTL0_BPP, SPRCTL0_SPR_TYPE, SPRCTL1, SPRCTL1_DRAW_QUAD, SPRCTL1_LITERAL,
    SPRCTL1_RELOAD_DEPTH, SPRDLINEL, SUZYHREV, SUZ_ADDR, SWITCHES, VSIZOFFL,
};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Copy, Clone, Debug, Serialize, Deserialize)]
    pub struct SprSysR:u8
    {
        const math_working   = 0b1000_0000;
        const math_warning   = 0b0100_0000;
        const math_carry     = 0b0010_0000;
        const v_stretching   = 0b0001_0000;
        const left_handed    = 0b0000_1000;
        const unsafe_acces   = 0b0000_0100;
        const sprite_to_stop = 0b0000_0010;
        const sprite_working = 0b0000_0001;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Serialize, Deserialize)]
    pub struct SprSysW:u8
    {
        const sign_math      = 0b1000_0000;
        const accumulate     = 0b0100_0000;
        const no_collide     = 0b0010_0000;
        const v_stretching   = 0b0001_0000;
        const left_handed    = 0b0000_1000;
        const clear_unsafe   = 0b0000_0100;
        const sprite_to_stop = 0b0000_0010;
        const no_effect      = 0b0000_0001;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Joystick:u8
    {
        const up       = 0b0100_0000;
        const down     = 0b1000_0000;
        const left     = 0b0001_0000;
        const right    = 0b0010_0000;
        const option_1 = 0b0000_1000;
        const option_2 = 0b0000_0100;
        const inside   = 0b0000_0010;
        const outside  = 0b0000_0001;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Switches:u8
    {
        const cart1_inactive = 0b0000_0100;
        const cart0_inactive = 0b0000_0010;
        const pause          = 0b0000_0001;
    }
}

#[must_use]
pub fn joystick_swap(mut j: Joystick, b1: Joystick, b2: Joystick) -> Joystick {
    let b1_set = j.contains(b1);
    j.set(b1, j.contains(b2));
    j.set(b2, b1_set);
    j
}

/// Sprite quadrant drawn first for each SPRCTL1 draw quadrant value.
const QUADRANT_ORDER: [u8; 4] = [0, 3, 1, 2];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuzyRegisters {
    data: Vec<u8>,
    sprsys_r: SprSysR,
    sprsys_w: SprSysW,
    sign_ab: i8,
    sign_cd: i8,
    tmp_cd: u16,
    tmp_sign_cd: i8,
}

impl SuzyRegisters {
    #[must_use]
    pub fn new() -> Self {
        let mut r = Self {
            data: vec![0; 0x100],
            sprsys_r: SprSysR::empty(),
            sprsys_w: SprSysW::empty(),
            sign_ab: 0,
            sign_cd: 0,
            tmp_cd: 0,
            tmp_sign_cd: 0,
        };
        r.set_data(SUZYHREV, 1); //SUZYHREV hardware version (always 1.0 for hardware)
        r.set_abcd(0xffff_ffff);
        r.set_efgh(0xffff_ffff);
        r.set_jklm(0xffff_ffff);
        r.set_np(0xffff);
        r.set_sign_ab(1);
        r.set_sign_cd(1);
        r.set_data(HSIZOFFL, 0x7f);
        r.set_data(VSIZOFFL, 0x7f);
        r.set_data(SWITCHES, 0b110);
        r
    }

    #[inline]
    #[must_use]
    pub fn data(&self, addr: u16) -> u8 {
        self.data[usize::from(addr.wrapping_sub(SUZ_ADDR) & 0xff)]
    }

    #[inline]
    pub fn set_data(&mut self, addr: u16, data: u8) {
        self.data[usize::from(addr.wrapping_sub(SUZ_ADDR) & 0xff)] = data;
    }

    #[inline]
    #[must_use]
    pub fn u16(&self, addr: u16) -> u16 {
        u16::from(self.data(addr)) | (u16::from(self.data(addr + 1)) << 8)
    }

    #[inline]
    #[must_use]
    pub fn i16(&self, addr: u16) -> i16 {
        self.u16(addr) as i16
    }

    #[inline]
    #[must_use]
    pub fn u32(&self, addr: u16) -> u32 {
        u32::from(self.data(addr))
            | (u32::from(self.data(addr + 1)) << 8)
            | (u32::from(self.data(addr + 2)) << 16)
            | (u32::from(self.data(addr + 3)) << 24)
    }

    #[inline]
    pub fn set_u16(&mut self, addr: u16, data: u16) {
        self.set_data(addr, (data & 0xff) as u8);
        self.set_data(addr + 1, ((data & 0xff00) >> 8) as u8);
    }

    #[inline]
    pub fn set_i16(&mut self, addr: u16, data: i16) {
        self.set_u16(addr, data as u16);
    }

    #[inline]
    pub fn set_u32(&mut self, addr: u16, data: u32) {
        self.set_data(addr, (data & 0xff) as u8);
        self.set_data(addr + 1, ((data & 0xff00) >> 8) as u8);
        self.set_data(addr + 2, ((data & 0x00ff_0000) >> 16) as u8);
        self.set_data(addr + 3, ((data & 0xff00_0000) >> 24) as u8);
    }

    /// Wrapping add to a 16 bit register pair.
    #[inline]
    pub fn add_u16(&mut self, addr: u16, v: u16) {
        let r = self.u16(addr).wrapping_add(v);
        self.set_u16(addr, r);
    }

    #[inline]
    #[must_use]
    pub fn efgh(&self) -> u32 {
        self.u32(MATHH)
    }

    #[inline]
    #[must_use]
    pub fn jklm(&self) -> u32 {
        self.u32(MATHM)
    }

    #[inline]
    #[must_use]
    pub fn abcd(&self) -> u32 {
        self.u32(MATHD)
    }

    #[inline]
    #[must_use]
    pub fn np(&self) -> u16 {
        self.u16(MATHP)
    }

    #[inline]
    #[must_use]
    pub fn ab(&self) -> u16 {
        self.u16(MATHB)
    }

    #[inline]
    #[must_use]
    pub fn cd(&self) -> u16 {
        self.u16(MATHD)
    }

    #[inline]
    pub fn set_ab(&mut self, v: u16) {
        self.set_u16(MATHB, v);
    }

    #[inline]
    pub fn set_cd(&mut self, v: u16) {
        self.set_u16(MATHD, v);
    }

    #[inline]
    pub fn set_abcd(&mut self, v: u32) {
        self.set_u32(MATHD, v);
    }

    #[inline]
    pub fn set_efgh(&mut self, v: u32) {
        self.set_u32(MATHH, v);
    }

    #[inline]
    pub fn set_jklm(&mut self, v: u32) {
        self.set_u32(MATHM, v);
    }

    #[inline]
    pub fn set_np(&mut self, v: u16) {
        self.set_u16(MATHP, v);
    }

    #[inline]
    #[must_use]
    pub fn sprsys(&self) -> u8 {
        self.sprsys_r.bits()
    }

    #[inline]
    pub fn set_joystick(&mut self, joy: Joystick) {
        self.set_data(JOYSTICK, joy.bits());
    }

    #[inline]
    pub fn set_switches(&mut self, sw: Switches) {
        self.set_data(SWITCHES, sw.bits());
    }

    #[inline]
    #[must_use]
    pub fn joystick(&self) -> Joystick {
        Joystick::from_bits_truncate(self.data(JOYSTICK))
    }

    #[inline]
    #[must_use]
    pub fn switches(&self) -> Switches {
        Switches::from_bits_truncate(self.data(SWITCHES))
    }

    pub fn set_sprsys(&mut self, v: u8) {
        self.sprsys_w = SprSysW::from_bits_truncate(v);
        self.sprsys_r.set(SprSysR::v_stretching, self.sprsys_w_is_flag_set(SprSysW::v_stretching));
        self.sprsys_r.set(SprSysR::left_handed, self.sprsys_w_is_flag_set(SprSysW::left_handed));
        self.sprsys_r.set(SprSysR::sprite_to_stop, self.sprsys_w_is_flag_set(SprSysW::sprite_to_stop));
        if self.sprsys_w_is_flag_set(SprSysW::clear_unsafe) {
            self.sprsys_r_disable_flag(SprSysR::unsafe_acces);
        }
    }

    #[inline]
    pub fn sprsys_r_enable_flag(&mut self, flag: SprSysR) {
        self.sprsys_r.set(flag, true);
    }

    #[inline]
    pub fn sprsys_r_disable_flag(&mut self, flag: SprSysR) {
        self.sprsys_r.set(flag, false);
    }

    #[inline]
    #[must_use]
    pub fn sprsys_r_is_flag_set(&self, flag: SprSysR) -> bool {
        self.sprsys_r.contains(flag)
    }

    #[inline]
    pub fn sprsys_w_enable_flag(&mut self, flag: SprSysW) {
        self.sprsys_w.set(flag, true);
    }

    #[inline]
    pub fn sprsys_w_disable_flag(&mut self, flag: SprSysW) {
        self.sprsys_w.set(flag, false);
    }

    #[inline]
    #[must_use]
    pub fn sprsys_w_is_flag_set(&self, flag: SprSysW) -> bool {
        self.sprsys_w.contains(flag)
    }

    #[inline]
    #[must_use]
    pub fn sprctl0(&self) -> u8 {
        self.data(SPRCTL0)
    }

    /// Bits per pen, 1 to 4.
    #[inline]
    #[must_use]
    pub fn bpp(&self) -> u8 {
        ((self.data(SPRCTL0) & SPRCTL0_BPP) >> 6) + 1
    }

    #[inline]
    #[must_use]
    pub fn sprite_type(&self) -> u8 {
        self.sprctl0() & SPRCTL0_SPR_TYPE
    }

    #[inline]
    #[must_use]
    pub fn sprctl1(&self) -> u8 {
        self.data(SPRCTL1)
    }

    #[inline]
    #[must_use]
    pub fn is_totally_literal(&self) -> bool {
        self.sprctl1() & SPRCTL1_LITERAL != 0
    }

    /// 0: nothing, 1: H/V size, 2: and stretch, 3: and tilt.
    #[inline]
    #[must_use]
    pub fn reload_depth(&self) -> u8 {
        (self.sprctl1() & SPRCTL1_RELOAD_DEPTH) >> 4
    }

    #[inline]
    #[must_use]
    pub fn start_quadrant(&self) -> u8 {
        QUADRANT_ORDER[usize::from(self.sprctl1() & SPRCTL1_DRAW_QUAD)]
    }

    #[inline]
    #[must_use]
    pub fn sprcoll(&self) -> u8 {
        self.data(SPRCOLL)
    }

    #[inline]
    #[must_use]
    pub fn collision_number(&self) -> u8 {
        self.sprcoll() & SPRCOLL_NUMBER
    }

    /// Neither the sprite nor the whole system opted out of collisions.
    #[inline]
    #[must_use]
    pub fn collides(&self) -> bool {
        self.sprcoll() & SPRCOLL_DONT_COLLIDE == 0 && !self.sprsys_w_is_flag_set(SprSysW::no_collide)
    }

    #[inline]
    #[must_use]
    pub fn scb_next(&self) -> u16 {
        self.u16(SCBNEXTL)
    }

    #[inline]
    #[must_use]
    pub fn sprdline(&self) -> u16 {
        self.u16(SPRDLINEL)
    }

    #[inline]
    pub fn set_scb_addr(&mut self, v: u16) {
        self.set_u16(SCBADRL, v);
    }

    #[inline]
    #[must_use]
    pub fn scb_addr(&self) -> u16 {
        self.u16(SCBADRL)
    }

    #[inline]
    #[must_use]
    pub fn sign_ab(&self) -> i8 {
        self.sign_ab
    }

    #[inline]
    pub fn set_sign_ab(&mut self, sign_ab: i8) {
        self.sign_ab = sign_ab;
    }

    #[inline]
    #[must_use]
    pub fn sign_cd(&self) -> i8 {
        self.sign_cd
    }

    #[inline]
    pub fn set_sign_cd(&mut self, sign_cd: i8) {
        self.sign_cd = sign_cd;
    }

    #[inline]
    #[must_use]
    pub fn tmp_cd(&self) -> u16 {
        self.tmp_cd
    }

    #[inline]
    pub fn backup_cd(&mut self) {
        self.tmp_cd = self.cd();
        self.tmp_sign_cd = self.sign_cd();
    }

    #[inline]
    #[must_use]
    pub fn tmp_sign_cd(&self) -> i8 {
        self.tmp_sign_cd
    }
}

impl Default for SuzyRegisters {
    fn default() -> Self {
        Self::new()
    }
}
