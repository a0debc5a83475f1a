use std::collections::VecDeque;
use std::fmt;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::pen_unpacker::{PenStatus, PenUnpacker};
use super::registers::{SprSysR, SprSysW, SuzyRegisters};
use super::request::SuzyRequest;
use crate::consts::{
    COLLADRL, COLLBASL, COLLOFFL, HOFFL, HPOSSTRTL, HSIZOFFL, SPRCTL0, SPRCTL0_HFLIP,
    SPRCTL0_VFLIP, SPRCTL1, SPRCTL1_REUSE_PALETTE, SPRCTL1_SKIP_SPRITE, SPRCOLL, SPRDLINEL,
    SPRDOFFL, SPRGO, SPRGO_EVERON, SPRGO_GO, SPRHSIZL, SPRVSIZL, STRETCHL, SCBNEXTL, SUZYBUSEN,
    SUZYBUSEN_ENABLE, TILTACUMH, TILTACUML, TILTL, TMPADRH, TMPADRL, VIDADRL, VIDBASL, VOFFL,
    VPOSSTRTL, VSIZACUMH, VSIZACUML, VSIZOFFL,
};
use crate::mikey::video::{LYNX_SCREEN_HEIGHT, LYNX_SCREEN_WIDTH};

// SCB layout
const R_SPRCTL0: usize = 0;
const R_SPRCTL1: usize = 1;
const R_SPRCOLL: usize = 2;
const R_SCBNEXTL: usize = 3;
const R_SPRDATAL: usize = 5;
const R_HPOSL: usize = 7;
const R_VPOSL: usize = 9;
const R_HSIZEL: usize = 11;
const R_VSIZEL: usize = 13;
const R_STRETCHL: usize = 15;
const R_TILTL: usize = 17;
const SCB_LEN: usize = 19;

/// Bytes up to SCBNEXT, enough to know if the sprite is skipped.
const SCB_LINK_LEN: usize = R_SPRDATAL;
/// Bytes always loaded.
const SCB_HEADER_LEN: usize = R_HSIZEL;
/// Extra SCB bytes for each reload depth.
const RELOAD_LEN: [usize; 4] = [0, 4, 6, 8];

const SCREEN_WIDTH: i16 = LYNX_SCREEN_WIDTH as i16;
const SCREEN_HEIGHT: i16 = LYNX_SCREEN_HEIGHT as i16;
const SCREEN_LINE_BYTES: u16 = (LYNX_SCREEN_WIDTH / 2) as u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Step {
    Idle,
    NextScb,
    /// Waiting for SCB byte n.
    LoadScb(u8),
    /// Waiting for palette word n.
    LoadPalette(u8),
    StartSprite,
    StartQuadrant,
    LineStart,
    LineHeader,
    PixelRowStart,
    PixelRowHeader,
    Pixels,
    PixelFeed,
    PixelRowEnd,
    LineEnd,
    QuadrantEnd,
    SpriteEnd,
    /// Waiting for the collision depository byte.
    EverOn,
    SpriteNext,
    Done,
}

/// Pixels of one video byte waiting to be written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct VideoWrite {
    address: u16,
    value: u8,
    mask: u8,
    xor: bool,
}

/// Pixels of one aligned collision buffer word waiting to be written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CollisionWrite {
    address: u16,
    value: u8,
    mask: u32,
}

/// Sprite engine walking the SCB chain. Every memory access is handed out
/// as a [`SuzyRequest`] and the engine is resumed with its result.
#[derive(Clone, Serialize, Deserialize)]
pub struct SpriteEngine {
    step: Step,
    outbox: VecDeque<SuzyRequest>,
    last: SuzyRequest,
    response: u32,
    scb: [u8; SCB_LEN],
    scb_len: usize,
    pen_map: [u8; 16],
    unpacker: PenUnpacker,
    proc_addr: u16,
    start_quadrant: u8,
    quadrant: u8,
    ever_on_screen: bool,
    hquadoff: i16,
    vquadoff: i16,
    screen_h_start: i16,
    screen_v_start: i16,
    voff: i16,
    hoff: i16,
    vsign: i16,
    hsign: i16,
    pixel_height: u8,
    orig_pixel_height: u8,
    pen: u8,
    pixel_width: u8,
    onscreen: bool,
    collision: u8,
    video: Option<VideoWrite>,
    collision_write: Option<CollisionWrite>,
}

impl SpriteEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: Step::Idle,
            outbox: VecDeque::new(),
            last: SuzyRequest::None,
            response: 0,
            scb: [0; SCB_LEN],
            scb_len: SCB_HEADER_LEN,
            pen_map: core::array::from_fn(|i| i as u8),
            unpacker: PenUnpacker::new(),
            proc_addr: 0,
            start_quadrant: 0,
            quadrant: 0,
            ever_on_screen: false,
            hquadoff: 0,
            vquadoff: 0,
            screen_h_start: 0,
            screen_v_start: 0,
            voff: 0,
            hoff: 0,
            vsign: 1,
            hsign: 1,
            pixel_height: 0,
            orig_pixel_height: 0,
            pen: 0,
            pixel_width: 0,
            onscreen: false,
            collision: 0,
            video: None,
            collision_write: None,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.step != Step::Idle
    }

    /// Starts a sprite pass, returns its first request. Nothing happens
    /// unless SPRGO and SUZYBUSEN are both set.
    pub fn start(&mut self, regs: &mut SuzyRegisters) -> SuzyRequest {
        if regs.data(SPRGO) & SPRGO_GO == 0 || regs.data(SUZYBUSEN) & SUZYBUSEN_ENABLE == 0 {
            trace!("Sprite engine not started, SPRGO:0x{:02x} SUZYBUSEN:0x{:02x}", regs.data(SPRGO), regs.data(SUZYBUSEN));
            return SuzyRequest::None;
        }
        trace!("Starting sprite rendering. Renders to 0x{:04X}", regs.u16(VIDBASL));
        regs.sprsys_r_enable_flag(SprSysR::sprite_working);
        self.outbox.clear();
        self.video = None;
        self.collision_write = None;
        self.last = SuzyRequest::None;
        self.step = Step::NextScb;
        self.advance(regs, 0)
    }

    /// Resumes with the result of the previous request (the byte read, the
    /// little endian word read, or the collision number), returns the next one.
    pub fn advance(&mut self, regs: &mut SuzyRegisters, response: u32) -> SuzyRequest {
        self.response = response;
        if matches!(self.last, SuzyRequest::ColRmw { .. }) && Self::has_depository(regs) {
            self.collision = self.collision.max(response as u8);
        }

        loop {
            if let Some(req) = self.outbox.pop_front() {
                self.last = req;
                return req;
            }
            match self.step {
                Step::Idle => {
                    self.last = SuzyRequest::None;
                    return SuzyRequest::None;
                }
                Step::NextScb => self.next_scb(regs),
                Step::LoadScb(n) => self.load_scb(regs, usize::from(n)),
                Step::LoadPalette(n) => self.load_palette(regs, usize::from(n)),
                Step::StartSprite => self.start_sprite(regs),
                Step::StartQuadrant => self.start_quadrant(regs),
                Step::LineStart => {
                    self.request(SuzyRequest::Read4 { address: regs.sprdline() });
                    self.step = Step::LineHeader;
                }
                Step::LineHeader => self.line_header(regs),
                Step::PixelRowStart => self.pixel_row_start(regs),
                Step::PixelRowHeader => {
                    self.unpacker.start_line(regs.bpp(), regs.is_totally_literal(), self.response);
                    self.pixel_width = 0;
                    self.step = Step::Pixels;
                }
                Step::Pixels => self.pixels(regs),
                Step::PixelFeed => {
                    self.unpacker.feed_data(self.response);
                    self.step = Step::Pixels;
                }
                Step::PixelRowEnd => self.pixel_row_end(regs),
                Step::LineEnd => self.line_end(regs),
                Step::QuadrantEnd => self.quadrant_end(),
                Step::SpriteEnd => self.sprite_end(regs),
                Step::EverOn => {
                    let mut coldat = self.response as u8;
                    if self.ever_on_screen {
                        coldat &= 0x7f;
                    } else {
                        coldat |= 0x80;
                    }
                    self.request(SuzyRequest::Write { address: Self::depository(regs), value: coldat });
                    self.step = Step::SpriteNext;
                }
                Step::SpriteNext => {
                    self.step = if regs.sprsys_w_is_flag_set(SprSysW::sprite_to_stop) {
                        Step::Done
                    } else {
                        Step::NextScb
                    };
                }
                Step::Done => {
                    trace!("Sprite rendering done.");
                    regs.sprsys_r_disable_flag(SprSysR::sprite_working);
                    regs.set_data(SPRGO, regs.data(SPRGO) & !SPRGO_GO);
                    self.step = Step::Idle;
                }
            }
        }
    }

    fn request(&mut self, req: SuzyRequest) {
        self.outbox.push_back(req);
    }

    fn next_scb(&mut self, regs: &mut SuzyRegisters) {
        let next = regs.scb_next();
        regs.set_scb_addr(next);
        if next & 0xff00 == 0 {
            self.step = Step::Done;
            return;
        }
        self.request(SuzyRequest::Read { address: next });
        self.step = Step::LoadScb(0);
    }

    fn scb_u16(&self, offset: usize) -> u16 {
        u16::from(self.scb[offset]) | (u16::from(self.scb[offset + 1]) << 8)
    }

    fn copy_scb(&self, regs: &mut SuzyRegisters, offset: usize, reg: u16) {
        regs.set_u16(reg, self.scb_u16(offset));
    }

    fn load_scb(&mut self, regs: &mut SuzyRegisters, n: usize) {
        self.scb[n] = self.response as u8;
        let loaded = n + 1;

        if loaded == SCB_LINK_LEN {
            regs.set_data(SPRCTL0, self.scb[R_SPRCTL0]);
            regs.set_data(SPRCTL1, self.scb[R_SPRCTL1]);
            regs.set_data(SPRCOLL, self.scb[R_SPRCOLL]);
            self.copy_scb(regs, R_SCBNEXTL, SCBNEXTL);
            if regs.sprctl1() & SPRCTL1_SKIP_SPRITE != 0 {
                trace!("Sprite 0x{:04x} skipped.", regs.scb_addr());
                self.step = Step::NextScb;
                return;
            }
            self.scb_len = SCB_HEADER_LEN + RELOAD_LEN[usize::from(regs.reload_depth())];
        }

        if loaded < self.scb_len {
            self.request(SuzyRequest::Read { address: regs.scb_addr().wrapping_add(loaded as u16) });
            self.step = Step::LoadScb(loaded as u8);
            return;
        }

        self.copy_scb(regs, R_SPRDATAL, SPRDLINEL);
        self.copy_scb(regs, R_HPOSL, HPOSSTRTL);
        self.copy_scb(regs, R_VPOSL, VPOSSTRTL);
        let depth = regs.reload_depth();
        if depth >= 1 {
            self.copy_scb(regs, R_HSIZEL, SPRHSIZL);
            self.copy_scb(regs, R_VSIZEL, SPRVSIZL);
        }
        if depth >= 2 {
            self.copy_scb(regs, R_STRETCHL, STRETCHL);
        }
        if depth >= 3 {
            self.copy_scb(regs, R_TILTL, TILTL);
        }
        debug!("Sprite SCB 0x{:04x}: {:?}", regs.scb_addr(), self);

        if regs.sprctl1() & SPRCTL1_REUSE_PALETTE != 0 {
            self.step = Step::StartSprite;
        } else {
            self.request(SuzyRequest::Read4 { address: self.palette_addr(regs, 0) });
            self.step = Step::LoadPalette(0);
        }
    }

    fn palette_addr(&self, regs: &SuzyRegisters, word: usize) -> u16 {
        regs.scb_addr().wrapping_add((self.scb_len + word * 4) as u16)
    }

    fn load_palette(&mut self, regs: &SuzyRegisters, n: usize) {
        for (i, b) in self.response.to_le_bytes().into_iter().enumerate() {
            let pen = (n * 4 + i) * 2;
            self.pen_map[pen] = b >> 4;
            self.pen_map[pen + 1] = b & 0x0f;
        }
        if n == 0 {
            self.request(SuzyRequest::Read4 { address: self.palette_addr(regs, 1) });
            self.step = Step::LoadPalette(1);
        } else {
            self.step = Step::StartSprite;
        }
    }

    fn start_sprite(&mut self, regs: &mut SuzyRegisters) {
        self.ever_on_screen = false;
        self.collision = 0;
        self.start_quadrant = regs.start_quadrant();
        self.quadrant = self.start_quadrant;
        regs.set_u16(TMPADRL, 0);
        self.screen_h_start = regs.i16(HOFFL);
        self.screen_v_start = regs.i16(VOFFL);
        self.hoff = self.screen_h_start;
        self.voff = self.screen_v_start;
        self.step = Step::StartQuadrant;
    }

    fn start_quadrant(&mut self, regs: &mut SuzyRegisters) {
        trace!("Quadrant {}", self.quadrant);
        self.hsign = if self.quadrant == 0 || self.quadrant == 1 { 1 } else { -1 };
        self.vsign = if self.quadrant == 0 || self.quadrant == 3 { 1 } else { -1 };

        if regs.sprctl0() & SPRCTL0_VFLIP != 0 {
            self.vsign = -self.vsign;
        }
        if regs.sprctl0() & SPRCTL0_HFLIP != 0 {
            self.hsign = -self.hsign;
        }

        self.voff = regs.i16(VPOSSTRTL).wrapping_sub(self.screen_v_start);

        regs.set_u16(TILTACUML, 0);
        if self.vsign == 1 {
            regs.set_u16(VSIZACUML, regs.u16(VSIZOFFL));
        } else {
            regs.set_u16(VSIZACUML, 0);
        }

        if self.quadrant == self.start_quadrant {
            self.vquadoff = self.vsign;
        }
        if self.vsign != self.vquadoff {
            self.voff += self.vsign;
        }

        self.pixel_height = 0;
        self.step = Step::LineStart;
    }

    fn line_header(&mut self, regs: &mut SuzyRegisters) {
        let sprdoff = self.unpacker.start_line(regs.bpp(), regs.is_totally_literal(), self.response);
        regs.set_u16(SPRDOFFL, u16::from(sprdoff));

        regs.add_u16(VSIZACUML, regs.u16(SPRVSIZL));
        self.orig_pixel_height = regs.data(VSIZACUMH);
        self.pixel_height = 0;
        regs.set_data(VSIZACUMH, 0);

        self.step = match sprdoff {
            0 => Step::SpriteEnd,
            1 => {
                regs.add_u16(SPRDLINEL, 1);
                Step::QuadrantEnd
            }
            _ => Step::PixelRowStart,
        };
    }

    fn pixel_row_start(&mut self, regs: &mut SuzyRegisters) {
        if (self.vsign > 0 && self.voff >= SCREEN_HEIGHT)
            || (self.vsign < 0 && self.voff < 0)
            || self.orig_pixel_height == 0
        {
            self.step = Step::LineEnd;
            return;
        }
        if self.voff < 0 || self.voff >= SCREEN_HEIGHT {
            self.step = Step::PixelRowEnd;
            return;
        }

        let line_offset = (self.voff as u16).wrapping_mul(SCREEN_LINE_BYTES);
        regs.set_u16(VIDADRL, regs.u16(VIDBASL).wrapping_add(line_offset));
        regs.set_u16(COLLADRL, regs.u16(COLLBASL).wrapping_add(line_offset));

        self.onscreen = false;

        let hposstrt = regs.i16(HPOSSTRTL).wrapping_add(regs.i16(TILTACUML) >> 8);
        regs.set_i16(HPOSSTRTL, hposstrt);
        regs.set_data(TILTACUMH, 0);

        self.hoff = hposstrt.wrapping_sub(self.screen_h_start);

        let tmp = if self.hsign > 0 { regs.u16(HSIZOFFL) } else { 0 };
        regs.set_u16(TMPADRL, tmp);

        if self.quadrant == self.start_quadrant {
            self.hquadoff = self.hsign;
        }
        if self.hsign != self.hquadoff {
            self.hoff = self.hoff.wrapping_add(self.hsign);
        }

        let line = regs.sprdline();
        self.request(SuzyRequest::Read4 { address: line });
        self.proc_addr = line.wrapping_add(4);
        self.step = Step::PixelRowHeader;
    }

    fn pixels(&mut self, regs: &mut SuzyRegisters) {
        if self.pixel_width > 0 {
            self.pixel_width -= 1;
            if self.hoff >= 0 && self.hoff < SCREEN_WIDTH {
                self.onscreen = true;
                self.ever_on_screen = true;
                self.process_pixel(regs);
            } else if self.onscreen {
                // left the screen, the rest of the line is invisible
                self.pixel_width = 0;
                self.flush();
                self.step = Step::PixelRowEnd;
                return;
            }
            self.hoff = self.hoff.wrapping_add(self.hsign);
            return;
        }

        match self.unpacker.next_pen() {
            PenStatus::Pen(p) => {
                self.pen = self.pen_map[usize::from(p & 0x0f)];
                regs.add_u16(TMPADRL, regs.u16(SPRHSIZL));
                self.pixel_width = regs.data(TMPADRH);
                regs.set_data(TMPADRH, 0);
            }
            PenStatus::DataNeeded => {
                self.request(SuzyRequest::Read4 { address: self.proc_addr });
                self.proc_addr = self.proc_addr.wrapping_add(4);
                self.step = Step::PixelFeed;
            }
            PenStatus::NextLine | PenStatus::NextQuadrant | PenStatus::NextSprite => {
                self.flush();
                self.step = Step::PixelRowEnd;
            }
        }
    }

    fn pixel_row_end(&mut self, regs: &mut SuzyRegisters) {
        self.voff += self.vsign;

        let depth = regs.reload_depth();
        if depth >= 2 {
            regs.add_u16(SPRHSIZL, regs.u16(STRETCHL));
        }
        if depth >= 3 {
            regs.add_u16(TILTACUML, regs.u16(TILTL));
        }

        self.pixel_height = self.pixel_height.wrapping_add(1);
        self.step = if self.pixel_height == self.orig_pixel_height {
            Step::LineEnd
        } else {
            Step::PixelRowStart
        };
    }

    fn line_end(&mut self, regs: &mut SuzyRegisters) {
        regs.add_u16(SPRDLINEL, regs.u16(SPRDOFFL));

        /* "
        The vertical size of a sprite can be modified every time a scan line is processed.
        This allows for 'stretching' a sprite vertically. The vertical stretch factor is the same as the horizontal stretch factor.
        " */
        if regs.sprsys_r_is_flag_set(SprSysR::v_stretching) {
            let size = regs.i16(SPRVSIZL);
            let stretch = regs.i16(STRETCHL);
            regs.set_i16(SPRVSIZL, size.wrapping_add(stretch.wrapping_mul(i16::from(self.pixel_height))));
        }

        self.step = Step::LineStart;
    }

    fn quadrant_end(&mut self) {
        self.quadrant = (self.quadrant + 1) & 0x03;
        self.step = if self.quadrant == self.start_quadrant {
            Step::SpriteEnd
        } else {
            Step::StartQuadrant
        };
    }

    /// Sprite types keeping a collision depository.
    fn has_depository(regs: &SuzyRegisters) -> bool {
        regs.collides() && matches!(regs.sprite_type(), 2 | 3 | 4 | 6 | 7)
    }

    fn depository(regs: &SuzyRegisters) -> u16 {
        regs.scb_addr().wrapping_add(regs.u16(COLLOFFL))
    }

    fn sprite_end(&mut self, regs: &mut SuzyRegisters) {
        self.flush();
        if Self::has_depository(regs) {
            trace!("Collision depository 0x{:04X}=0x{:02X}", Self::depository(regs), self.collision);
            self.request(SuzyRequest::Write { address: Self::depository(regs), value: self.collision });
        }
        if regs.data(SPRGO) & SPRGO_EVERON != 0 {
            self.request(SuzyRequest::Read { address: Self::depository(regs) });
            self.step = Step::EverOn;
        } else {
            self.step = Step::SpriteNext;
        }
    }

    fn flush_video(&mut self) {
        if let Some(w) = self.video.take() {
            self.request(if w.xor {
                SuzyRequest::Xor { address: w.address, value: w.value }
            } else {
                SuzyRequest::VidRmw { address: w.address, value: w.value, mask: w.mask }
            });
        }
    }

    fn flush_collision(&mut self) {
        if let Some(w) = self.collision_write.take() {
            self.request(SuzyRequest::ColRmw { address: w.address, value: w.value, mask: w.mask });
        }
    }

    fn flush(&mut self) {
        self.flush_video();
        self.flush_collision();
    }

    fn pixel_nibble(&self) -> (u16, u8) {
        let offset = (self.hoff / 2) as u16;
        let shift = if self.hoff & 1 == 0 { 4 } else { 0 };
        (offset, shift)
    }

    fn video_write(&mut self, address: u16, xor: bool) -> &mut VideoWrite {
        if !matches!(self.video, Some(w) if w.address == address && w.xor == xor) {
            self.flush_video();
        }
        self.video.get_or_insert(VideoWrite { address, value: 0, mask: 0xff, xor })
    }

    fn write_pixel(&mut self, regs: &SuzyRegisters, pen: u8) {
        let (offset, shift) = self.pixel_nibble();
        let address = regs.u16(VIDADRL).wrapping_add(offset);
        let nibble = 0x0f << shift;
        let w = self.video_write(address, false);
        w.mask &= !nibble;
        w.value = (w.value & !nibble) | (pen << shift);
    }

    fn xor_pixel(&mut self, regs: &SuzyRegisters, pen: u8) {
        let (offset, shift) = self.pixel_nibble();
        let address = regs.u16(VIDADRL).wrapping_add(offset);
        let w = self.video_write(address, true);
        w.value ^= pen << shift;
    }

    fn write_collision(&mut self, regs: &SuzyRegisters) {
        let (offset, shift) = self.pixel_nibble();
        let address = regs.u16(COLLADRL).wrapping_add(offset);
        let word = address & !3;
        let lane = u32::from(address & 3);
        let mask = (0x0f_u32 << shift) << (lane * 8);
        if !matches!(self.collision_write, Some(w) if w.address == word) {
            self.flush_collision();
        }
        let number = regs.collision_number();
        let w = self.collision_write.get_or_insert(CollisionWrite { address: word, value: number * 0x11, mask: 0 });
        w.mask |= mask;
    }

    fn process_pixel(&mut self, regs: &SuzyRegisters) {
        let pen = self.pen;
        let collides = regs.collides();
        trace!("process_pixel() hoff:{} pen:0x{:x} type:{}", self.hoff, pen, regs.sprite_type());

        match regs.sprite_type() {
            // background shadow
            0 => {
                self.write_pixel(regs, pen);
                if collides && pen != 0x0e {
                    self.write_collision(regs);
                }
            }
            // background no collide
            1 => self.write_pixel(regs, pen),
            // boundary shadow
            2 => {
                if pen != 0x00 && pen != 0x0e && pen != 0x0f {
                    self.write_pixel(regs, pen);
                }
                if pen != 0x00 && pen != 0x0e && collides {
                    self.write_collision(regs);
                }
            }
            // boundary
            3 => {
                if pen != 0x00 && pen != 0x0f {
                    self.write_pixel(regs, pen);
                }
                if pen != 0x00 && collides {
                    self.write_collision(regs);
                }
            }
            // normal
            4 => {
                if pen != 0x00 {
                    self.write_pixel(regs, pen);
                    if collides {
                        self.write_collision(regs);
                    }
                }
            }
            // no collide
            5 => {
                if pen != 0x00 {
                    self.write_pixel(regs, pen);
                }
            }
            // xor shadow
            6 => {
                if pen != 0x00 {
                    self.xor_pixel(regs, pen);
                }
                if pen != 0x00 && pen != 0x0e && collides {
                    self.write_collision(regs);
                }
            }
            // shadow
            _ => {
                if pen != 0x00 {
                    self.write_pixel(regs, pen);
                }
                if pen != 0x00 && pen != 0x0e && collides {
                    self.write_collision(regs);
                }
            }
        }
    }
}

impl Default for SpriteEngine {
    fn default() -> Self {
        SpriteEngine::new()
    }
}

impl fmt::Debug for SpriteEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SPRCTL0:0x{:02x} SPRCTL1:0x{:02x} SPRCOLL:0x{:02x} SCBNEXT:0x{:04x} SPRDATA:0x{:04x} HPOS:0x{:04x} VPOS:0x{:04x} HSIZE:0x{:04x} VSIZE:0x{:04x} STRETCH:0x{:04x} TILT:0x{:04x}",
            self.scb[R_SPRCTL0],
            self.scb[R_SPRCTL1],
            self.scb[R_SPRCOLL],
            self.scb_u16(R_SCBNEXTL),
            self.scb_u16(R_SPRDATAL),
            self.scb_u16(R_HPOSL),
            self.scb_u16(R_VPOSL),
            self.scb_u16(R_HSIZEL),
            self.scb_u16(R_VSIZEL),
            self.scb_u16(R_STRETCHL),
            self.scb_u16(R_TILTL),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::Ram;

    const SCB: u16 = 0x1000;
    const DATA: u16 = 0x1100;
    const VIDBAS: u16 = 0x2000;
    const COLLBAS: u16 = 0x4000;

    fn regs() -> SuzyRegisters {
        let mut r = SuzyRegisters::new();
        r.set_u16(SCBNEXTL, SCB);
        r.set_u16(VIDBASL, VIDBAS);
        r.set_u16(COLLBASL, COLLBAS);
        r.set_u16(HOFFL, 0);
        r.set_u16(VOFFL, 0);
        r.set_u16(COLLOFFL, 0x20);
        r.set_data(SUZYBUSEN, SUZYBUSEN_ENABLE);
        r.set_data(SPRGO, SPRGO_GO);
        r
    }

    /// Executes requests against `ram` the way the bus master does.
    fn run(engine: &mut SpriteEngine, regs: &mut SuzyRegisters, ram: &mut Ram) -> Vec<SuzyRequest> {
        let mut log = vec![];
        let mut req = engine.start(regs);
        while req != SuzyRequest::None {
            log.push(req);
            let response = match req {
                SuzyRequest::Read { address } => u32::from(ram.get(address)),
                SuzyRequest::Read4 { address } => ram.u32(address),
                SuzyRequest::Write { address, value } => {
                    ram.set(address, value);
                    0
                }
                SuzyRequest::ColRmw { address, value, mask } => u32::from(ram.col_rmw(address, value, mask)),
                SuzyRequest::VidRmw { address, value, mask } => {
                    ram.vid_rmw(address, value, mask);
                    0
                }
                SuzyRequest::Xor { address, value } => {
                    ram.xor(address, value);
                    0
                }
                SuzyRequest::None => 0,
            };
            req = engine.advance(regs, response);
        }
        log
    }

    /// 4 bpp normal sprite at (hpos, vpos), 1:1 scale, identity palette, one line of `pens`
    /// as a single literal run.
    fn one_line_sprite(ram: &mut Ram, sprite_type: u8, sprcoll: u8, hpos: u16, vpos: u16, pens: &[u8]) {
        let scb = [
            0xc0 | sprite_type, // 4 bpp
            0x10,               // reload HV, draw quadrant 0
            sprcoll,
            0x00,
            0x00, // end of chain
            (DATA & 0xff) as u8,
            (DATA >> 8) as u8,
            (hpos & 0xff) as u8,
            (hpos >> 8) as u8,
            (vpos & 0xff) as u8,
            (vpos >> 8) as u8,
            0x00,
            0x01, // hsize 1.0
            0x00,
            0x01, // vsize 1.0
        ];
        ram.copy(SCB, &scb);
        ram.copy(SCB + scb.len() as u16, &[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);

        // literal run: 1 + 4 bits count, 4 bits per pen, then a packed run of 0 ends the line
        let mut bits: Vec<u8> = vec![1];
        let count = pens.len() as u8 - 1;
        bits.extend((0..4).rev().map(|i| (count >> i) & 1));
        for p in pens {
            bits.extend((0..4).rev().map(|i| (p >> i) & 1));
        }
        bits.extend([0u8; 5]);
        let mut line: Vec<u8> = bits
            .chunks(8)
            .map(|c| c.iter().enumerate().fold(0u8, |acc, (i, b)| acc | (b << (7 - i))))
            .collect();
        line.insert(0, line.len() as u8 + 1);
        // end of quadrant, then end of sprite for the remaining quadrants
        line.extend([1, 1, 1, 0]);
        ram.copy(DATA, &line);
    }

    #[test]
    fn not_started_without_sprgo() {
        let mut r = regs();
        r.set_data(SPRGO, 0);
        let mut e = SpriteEngine::new();
        assert_eq!(e.start(&mut r), SuzyRequest::None);
        assert!(!e.is_busy());

        let mut r = regs();
        r.set_data(SUZYBUSEN, 0);
        assert_eq!(e.start(&mut r), SuzyRequest::None);
    }

    #[test]
    fn empty_chain_ends_at_once() {
        let mut r = regs();
        r.set_u16(SCBNEXTL, 0x0080);
        let mut e = SpriteEngine::new();
        assert_eq!(e.start(&mut r), SuzyRequest::None);
        assert_eq!(r.data(SPRGO) & SPRGO_GO, 0);
        assert!(!r.sprsys_r_is_flag_set(SprSysR::sprite_working));
    }

    #[test]
    fn scb_load_requests() {
        let mut ram = Ram::new();
        one_line_sprite(&mut ram, 4, SPRCOLL_DONT, 0, 0, &[1]);
        let mut r = regs();
        let mut e = SpriteEngine::new();
        let log = run(&mut e, &mut r, &mut ram);
        // 15 SCB bytes one by one, then the palette in two words
        for (i, req) in log.iter().take(15).enumerate() {
            assert_eq!(*req, SuzyRequest::Read { address: SCB + i as u16 });
        }
        assert_eq!(log[15], SuzyRequest::Read4 { address: SCB + 15 });
        assert_eq!(log[16], SuzyRequest::Read4 { address: SCB + 19 });
        assert_eq!(log[17], SuzyRequest::Read4 { address: DATA });
        // line of 3 bytes, then one end of quadrant byte for each of the 3 other quadrants
        assert_eq!(r.sprdline(), DATA + 6);
        assert_eq!(r.u16(SPRHSIZL), 0x100);
    }

    const SPRCOLL_DONT: u8 = 0x20;

    #[test]
    fn normal_sprite_draws_pixels() {
        let mut ram = Ram::new();
        ram.fill(0);
        // palette maps pen n to n for 0x01,0x23..: pen 1 -> 1, pen 2 -> 2, pen 3 -> 3
        one_line_sprite(&mut ram, 4, SPRCOLL_DONT, 10, 3, &[1, 2, 3]);
        let mut r = regs();
        let mut e = SpriteEngine::new();
        let log = run(&mut e, &mut r, &mut ram);

        let row = VIDBAS + 3 * 80;
        assert_eq!(ram.get(row + 5), 0x12);
        assert_eq!(ram.get(row + 6), 0x30);
        assert!(log.iter().all(|r| !matches!(r, SuzyRequest::ColRmw { .. })));
        // two pixels share the first byte
        assert!(log.contains(&SuzyRequest::VidRmw { address: row + 5, value: 0x12, mask: 0x00 }));
        assert!(!e.is_busy());
    }

    #[test]
    fn row_wraps_past_the_right_end_of_hpos() {
        let mut ram = Ram::new();
        ram.fill(0);
        one_line_sprite(&mut ram, 4, SPRCOLL_DONT, 0x7ffe, 0, &[1, 2, 3]);
        let mut r = regs();
        let mut e = SpriteEngine::new();
        let log = run(&mut e, &mut r, &mut ram);
        assert!(!e.is_busy());
        assert!(log.iter().all(|r| !matches!(r, SuzyRequest::VidRmw { .. })));
        assert_eq!(ram.get(VIDBAS), 0);
    }

    #[test]
    fn pen_zero_is_transparent_for_normal_sprites() {
        let mut ram = Ram::new();
        ram.fill(0);
        let row = VIDBAS;
        ram.set(row, 0x77);
        one_line_sprite(&mut ram, 4, SPRCOLL_DONT, 0, 0, &[0, 5]);
        let mut r = regs();
        let mut e = SpriteEngine::new();
        run(&mut e, &mut r, &mut ram);
        assert_eq!(ram.get(row), 0x75);
    }

    #[test]
    fn collision_buffer_and_depository() {
        let mut ram = Ram::new();
        ram.fill(0);
        // an earlier sprite left collision number 3 under the second pixel
        ram.set(COLLBAS, 0x03);
        one_line_sprite(&mut ram, 4, 0x05, 0, 0, &[1, 1]);
        let mut r = regs();
        let mut e = SpriteEngine::new();
        let log = run(&mut e, &mut r, &mut ram);

        assert!(log.contains(&SuzyRequest::ColRmw { address: COLLBAS, value: 0x55, mask: 0xff }));
        assert_eq!(ram.get(COLLBAS), 0x55);
        assert_eq!(ram.get(SCB + 0x20), 3);
        assert_eq!(log.last(), Some(&SuzyRequest::Write { address: SCB + 0x20, value: 3 }));
    }

    #[test]
    fn xor_sprite() {
        let mut ram = Ram::new();
        ram.fill(0);
        ram.set(VIDBAS, 0xff);
        one_line_sprite(&mut ram, 6, SPRCOLL_DONT, 0, 0, &[1, 2]);
        let mut r = regs();
        let mut e = SpriteEngine::new();
        let log = run(&mut e, &mut r, &mut ram);
        assert!(log.contains(&SuzyRequest::Xor { address: VIDBAS, value: 0x12 }));
        assert_eq!(ram.get(VIDBAS), 0xed);
    }

    #[test]
    fn skipped_sprite_is_not_drawn() {
        let mut ram = Ram::new();
        ram.fill(0);
        one_line_sprite(&mut ram, 4, SPRCOLL_DONT, 0, 0, &[1, 1]);
        ram.set(SCB + 1, 0x10 | SPRCTL1_SKIP_SPRITE);
        let mut r = regs();
        let mut e = SpriteEngine::new();
        let log = run(&mut e, &mut r, &mut ram);
        assert_eq!(log.len(), 5);
        assert_eq!(ram.get(VIDBAS), 0);
    }

    #[test]
    fn everon_flags_offscreen_sprite() {
        let mut ram = Ram::new();
        ram.fill(0);
        one_line_sprite(&mut ram, 5, SPRCOLL_DONT, 200, 0, &[1]);
        let mut r = regs();
        r.set_data(SPRGO, SPRGO_GO | SPRGO_EVERON);
        let mut e = SpriteEngine::new();
        run(&mut e, &mut r, &mut ram);
        assert_eq!(ram.get(SCB + 0x20), 0x80);
    }
}
