use log::trace;
use serde::{Deserialize, Serialize};

use super::registers::{pen_rgba, PALETTE_LEN};

pub const LYNX_SCREEN_WIDTH: u32 = 160;
pub const LYNX_SCREEN_HEIGHT: u32 = 102;
pub const SCREEN_BUFFER_LEN: usize = (LYNX_SCREEN_WIDTH * LYNX_SCREEN_HEIGHT) as usize;
pub const RGBA_SCREEN_BUFFER_LEN: usize = SCREEN_BUFFER_LEN * 4;

const ROW_BYTES: u16 = (LYNX_SCREEN_WIDTH / 2) as u16;
const LAST_ROW_COUNT: u8 = (LYNX_SCREEN_HEIGHT - 1) as u8;
pub const VIDEO_DMA_BUFFER_LENGTH: u16 = 8;
const CHUNKS_PER_ROW: u8 = (ROW_BYTES / VIDEO_DMA_BUFFER_LENGTH) as u8;
const PIXELS_PER_CHUNK: usize = VIDEO_DMA_BUFFER_LENGTH as usize * 2;
/// Ticks between two display DMA fetches of the same row.
pub const DMA_CHUNK_INTERVAL: u64 = 192;

/// Receives the display stream as it is generated.
pub trait VideoSink {
    fn new_frame(&mut self, _tick: u64, _pbkup: u8) {}
    fn new_row(&mut self, _tick: u64, _row: u8) {}
    fn emit_screen_data(&mut self, _data: &[u8]) {}
    fn update_color_reg(&mut self, _reg: u8, _value: u8) {}
}

/// Next 8 bytes the display needs, to fetch at `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRequest {
    pub tick: u64,
    pub address: u16,
}

fn create_rgba_buffer() -> Vec<u8> {
    vec![0; RGBA_SCREEN_BUFFER_LEN]
}

fn create_rgba_buffers() -> [Vec<u8>; 2] {
    [create_rgba_buffer(), create_rgba_buffer()]
}

/// Turns display DMA chunks into RGBA rows, double buffered per frame.
#[derive(Serialize, Deserialize)]
pub struct DisplayGenerator {
    #[serde(skip)]
    #[serde(default = "create_rgba_buffers")]
    buffers: [Vec<u8>; 2],
    draw_buffer: usize,
    #[serde(skip)]
    sink: Option<Box<dyn VideoSink>>,
    palette: [u8; PALETTE_LEN],
    disp_adr: u16,
    row: Option<u8>,
    chunk: u8,
    color: bool,
    flip: bool,
    dma_enable: bool,
    pbkup: u8,
    rest: bool,
}

impl DisplayGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffers: create_rgba_buffers(),
            draw_buffer: 0,
            sink: None,
            palette: [0; PALETTE_LEN],
            disp_adr: 0,
            row: None,
            chunk: 0,
            color: false,
            flip: false,
            dma_enable: false,
            pbkup: 0,
            rest: false,
        }
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn VideoSink>>) {
        self.sink = sink;
    }

    pub fn take_sink(&mut self) -> Option<Box<dyn VideoSink>> {
        self.sink.take()
    }

    pub fn dispctl(&mut self, color: bool, flip: bool, dma_enable: bool) {
        self.color = color;
        self.flip = flip;
        self.dma_enable = dma_enable;
    }

    pub fn set_pbkup(&mut self, value: u8) {
        self.pbkup = value;
    }

    pub fn update_disp_addr(&mut self, addr: u16) {
        trace!("Display address latched 0x{addr:04x}");
        self.disp_adr = addr;
    }

    /// REST line: high between the last row and the next frame.
    #[must_use]
    pub fn rest(&self) -> bool {
        self.rest
    }

    pub fn update_palette(&mut self, index: usize, value: u8) {
        self.palette[index] = if index < 16 { value & 0x0f } else { value };
        if let Some(sink) = self.sink.as_mut() {
            sink.update_color_reg(index as u8, value);
        }
    }

    fn chunk_address(&self, row: u8, chunk: u8) -> u16 {
        let offset = u16::from(row) * ROW_BYTES + u16::from(chunk) * VIDEO_DMA_BUFFER_LENGTH;
        if self.flip {
            // The display address points at the last byte, fetched first.
            self.disp_adr
                .wrapping_sub(offset)
                .wrapping_sub(VIDEO_DMA_BUFFER_LENGTH - 1)
        } else {
            self.disp_adr.wrapping_add(offset)
        }
    }

    /// Horizontal blank at the expiry of timer 0, `count` being timer 2's count.
    pub fn hblank(&mut self, tick: u64, count: u8) -> Option<DmaRequest> {
        if !self.dma_enable || count > LAST_ROW_COUNT {
            self.row = None;
            return None;
        }
        let row = LAST_ROW_COUNT - count;
        trace!("[{tick}] hblank row {row}");
        self.row = Some(row);
        self.chunk = 0;
        self.rest = false;
        if let Some(sink) = self.sink.as_mut() {
            sink.new_row(tick, row);
        }
        Some(DmaRequest {
            tick,
            address: self.chunk_address(row, 0),
        })
    }

    /// Consumes one fetched chunk, `data` holding the bytes in memory order.
    pub fn push_data(&mut self, tick: u64, data: u64) -> Option<DmaRequest> {
        let row = self.row?;
        let mut bytes = data.to_le_bytes();
        if self.flip {
            bytes.reverse();
            for b in &mut bytes {
                *b = b.rotate_left(4);
            }
        }

        let start = (usize::from(row) * LYNX_SCREEN_WIDTH as usize + usize::from(self.chunk) * PIXELS_PER_CHUNK) * 4;
        let buffer = &mut self.buffers[self.draw_buffer];
        for (i, b) in bytes.iter().enumerate() {
            let offset = start + i * 8;
            buffer[offset..offset + 4].copy_from_slice(&pen_rgba(&self.palette, b >> 4));
            buffer[offset + 4..offset + 8].copy_from_slice(&pen_rgba(&self.palette, b & 0x0f));
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.emit_screen_data(&bytes);
        }

        self.chunk += 1;
        if self.chunk < CHUNKS_PER_ROW {
            Some(DmaRequest {
                tick: tick + DMA_CHUNK_INTERVAL,
                address: self.chunk_address(row, self.chunk),
            })
        } else {
            self.row = None;
            None
        }
    }

    /// Vertical blank at the expiry of timer 2: the frame drawn so far becomes the surface.
    pub fn vblank(&mut self, tick: u64) {
        trace!("[{tick}] vblank");
        self.draw_buffer = 1 - self.draw_buffer;
        self.row = None;
        self.rest = true;
        if let Some(sink) = self.sink.as_mut() {
            sink.new_frame(tick, self.pbkup);
        }
    }

    /// The last completed frame, RGBA.
    #[must_use]
    pub fn surface(&self) -> &[u8] {
        &self.buffers[1 - self.draw_buffer]
    }
}

impl Default for DisplayGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl VideoSink for Recorder {
        fn new_frame(&mut self, tick: u64, pbkup: u8) {
            self.events.borrow_mut().push(format!("frame {tick} {pbkup}"));
        }
        fn new_row(&mut self, tick: u64, row: u8) {
            self.events.borrow_mut().push(format!("row {tick} {row}"));
        }
        fn emit_screen_data(&mut self, data: &[u8]) {
            self.events.borrow_mut().push(format!("data {}", data.len()));
        }
    }

    fn generator() -> DisplayGenerator {
        let mut g = DisplayGenerator::new();
        g.dispctl(true, false, true);
        g.update_disp_addr(0xc000);
        g
    }

    #[test]
    fn row_from_timer2_count() {
        let mut g = generator();
        assert_eq!(g.hblank(100, 101), Some(DmaRequest { tick: 100, address: 0xc000 }));
        assert_eq!(g.hblank(200, 0), Some(DmaRequest { tick: 200, address: 0xc000 + 101 * 80 }));
        assert_eq!(g.hblank(300, 102), None);
    }

    #[test]
    fn ten_chunks_per_row() {
        let mut g = generator();
        let mut req = g.hblank(0, 101);
        let mut fetched = vec![];
        while let Some(r) = req {
            fetched.push(r);
            req = g.push_data(r.tick, 0);
        }
        assert_eq!(fetched.len(), 10);
        assert_eq!(fetched[9], DmaRequest { tick: 9 * DMA_CHUNK_INTERVAL, address: 0xc048 });
    }

    #[test]
    fn pixels_use_palette() {
        let mut g = generator();
        g.update_palette(1, 0x0f);
        g.update_palette(16 + 2, 0xf0);
        g.hblank(0, 101);
        g.push_data(0, 0x12);
        g.vblank(10);
        let s = g.surface();
        assert_eq!(&s[0..4], &[0x00, 0xff, 0x00, 0xff]);
        assert_eq!(&s[4..8], &[0x00, 0x00, 0xff, 0xff]);
        assert!(g.rest());
    }

    #[test]
    fn flip_reads_backwards() {
        let mut g = generator();
        g.dispctl(true, true, true);
        g.update_disp_addr(0xdfdf);
        assert_eq!(g.hblank(0, 101).map(|r| r.address), Some(0xdfd8));
        g.update_palette(0x0a, 0x0f);
        // last byte in memory is displayed first, nibbles swapped
        g.push_data(0, 0xa0u64 << 56);
        g.vblank(1);
        assert_eq!(&g.surface()[0..4], &[0x00, 0x00, 0x00, 0xff]);
        assert_eq!(&g.surface()[4..8], &[0x00, 0xff, 0x00, 0xff]);
    }

    #[test]
    fn sink_callbacks() {
        let events = Rc::new(RefCell::new(vec![]));
        let mut g = generator();
        g.set_pbkup(0x29);
        g.set_sink(Some(Box::new(Recorder { events: events.clone() })));
        g.hblank(5, 100);
        g.push_data(5, 0);
        g.vblank(9);
        assert_eq!(
            *events.borrow(),
            vec!["row 5 1".to_string(), "data 8".to_string(), "frame 9 41".to_string()]
        );
    }
}
