use lazy_static::lazy_static;
use log::trace;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref BIT_REVERSE: [u8; 256] = {
        let mut t = [0u8; 256];
        for (i, v) in t.iter_mut().enumerate() {
            *v = (i as u8).reverse_bits();
        }
        t
    };
}

/// Line descriptor value ending the sprite.
pub const SPRDOFF_END_SPRITE: u8 = 0;
/// Line descriptor value ending the quadrant.
pub const SPRDOFF_END_QUADRANT: u8 = 1;

const SHIFTER_BITS: u32 = 64;
const FEED_BITS: u32 = 32;
const RUN_HEADER_BITS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenStatus {
    Pen(u8),
    /// Feed 32 more bits and ask again.
    DataNeeded,
    NextLine,
    NextQuadrant,
    NextSprite,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Run {
    literal: bool,
    count: u8,
    pen: u8,
}

/// Decoder of one sprite data line into pen indexes.
///
/// Sprite data is a bit stream, most significant bit first. Bytes are bit
/// reversed on their way into the shifter so that the stream is consumed
/// from bit 0 up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PenUnpacker {
    shifter: u64,
    /// Bits buffered in `shifter`.
    size: u32,
    /// Bits of the line left to decode.
    total: u32,
    sprdoff: u8,
    bpp: u32,
    literal: bool,
    run: Run,
}

impl PenUnpacker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a line with its first 32 bits of data, returns the line descriptor (SPRDOFF).
    pub fn start_line(&mut self, bpp: u8, totally_literal: bool, data: u32) -> u8 {
        self.shifter = 0;
        self.size = 0;
        self.bpp = u32::from(bpp);
        self.literal = totally_literal;
        self.run = Run::default();
        self.feed_data(data);
        self.total = 8;
        self.sprdoff = self.pull(8) as u8;
        self.total = match self.sprdoff {
            SPRDOFF_END_SPRITE | SPRDOFF_END_QUADRANT => 0,
            n => (u32::from(n) - 1) * 8,
        };
        trace!("Pen unpacker line sprdoff:{} bpp:{bpp} literal:{totally_literal}", self.sprdoff);
        self.sprdoff
    }

    /// Appends 32 bits, little endian, to the shifter.
    ///
    /// # Panics
    ///
    /// Feeding more than the shifter holds.
    pub fn feed_data(&mut self, data: u32) {
        assert!(self.size + FEED_BITS <= SHIFTER_BITS, "Pen unpacker overfed, {} bits buffered", self.size);
        for b in data.to_le_bytes() {
            self.shifter |= u64::from(BIT_REVERSE[usize::from(b)]) << self.size;
            self.size += 8;
        }
    }

    #[must_use]
    pub fn sprdoff(&self) -> u8 {
        self.sprdoff
    }

    /// # Panics
    ///
    /// Pulling more bits than buffered.
    fn pull(&mut self, bits: u32) -> u8 {
        assert!(
            bits <= self.size && bits <= self.total,
            "Pen unpacker pulled {bits} bits, {} buffered, {} left in line",
            self.size,
            self.total
        );
        let mut result = 0u8;
        for _ in 0..bits {
            result = (result << 1) | (self.shifter & 1) as u8;
            self.shifter >>= 1;
        }
        self.size -= bits;
        self.total -= bits;
        result
    }

    fn end_line(&mut self) -> PenStatus {
        self.size = 0;
        self.shifter = 0;
        self.total = 0;
        PenStatus::NextLine
    }

    /// Next pen of the line.
    pub fn next_pen(&mut self) -> PenStatus {
        match self.sprdoff {
            SPRDOFF_END_SPRITE => return PenStatus::NextSprite,
            SPRDOFF_END_QUADRANT => return PenStatus::NextQuadrant,
            _ => (),
        }

        if !self.run.literal && self.run.count > 0 {
            self.run.count -= 1;
            return PenStatus::Pen(self.run.pen);
        }

        let in_literal_run = self.run.literal && self.run.count > 0;
        let needed = self.bpp + if self.literal || in_literal_run { 0 } else { RUN_HEADER_BITS };

        // The last bits of a line never hold a full pen.
        if self.total <= needed {
            return self.end_line();
        }
        if self.size < needed {
            return PenStatus::DataNeeded;
        }

        if self.literal {
            self.run.pen = self.pull(self.bpp);
            return PenStatus::Pen(self.run.pen);
        }

        if in_literal_run {
            self.run.count -= 1;
            self.run.pen = self.pull(self.bpp);
            return PenStatus::Pen(self.run.pen);
        }

        self.run.literal = self.pull(1) != 0;
        self.run.count = self.pull(4);
        if !self.run.literal && self.run.count == 0 {
            return self.end_line();
        }
        self.run.pen = self.pull(self.bpp);
        PenStatus::Pen(self.run.pen)
    }
}
