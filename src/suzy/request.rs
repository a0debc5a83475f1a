use serde::{Deserialize, Serialize};

/// One memory operation asked for by the sprite engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SuzyRequest {
    /// The sprite pass is over.
    #[default]
    None,
    Read {
        address: u16,
    },
    /// Little endian 32 bit read.
    Read4 {
        address: u16,
    },
    Write {
        address: u16,
        value: u8,
    },
    /// Collision buffer update, see [`crate::ram::Ram::col_rmw`]. Answers the collision number.
    ColRmw {
        address: u16,
        value: u8,
        mask: u32,
    },
    /// Video buffer update, see [`crate::ram::Ram::vid_rmw`].
    VidRmw {
        address: u16,
        value: u8,
        mask: u8,
    },
    Xor {
        address: u16,
        value: u8,
    },
}

impl SuzyRequest {
    /// Bus occupancy in fast cycles, on top of the fixed 5 ticks of any request.
    #[must_use]
    pub fn cost(&self) -> u64 {
        match self {
            SuzyRequest::None | SuzyRequest::Read { .. } | SuzyRequest::Write { .. } => 0,
            SuzyRequest::Read4 { .. } => 3,
            SuzyRequest::ColRmw { .. } => 7,
            SuzyRequest::VidRmw { .. } | SuzyRequest::Xor { .. } => 1,
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == SuzyRequest::None
    }
}
