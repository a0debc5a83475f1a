use std::io::{Error, ErrorKind};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::consts::{RESV_ADDR, ROM_SIZE};

const KNOWN_BOOT_ROM_MD5: &str = "fcd403db69f54290b51035d82f835e7b";

const BS93_HEADER_LENGTH: usize = 10;
const BS93_MAGIC: &[u8; 4] = b"BS93";

/// The 512 bytes of boot ROM mapped at 0xFE00-0xFFFF.
#[derive(Clone, Serialize, Deserialize)]
pub struct BootRom {
    data: Vec<u8>,
}

impl BootRom {
    /// # Errors
    ///
    /// Fails when `data` is not exactly 512 bytes long.
    pub fn from_slice(data: &[u8]) -> Result<Self, Error> {
        if data.len() != ROM_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Boot ROM must be {ROM_SIZE} bytes, got {}.", data.len()),
            ));
        }

        let digest = format!("{:x}", md5::compute(data));
        if digest == KNOWN_BOOT_ROM_MD5 {
            info!("Boot ROM md5 {digest} ok.");
        } else {
            warn!("Unknown boot ROM md5 {digest}.");
        }

        Ok(Self { data: data.to_vec() })
    }

    /// `offset` is relative to 0xFE00.
    #[inline]
    #[must_use]
    pub fn get(&self, offset: u16) -> u8 {
        self.data[offset as usize & (ROM_SIZE - 1)]
    }

    pub fn set_reset_vector(&mut self, address: u16) {
        let v = (RESV_ADDR as usize) & (ROM_SIZE - 1);
        self.data[v] = (address & 0xff) as u8;
        self.data[v + 1] = (address >> 8) as u8;
    }

    #[must_use]
    pub fn reset_vector(&self) -> u16 {
        let v = (RESV_ADDR as usize) & (ROM_SIZE - 1);
        u16::from(self.data[v]) | (u16::from(self.data[v + 1]) << 8)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// A raw homebrew executable: "BS93" header followed by the payload to load at `load_address`.
pub struct RawImage<'a> {
    load_address: u16,
    payload: &'a [u8],
}

impl<'a> RawImage<'a> {
    /// # Errors
    ///
    /// Fails on a truncated header or when the payload does not fit between the load address and 0xFC00.
    pub fn from_slice(data: &'a [u8]) -> Result<Self, Error> {
        if data.len() <= BS93_HEADER_LENGTH {
            return Err(Error::new(ErrorKind::InvalidData, "Raw image too short."));
        }
        if &data[6..BS93_HEADER_LENGTH] != BS93_MAGIC {
            warn!("Raw image without BS93 signature.");
        }
        let load_address = u16::from_be_bytes([data[2], data[3]]);
        let payload = &data[BS93_HEADER_LENGTH..];
        if load_address as usize + payload.len() > crate::consts::SUZ_ADDR as usize {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Raw image of {} bytes at 0x{load_address:04x} overlaps the chip registers.",
                    payload.len()
                ),
            ));
        }
        Ok(Self { load_address, payload })
    }

    #[must_use]
    pub fn load_address(&self) -> u16 {
        self.load_address
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_size() {
        assert!(BootRom::from_slice(&[0; 511]).is_err());
        assert!(BootRom::from_slice(&[0; 513]).is_err());
        assert!(BootRom::from_slice(&[0; 512]).is_ok());
    }

    #[test]
    fn reset_vector_patch() {
        let mut rom = BootRom::from_slice(&[0; 512]).unwrap();
        rom.set_reset_vector(0x0200);
        assert_eq!(rom.get(0x1fc), 0x00);
        assert_eq!(rom.get(0x1fd), 0x02);
        assert_eq!(rom.reset_vector(), 0x0200);
    }

    #[test]
    fn raw_image_header() {
        let mut data = vec![0x80, 0x08, 0x02, 0x00, 0x00, 0x0d, b'B', b'S', b'9', b'3'];
        data.extend([0xa9, 0x01, 0x60]);
        let image = RawImage::from_slice(&data).unwrap();
        assert_eq!(image.load_address(), 0x0200);
        assert_eq!(image.payload(), &[0xa9, 0x01, 0x60]);
    }

    #[test]
    fn raw_image_errors() {
        assert!(RawImage::from_slice(&[0x80, 0x08, 0x02]).is_err());
        let mut data = vec![0x80, 0x08, 0xfb, 0xff, 0x00, 0x0d, b'B', b'S', b'9', b'3'];
        data.extend([0; 4]);
        assert!(RawImage::from_slice(&data).is_err());
    }
}
