pub mod action;
pub mod bus;
pub mod bus_master;
pub mod cartridge;
pub mod consts;
pub mod cpu;
pub mod mikey;
pub mod ram;
pub mod rom;
pub mod suzy;

use std::io::{Error, ErrorKind};

use serde::{de::DeserializeOwned, Serialize};

pub use bus::{CpuInterrupt, CpuRequest, CpuRequestType, MapCtl, PageType};
pub use bus_master::BusMaster;
pub use cartridge::{CartridgeImage, FlatCartridgeImage};
pub use cpu::Cpu;
pub use mikey::{uart::comlynx_wire::ComLynxWire, video::VideoSink};
pub use suzy::KeyInput;

fn check_serializable<C: Cpu>(bus: &BusMaster<C>) -> Result<(), Error> {
    if bus.is_sprite_pass() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "Cannot save state while a sprite pass is in progress.",
        ));
    }
    Ok(())
}

/// Number of bytes [`serialize`] writes for `bus`.
///
/// # Errors
///
/// Fails while a sprite pass is in progress.
pub fn serialized_size<C: Cpu + Serialize>(bus: &BusMaster<C>) -> Result<usize, Error> {
    check_serializable(bus)?;
    postcard::experimental::serialized_size(bus)
        .map_err(|e| Error::new(ErrorKind::InvalidData, format!("{e}")))
}

/// Writes a save state of `bus` into `data`. The cartridge image, the video
/// sink and the ComLynx wire are not part of it.
///
/// # Errors
///
/// Fails while a sprite pass is in progress or when `data` is too small.
pub fn serialize<C: Cpu + Serialize>(bus: &BusMaster<C>, data: &mut [u8]) -> Result<(), Error> {
    check_serializable(bus)?;
    match postcard::to_slice(bus, data) {
        Err(e) => Err(Error::new(ErrorKind::InvalidData, format!("{e}"))),
        Ok(_) => Ok(()),
    }
}

/// Restores a save state. The cartridge image and the ComLynx wire are taken over from `source`.
///
/// # Errors
///
/// Fails on malformed data.
pub fn deserialize<C: Cpu + DeserializeOwned>(data: &[u8], source: &BusMaster<C>) -> Result<BusMaster<C>, Error> {
    let mut bus = match postcard::from_bytes::<BusMaster<C>>(data) {
        Err(e) => return Err(Error::new(ErrorKind::InvalidData, format!("{e}"))),
        Ok(b) => b,
    };
    bus.restore_collaborators(source);
    Ok(bus)
}

#[must_use]
pub const fn info() -> (&'static str, &'static str) {
    ("lynxcore", env!("CARGO_PKG_VERSION"))
}
