use serde::{Deserialize, Serialize};

pub const IODAT_EXTPW: u8 = 0b0000_0001;
pub const IODAT_CAD: u8 = 0b0000_0010;
pub const IODAT_NOEXP: u8 = 0b0000_0100;
pub const IODAT_REST: u8 = 0b0000_1000;
pub const IODAT_AUDIN: u8 = 0b0001_0000;

/// Levels of the pins configured as inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortInputs {
    pub audin: bool,
    pub rest: bool,
    pub comlynx_peer: bool,
}

/// The five general purpose Mikey pins behind IODIR/IODAT.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelPort {
    direction: u8,
    data: u8,
}

impl ParallelPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn direction(&self) -> u8 {
        self.direction
    }

    pub fn set_direction(&mut self, v: u8) {
        self.direction = v;
    }

    pub fn set_data(&mut self, v: u8) {
        self.data = v;
    }

    fn is_output(&self, pin: u8) -> bool {
        self.direction & pin != 0
    }

    /// Level driven on `pin`, `false` when it is an input.
    #[must_use]
    pub fn output(&self, pin: u8) -> bool {
        self.is_output(pin) && self.data & pin != 0
    }

    /// IODAT as read by the CPU: outputs read back their latch, inputs their pin.
    #[must_use]
    pub fn data(&self, inputs: PortInputs) -> u8 {
        let mut v = 0;
        if inputs.audin {
            v |= IODAT_AUDIN;
        }
        if self.is_output(IODAT_EXTPW) {
            v |= self.data & IODAT_EXTPW;
        } else {
            // running from the external power supply
            v |= IODAT_EXTPW;
        }
        if self.is_output(IODAT_CAD) {
            v |= self.data & IODAT_CAD;
        }
        if self.is_output(IODAT_NOEXP) {
            v |= self.data & IODAT_NOEXP;
        } else if !inputs.comlynx_peer {
            v |= IODAT_NOEXP;
        }
        if self.is_output(IODAT_REST) {
            v |= self.data & IODAT_REST;
        } else if inputs.rest {
            v |= IODAT_REST;
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_and_outputs() {
        let mut port = ParallelPort::new();
        let inputs = PortInputs { audin: true, rest: true, comlynx_peer: false };
        assert_eq!(
            port.data(inputs),
            IODAT_AUDIN | IODAT_EXTPW | IODAT_NOEXP | IODAT_REST
        );

        port.set_direction(IODAT_CAD | IODAT_REST);
        port.set_data(IODAT_CAD);
        assert!(port.output(IODAT_CAD));
        assert!(!port.output(IODAT_AUDIN));
        assert_eq!(port.data(PortInputs::default()), IODAT_EXTPW | IODAT_CAD | IODAT_NOEXP);
    }

    #[test]
    fn comlynx_peer_clears_noexp() {
        let port = ParallelPort::new();
        let inputs = PortInputs { comlynx_peer: true, ..Default::default() };
        assert_eq!(port.data(inputs) & IODAT_NOEXP, 0);
    }
}
