use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

/// Frames a port keeps before the oldest is dropped.
pub const WIRE_QUEUE_LEN: usize = 32;

/// What travels on the wire during one frame time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFrame {
    /// 8 data bits and the parity bit in bit 8.
    Data(u16),
    Break,
}

#[derive(Default)]
struct WireState {
    ports: Vec<VecDeque<WireFrame>>,
}

/// One port on a ComLynx wire. Every frame sent is received by all ports,
/// the sender included. Clones share the port.
#[derive(Clone)]
pub struct ComLynxWire {
    state: Arc<Mutex<WireState>>,
    port: usize,
}

impl ComLynxWire {
    /// A wire with a single port.
    #[must_use]
    pub fn new() -> Self {
        Self::with_port(0)
    }

    fn with_port(port: usize) -> Self {
        let state = WireState {
            ports: vec![VecDeque::new(); port + 1],
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            port,
        }
    }

    /// Plugs a new port into this wire.
    #[must_use]
    pub fn connect(&self) -> Self {
        let mut state = self.state.lock();
        state.ports.push(VecDeque::new());
        Self {
            state: self.state.clone(),
            port: state.ports.len() - 1,
        }
    }

    #[must_use]
    pub fn port(&self) -> usize {
        self.port
    }

    /// Number of other ports on the wire.
    #[must_use]
    pub fn peers(&self) -> usize {
        self.state.lock().ports.len().saturating_sub(1)
    }

    pub fn send(&self, frame: WireFrame) {
        for (port, queue) in self.state.lock().ports.iter_mut().enumerate() {
            if queue.len() == WIRE_QUEUE_LEN {
                trace!("ComLynx port {port} not drained, oldest frame dropped.");
                queue.pop_front();
            }
            queue.push_back(frame);
        }
    }

    /// Frames waiting for this port.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().ports.get(self.port).map_or(0, VecDeque::len)
    }

    pub fn receive(&self) -> Option<WireFrame> {
        self.state
            .lock()
            .ports
            .get_mut(self.port)
            .and_then(VecDeque::pop_front)
    }
}

impl Default for ComLynxWire {
    fn default() -> Self {
        ComLynxWire::new()
    }
}

impl Serialize for ComLynxWire {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.port as u32)
    }
}

struct ComLynxWireVisitor;

impl Visitor<'_> for ComLynxWireVisitor {
    type Value = ComLynxWire;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an u32")
    }

    fn visit_u32<E>(self, value: u32) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        // Detached until the owner re-attaches it to a live wire.
        Ok(ComLynxWire::with_port(value as usize))
    }
}

impl<'de> Deserialize<'de> for ComLynxWire {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_u32(ComLynxWireVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_port_hears_the_frame() {
        let a = ComLynxWire::new();
        let b = a.connect();
        assert_eq!(a.peers(), 1);
        assert_eq!(b.port(), 1);
        b.send(WireFrame::Data(0x155));
        assert_eq!(a.receive(), Some(WireFrame::Data(0x155)));
        assert_eq!(b.receive(), Some(WireFrame::Data(0x155)));
        assert_eq!(a.receive(), None);
    }

    #[test]
    fn idle_port_queue_is_bounded() {
        let a = ComLynxWire::new();
        let idle = a.connect();
        for v in 0..(WIRE_QUEUE_LEN as u16 + 10) {
            a.send(WireFrame::Data(v));
            a.receive();
        }
        assert_eq!(a.pending(), 0);
        assert_eq!(idle.pending(), WIRE_QUEUE_LEN);
        assert_eq!(idle.receive(), Some(WireFrame::Data(10)));
    }

    #[test]
    fn save_state_keeps_port() {
        let a = ComLynxWire::new().connect();
        let mut buf = [0u8; 8];
        let bytes = postcard::to_slice(&a, &mut buf).unwrap();
        let restored: ComLynxWire = postcard::from_bytes(bytes).unwrap();
        assert_eq!(restored.port(), 1);
        assert_eq!(restored.peers(), 1);
    }
}
