// Transport module - THE WIRE (abstract)
// Unreliable datagram transport: UDP for real nodes, in-memory for tests

mod memory;
mod traits;
mod udp;

pub use traits::{Transport, TransportError, TransportStats, MAX_DATAGRAM_SIZE};

pub use udp::{UdpTransport, UdpTransportConfig};

pub use memory::{MemoryNetwork, MemoryTransport};
