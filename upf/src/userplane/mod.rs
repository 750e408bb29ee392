mod buffer;
mod counters;
mod engine;
mod gtpu;
mod packet_processor;
mod pipeline;

pub use buffer::PacketBuffer;
pub use counters::Counters;
pub use engine::{DropReason, Engine, Verdict};
pub use packet_processor::{PacketProcessor, UserplaneCommand};

use pfcp::PdrId;

const ETH_HEADER_LEN: usize = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;
const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const GTPU_PORT: u16 = 2152; // TS29.281

/// The two sides of the UPF.  Access faces the RAN (N3) and Core faces the data network (N6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Access = 0,
    Core = 1,
}

impl Port {
    pub fn other(self) -> Port {
        match self {
            Port::Access => Port::Core,
            Port::Core => Port::Access,
        }
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Port::Access => write!(f, "access"),
            Port::Core => write!(f, "core"),
        }
    }
}

/// Raised by the data plane when a packet is buffered by a FAR that asks for the control plane
/// to be notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownlinkDataNotification {
    pub seid: u64,
    pub pdr_id: PdrId,
}
