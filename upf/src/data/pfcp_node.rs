use pfcp::NodeId;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Unassociated,
    Associated,
    Released,
}

/// A PFCP peer, learned from the first datagram it sends us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfcpNode {
    pub addr: SocketAddr,
    pub state: AssociationState,
    pub node_id: Option<NodeId>,
    pub recovery_time_stamp: Option<u32>,
}

impl PfcpNode {
    pub fn new(addr: SocketAddr) -> Self {
        PfcpNode {
            addr,
            state: AssociationState::Unassociated,
            node_id: None,
            recovery_time_stamp: None,
        }
    }

    pub fn is_associated(&self) -> bool {
        self.state == AssociationState::Associated
    }
}

impl std::fmt::Display for PfcpNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(node_id) => write!(f, "{} ({node_id})", self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}
