use crate::data::{PfcpNode, SessionRegistry};
use crate::userplane::UserplaneCommand;
use crate::Config;
use anyhow::Result;
use async_trait::async_trait;
use pfcp::{NodeId, RecoveryTimeStamp};
use std::net::SocketAddr;

/// Trait representing the collection of services needed by UPF handlers.
#[async_trait]
pub trait HandlerApi: Send + Sync + Clone + 'static {
    fn config(&self) -> &Config;
    fn registry(&self) -> &SessionRegistry;

    fn node_id(&self) -> NodeId;
    fn recovery_time_stamp(&self) -> RecoveryTimeStamp;

    /// Look up a PFCP peer, creating an unassociated record for it if this is the first time
    /// we have heard from it.
    fn pfcp_node(&self, addr: &SocketAddr) -> PfcpNode;
    fn set_pfcp_node(&self, node: PfcpNode);

    async fn userplane_command(&self, command: UserplaneCommand);

    async fn send_pfcp(&self, message: &[u8], addr: SocketAddr) -> Result<()>;
    fn next_sequence_number(&self) -> u32;
}
