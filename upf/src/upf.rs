use crate::data::{PfcpNode, SessionRegistry};
use crate::pfcp_server::{self, ShutdownHandle};
use crate::procedures::PfcpHandler;
use crate::userplane::{
    DownlinkDataNotification, PacketProcessor, Port, UserplaneCommand, Verdict,
};
use crate::{Config, HandlerApi};
use anyhow::Result;
use async_channel::Receiver;
use async_std::net::UdpSocket;
use async_std::sync::Mutex;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pfcp::{NodeId, RecoveryTimeStamp};
use slog::{Logger, info, o};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// Seconds from 1900 (the NTP epoch used by PFCP timestamps) to 1970.
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
const MAX_SEQUENCE_NUMBER: u32 = 0x00ff_ffff;

#[derive(Clone)]
pub struct Upf {
    config: Config,
    logger: Logger,
    registry: Arc<SessionRegistry>,
    pfcp_nodes: Arc<DashMap<SocketAddr, PfcpNode>>,
    packet_processor: PacketProcessor,
    notifications: Receiver<DownlinkDataNotification>,
    socket: Arc<UdpSocket>,
    sequence_number: Arc<AtomicU32>,
    recovery_time_stamp: u32,
    server_handle: Arc<Mutex<Option<ShutdownHandle>>>,
}

impl Upf {
    pub async fn start(config: Config, logger: Logger) -> Result<Self> {
        config.check()?;
        let mut upf = Self::new(config, logger).await?;
        upf.run().await?;
        Ok(upf)
    }

    async fn new(config: Config, logger: Logger) -> Result<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let (notification_sender, notifications) =
            async_channel::bounded(config.report_queue_depth);
        let packet_processor = PacketProcessor::new(
            &config,
            registry.clone(),
            notification_sender,
            &logger,
        )
        .await?;
        let socket = pfcp_server::create_n4_socket(config.n4_ip_addr, &logger)?;

        let since_1970 = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let recovery_time_stamp = (since_1970 + NTP_UNIX_OFFSET) as u32;

        Ok(Self {
            config,
            logger,
            registry,
            pfcp_nodes: Arc::new(DashMap::new()),
            packet_processor,
            notifications,
            socket: Arc::new(socket),
            sequence_number: Arc::new(AtomicU32::new(1)),
            recovery_time_stamp,
            server_handle: Arc::new(Mutex::new(None)),
        })
    }

    async fn run(&mut self) -> Result<()> {
        info!(
            &self.logger,
            "UPF started, N4 {}, N3 {}", self.config.n4_ip_addr, self.config.n3_ip_addr
        );
        let handle = pfcp_server::serve(
            self.socket.clone(),
            PfcpHandler::new(self.clone()),
            self.notifications.clone(),
            self.logger.new(o!("pfcp" => 1)),
        );
        *self.server_handle.lock().await = Some(handle);
        Ok(())
    }

    pub async fn graceful_shutdown(self) {
        info!(&self.logger, "Shutting down");
        if let Some(h) = self.server_handle.lock().await.take() {
            h.graceful_shutdown().await;
        }
    }

    /// Pass a frame to the data plane as if it had arrived on the given port.
    pub async fn handle_frame(&self, port: Port, frame: &[u8]) -> Verdict {
        self.packet_processor.handle_frame(port, frame).await
    }

    /// Frames the data plane has sent, including flushed buffered frames.
    pub fn egress(&self) -> Receiver<(Port, Vec<u8>)> {
        self.packet_processor.egress()
    }

    pub fn n4_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }
}

#[async_trait]
impl HandlerApi for Upf {
    fn config(&self) -> &Config {
        &self.config
    }

    fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn node_id(&self) -> NodeId {
        NodeId::from(self.config.n4_ip_addr)
    }

    fn recovery_time_stamp(&self) -> RecoveryTimeStamp {
        RecoveryTimeStamp(self.recovery_time_stamp)
    }

    fn pfcp_node(&self, addr: &SocketAddr) -> PfcpNode {
        match self.pfcp_nodes.entry(*addr) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                info!(&self.logger, "New PFCP peer {addr}");
                let node = PfcpNode::new(*addr);
                e.insert(node.clone());
                node
            }
        }
    }

    fn set_pfcp_node(&self, node: PfcpNode) {
        self.pfcp_nodes.insert(node.addr, node);
    }

    async fn userplane_command(&self, command: UserplaneCommand) {
        self.packet_processor.command(command).await
    }

    async fn send_pfcp(&self, message: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket.send_to(message, addr).await?;
        Ok(())
    }

    fn next_sequence_number(&self) -> u32 {
        self.sequence_number.fetch_add(1, Ordering::Relaxed) & MAX_SEQUENCE_NUMBER
    }
}
