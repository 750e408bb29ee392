//! engine - classify a frame against the session rules and apply the matched FAR
use super::counters::counter_indices::*;
use super::gtpu::{GTP_MESSAGE_TYPE_GPU, GtpuHeader, QosMarking, Tunnel, encapsulate};
use super::{
    Counters, DownlinkDataNotification, ETH_HEADER_LEN, ETHERTYPE_IPV4, GTPU_PORT,
    IPV4_HEADER_LEN, PacketBuffer, Port, UDP_HEADER_LEN,
};
use crate::data::{Far, LookupKey, Pdr, Session, SessionRegistry};
use crate::Config;
use async_channel::Sender;
use atomic_counter::AtomicCounter;
use pfcp::{DestinationInterface, OuterHeaderRemoval, SourceInterface};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use slog::{Logger, debug};
use std::borrow::Cow;
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    TooShort,
    NotIpv4,
    NotGtpTpdu,
    UnknownSession,
    NoPdr,
    NoFar,
    DropAction,
    BufferFull,
}

impl DropReason {
    fn counter(&self) -> usize {
        match self {
            DropReason::TooShort => DROP_TOO_SHORT,
            DropReason::NotIpv4 => DROP_NOT_IPV4,
            DropReason::NotGtpTpdu => DROP_NOT_GTP_TPDU,
            DropReason::UnknownSession => DROP_UNKNOWN_SESSION,
            DropReason::NoPdr => DROP_NO_PDR,
            DropReason::NoFar => DROP_NO_FAR,
            DropReason::DropAction => DROP_ACTION,
            DropReason::BufferFull => DROP_BUFFER_FULL,
        }
    }
}

/// What became of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Drop(DropReason),
    Forward { port: Port, frame: Vec<u8> },
    Buffered,
}

/// Per-packet classifier and action applier.  The engine only reads sessions from the
/// registry.  Its one side effect is the shared packet buffer.
pub struct Engine {
    config: Config,
    registry: Arc<SessionRegistry>,
    buffer: Arc<PacketBuffer>,
    counters: Arc<Counters>,
    notifications: Sender<DownlinkDataNotification>,
    logger: Logger,
}

impl Engine {
    pub fn new(
        config: Config,
        registry: Arc<SessionRegistry>,
        buffer: Arc<PacketBuffer>,
        counters: Arc<Counters>,
        notifications: Sender<DownlinkDataNotification>,
        logger: Logger,
    ) -> Self {
        Engine {
            config,
            registry,
            buffer,
            counters,
            notifications,
            logger,
        }
    }

    /// Process an Ethernet frame received on the given port.
    pub async fn process(&self, ingress: Port, frame: &[u8]) -> Verdict {
        let (pkts, bytes) = match ingress {
            Port::Access => (RX_ACCESS_PKTS, RX_ACCESS_BYTES),
            Port::Core => (RX_CORE_PKTS, RX_CORE_BYTES),
        };
        self.counters[pkts].inc();
        self.counters[bytes].add(frame.len());
        let result = self.handle_frame(ingress, frame, false).await;
        self.count(result)
    }

    /// Send a session's buffered frames to `egress` in the order they were buffered, applying
    /// the session's current rules.  Each frame stays in the buffer until it has been sent, so
    /// that frames arriving meanwhile queue up behind it.  Stops early if the rules still say
    /// to buffer.  Returns the number of frames released.
    pub async fn flush(&self, seid: u64, egress: &Sender<(Port, Vec<u8>)>) -> usize {
        let mut released = 0;
        while let Some((ingress, frame)) = self.buffer.front(seid).await {
            let result = self.handle_frame(ingress, &frame, true).await;
            if let Ok(Verdict::Buffered) = result {
                break;
            }
            self.counters[FLUSHED_PKTS].inc();
            if let Verdict::Forward { port, frame } = self.count(result) {
                if egress.send((port, frame)).await.is_err() {
                    break;
                }
            }
            self.buffer.remove_front(seid).await;
            released += 1;
        }
        released
    }

    fn count(&self, result: Result<Verdict, DropReason>) -> Verdict {
        match result {
            Ok(verdict) => {
                if let Verdict::Forward { port, .. } = &verdict {
                    self.counters[match port {
                        Port::Access => TX_ACCESS_PKTS,
                        Port::Core => TX_CORE_PKTS,
                    }]
                    .inc();
                }
                verdict
            }
            Err(reason) => {
                self.counters[reason.counter()].inc();
                Verdict::Drop(reason)
            }
        }
    }

    /// `buffered` is set for a frame being released from the packet buffer.
    async fn handle_frame(
        &self,
        ingress: Port,
        frame: &[u8],
        buffered: bool,
    ) -> Result<Verdict, DropReason> {
        if frame.len() < ETH_HEADER_LEN + IPV4_HEADER_LEN {
            return Err(DropReason::TooShort);
        }
        if u16::from_be_bytes([frame[12], frame[13]]) != ETHERTYPE_IPV4 {
            return Err(DropReason::NotIpv4);
        }
        let ip = &frame[ETH_HEADER_LEN..];
        let packet = Ipv4Packet::new(ip).ok_or(DropReason::TooShort)?;
        if packet.get_version() != 4 {
            return Err(DropReason::NotIpv4);
        }
        let ihl = packet.get_header_length() as usize * 4;
        let total_len = packet.get_total_length() as usize;
        if ihl < IPV4_HEADER_LEN || total_len < ihl || ip.len() < total_len {
            return Err(DropReason::TooShort);
        }

        // Ignore any link layer padding.
        let ip = &ip[..total_len];

        // Packets addressed to our N3 address are GTP-U from the RAN, keyed by TEID.
        // Anything else is keyed by its destination address, the UE.
        let destination = packet.get_destination();
        let (key, tunnel_header_len) = if destination == self.config.n3_ip_addr {
            if packet.get_next_level_protocol() != IpNextHeaderProtocols::Udp
                || ip.len() < ihl + UDP_HEADER_LEN
            {
                return Err(DropReason::NotGtpTpdu);
            }
            let gtp = GtpuHeader::parse(&ip[ihl + UDP_HEADER_LEN..]).map_err(|e| {
                debug!(self.logger, "Bad GTP-U header - {e}");
                DropReason::NotGtpTpdu
            })?;
            if gtp.message_type != GTP_MESSAGE_TYPE_GPU {
                return Err(DropReason::NotGtpTpdu);
            }
            (
                LookupKey::Teid(gtp.teid),
                ihl + UDP_HEADER_LEN + gtp.header_len,
            )
        } else {
            (LookupKey::UeIp(IpAddr::V4(destination)), 0)
        };

        let session = match key {
            LookupKey::Teid(teid) => self.registry.find_by_teid(teid),
            LookupKey::UeIp(ip) => self.registry.find_by_ue_ip(&ip),
        }
        .ok_or_else(|| {
            debug!(self.logger, "No session for {:?}", key);
            DropReason::UnknownSession
        })?;

        let source_interfaces: &[SourceInterface] = match ingress {
            Port::Access => &[SourceInterface::Access],
            Port::Core => &[SourceInterface::Core, SourceInterface::SgiLan],
        };
        let pdr = session
            .classify(source_interfaces, &key, self.config.pdr_match_order)
            .ok_or_else(|| {
                debug!(
                    self.logger,
                    "No PDR in session {} matches {:?}", session.local_seid, key
                );
                DropReason::NoPdr
            })?;

        let inner = match pdr.outer_header_removal {
            Some(OuterHeaderRemoval::GtpuUdpIpv4) if tunnel_header_len > 0 => {
                &ip[tunnel_header_len..]
            }
            Some(x) => {
                debug!(
                    self.logger,
                    "Outer header removal {:?} not supported for this packet", x
                );
                ip
            }
            None => ip,
        };

        let far = pdr
            .far_id
            .and_then(|id| session.far(id))
            .ok_or_else(|| {
                debug!(self.logger, "PDR {} has no FAR", pdr.id);
                DropReason::NoFar
            })?;
        let action = far.apply_action;
        if action.duplicate() {
            debug!(self.logger, "FAR {} duplicate action not supported", far.id);
        }

        if action.drop() {
            return Err(DropReason::DropAction);
        }
        if action.forward() {
            // Until the flush is done, new frames go out behind the ones buffered by this FAR.
            if !buffered {
                match self
                    .buffer
                    .push_behind(session.local_seid, far.id, ingress, frame)
                    .await
                {
                    Some(true) => {
                        self.counters[BUFFERED_PKTS].inc();
                        return Ok(Verdict::Buffered);
                    }
                    Some(false) => return Err(DropReason::BufferFull),
                    None => {}
                }
            }
            let (port, frame) = self.build_egress_frame(ingress, &session, pdr, far, inner);
            return Ok(Verdict::Forward { port, frame });
        }
        if action.buffer() {
            if buffered {
                return Ok(Verdict::Buffered);
            }
            if !self
                .buffer
                .push(session.local_seid, far.id, ingress, frame.to_vec())
                .await
            {
                return Err(DropReason::BufferFull);
            }
            self.counters[BUFFERED_PKTS].inc();
            if action.notify_cp() && !session.srr_flag {
                let notification = DownlinkDataNotification {
                    seid: session.local_seid,
                    pdr_id: pdr.id,
                };
                if self.notifications.try_send(notification).is_err() {
                    debug!(self.logger, "Downlink data notification queue full");
                }
            }
            return Ok(Verdict::Buffered);
        }
        Err(DropReason::DropAction)
    }

    fn build_egress_frame(
        &self,
        ingress: Port,
        session: &Session,
        pdr: &Pdr,
        far: &Far,
        inner: &[u8],
    ) -> (Port, Vec<u8>) {
        let params = far.forwarding_parameters.as_ref();
        let egress = match params.map(|p| p.destination_interface) {
            Some(DestinationInterface::Access) => Port::Access,
            Some(_) => Port::Core,
            None => ingress.other(),
        };

        let payload: Cow<[u8]> = match params.and_then(|p| p.outer_header_creation.as_ref()) {
            Some(ohc) if ohc.is_gtpu_ipv4() => match (ohc.teid, ohc.ipv4) {
                (Some(teid), Some(destination)) => {
                    let tunnel = Tunnel {
                        source: self.config.n3_ip_addr,
                        destination,
                        teid,
                        port: ohc.port.unwrap_or(GTPU_PORT),
                    };
                    let marking = pdr
                        .qer_id
                        .and_then(|id| session.qer(id))
                        .and_then(|qer| {
                            qer.qfi.map(|qfi| QosMarking {
                                qfi,
                                rqi: qer.rqi,
                                downlink: egress == Port::Access,
                            })
                        });
                    Cow::Owned(encapsulate(&tunnel, marking, inner))
                }
                _ => Cow::Borrowed(inner),
            },
            Some(ohc) => {
                debug!(
                    self.logger,
                    "Outer header creation {:#06x} not supported", ohc.description
                );
                Cow::Borrowed(inner)
            }
            None => Cow::Borrowed(inner),
        };

        (egress, self.add_link_header(egress, &payload))
    }

    fn add_link_header(&self, port: Port, payload: &[u8]) -> Vec<u8> {
        let (local, next_hop) = match port {
            Port::Access => (
                &self.config.access_local_mac,
                &self.config.access_next_hop_mac,
            ),
            Port::Core => (&self.config.core_local_mac, &self.config.core_next_hop_mac),
        };
        let mut frame = Vec::with_capacity(ETH_HEADER_LEN + payload.len());
        frame.extend_from_slice(next_hop);
        frame.extend_from_slice(local);
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }
}
