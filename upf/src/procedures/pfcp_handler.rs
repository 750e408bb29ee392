//! pfcp_handler - PFCP entry points
use super::association_release::AssociationReleaseProcedure;
use super::association_setup::AssociationSetupProcedure;
use super::association_update::AssociationUpdateProcedure;
use super::heartbeat::HeartbeatProcedure;
use super::session_deletion::SessionDeletionProcedure;
use super::session_establishment::SessionEstablishmentProcedure;
use super::session_modification::SessionModificationProcedure;
use super::session_report::SessionReportProcedure;
use crate::userplane::DownlinkDataNotification;
use crate::{HandlerApi, Procedure};
use bytes::Bytes;
use derive_deref::Deref;
use pfcp::{
    AssociationReleaseResponse, AssociationSetupResponse, AssociationUpdateResponse, Cause,
    Cursor, DecodeLimits, MessageType, PfcpError, PfcpHeader, PfcpMessage,
    SessionDeletionResponse, SessionModificationResponse, VersionNotSupportedResponse,
    split_message,
};
use slog::{Logger, debug, warn};
use std::net::SocketAddr;

#[derive(Clone, Deref)]
pub struct PfcpHandler<A: HandlerApi>(A);

impl<A: HandlerApi> PfcpHandler<A> {
    pub fn new(api: A) -> Self {
        PfcpHandler(api)
    }

    /// Handle one datagram received on the N4 socket, returning the response to send back
    /// to the peer, if any.
    pub async fn handle_datagram(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
        logger: &Logger,
    ) -> Option<Bytes> {
        let (header, body) = match split_message(datagram) {
            Ok(x) => x,
            Err(PfcpError::VersionNotSupported(version)) => {
                warn!(logger, "PFCP version {version} from {peer} not supported");
                let header = PfcpHeader::decode(&mut Cursor::new(datagram)).ok()?;
                return Some(VersionNotSupportedResponse.encode(None, header.sequence_number));
            }
            Err(e) => {
                warn!(logger, "Discarding malformed PFCP message from {peer} - {e}");
                return None;
            }
        };

        // Remember any peer we have not heard from before.
        let _ = self.pfcp_node(&peer);

        let message_type = match MessageType::try_from(header.message_type) {
            Ok(x) => x,
            Err(e) => {
                warn!(logger, "Discarding PFCP message from {peer} - {e}");
                return None;
            }
        };
        let limits = Procedure::new(&self.0, logger).decode_limits();
        let sequence_number = header.sequence_number;

        let response = match message_type {
            MessageType::HeartbeatRequest => {
                let r = decode(body, &limits, logger).ok()?;
                HeartbeatProcedure::new(&self.0, logger).run(&header, r)
            }
            MessageType::AssociationSetupRequest => match decode(body, &limits, logger) {
                Ok(r) => AssociationSetupProcedure::new(&self.0, logger).run(&header, r, peer),
                Err(cause) => AssociationSetupResponse {
                    node_id: self.node_id(),
                    cause,
                    recovery_time_stamp: self.recovery_time_stamp(),
                }
                .encode(None, sequence_number),
            },
            MessageType::AssociationUpdateRequest => match decode(body, &limits, logger) {
                Ok(r) => AssociationUpdateProcedure::new(&self.0, logger).run(&header, r, peer),
                Err(cause) => AssociationUpdateResponse {
                    node_id: self.node_id(),
                    cause,
                }
                .encode(None, sequence_number),
            },
            MessageType::AssociationReleaseRequest => match decode(body, &limits, logger) {
                Ok(r) => {
                    AssociationReleaseProcedure::new(&self.0, logger)
                        .run(&header, r, peer)
                        .await
                }
                Err(cause) => AssociationReleaseResponse {
                    node_id: self.node_id(),
                    cause,
                }
                .encode(None, sequence_number),
            },
            MessageType::SessionEstablishmentRequest => {
                let procedure = SessionEstablishmentProcedure::new(&self.0, logger);
                match decode(body, &limits, logger) {
                    Ok(r) => procedure.run(&header, r, peer),
                    Err(cause) => procedure.rejection(cause).encode(Some(0), sequence_number),
                }
            }
            MessageType::SessionModificationRequest => match decode(body, &limits, logger) {
                Ok(r) => {
                    SessionModificationProcedure::new(&self.0, logger)
                        .run(&header, r)
                        .await
                }
                Err(cause) => SessionModificationResponse::with_cause(cause)
                    .encode(Some(self.remote_seid(&header)), sequence_number),
            },
            MessageType::SessionDeletionRequest => match decode(body, &limits, logger) {
                Ok(r) => {
                    SessionDeletionProcedure::new(&self.0, logger)
                        .run(&header, r)
                        .await
                }
                Err(cause) => SessionDeletionResponse { cause }
                    .encode(Some(self.remote_seid(&header)), sequence_number),
            },
            MessageType::SessionReportResponse => {
                if let Ok(r) = decode(body, &limits, logger) {
                    SessionReportProcedure::new(&self.0, logger).handle_response(&header, r);
                }
                return None;
            }
            MessageType::HeartbeatResponse => {
                debug!(logger, ">> HeartbeatResponse");
                return None;
            }
            _ => {
                warn!(logger, "Unexpected {message_type:?} from {peer} ignored");
                return None;
            }
        };
        Some(response)
    }

    /// The data plane saw a packet for a FAR with NOCP set.
    pub async fn handle_downlink_data(
        &self,
        notification: DownlinkDataNotification,
        logger: &Logger,
    ) {
        SessionReportProcedure::new(&self.0, logger)
            .run(notification)
            .await
    }

    fn remote_seid(&self, header: &PfcpHeader) -> u64 {
        header
            .seid
            .and_then(|seid| self.registry().find_by_seid(seid))
            .map(|session| session.remote_seid)
            .unwrap_or(0)
    }
}

fn decode<M: PfcpMessage>(body: &[u8], limits: &DecodeLimits, logger: &Logger) -> Result<M, Cause> {
    M::decode_body(body, limits).map_err(|e| {
        warn!(logger, "Failed to decode {:?} - {e}", M::MESSAGE_TYPE);
        e.cause()
    })
}
