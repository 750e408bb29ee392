//! mock_smf - enables a test script to assume the role of the SMF on the N4 reference point

use anyhow::{Result, ensure};
use async_net::UdpSocket;
use async_std::future;
use pfcp::*;
use slog::{Logger, info, o};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct MockSmf {
    socket: UdpSocket,
    upf_addr: SocketAddr,
    node_id: NodeId,
    sequence_number: u32,
    logger: Logger,
}

impl MockSmf {
    pub async fn new(local_ip: &str, upf_addr: SocketAddr, logger: &Logger) -> Result<MockSmf> {
        let logger = logger.new(o!("smf" => 1));
        let ip: IpAddr = local_ip.parse()?;
        let socket = UdpSocket::bind(SocketAddr::new(ip, 0)).await?;
        info!(logger, "Mock SMF on {}", socket.local_addr()?);
        Ok(MockSmf {
            socket,
            upf_addr,
            node_id: NodeId::from(ip),
            sequence_number: 1,
            logger,
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id.clone()
    }

    pub async fn send_raw(&self, datagram: &[u8]) -> Result<()> {
        self.socket.send_to(datagram, self.upf_addr).await?;
        Ok(())
    }

    pub async fn receive_raw(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; 65535];
        let (len, _) = future::timeout(RECEIVE_TIMEOUT, self.socket.recv_from(&mut buf)).await??;
        buf.truncate(len);
        Ok(buf)
    }

    /// Send a message with the next sequence number, which is returned.
    pub async fn send<M: PfcpMessage>(&mut self, message: &M, seid: Option<u64>) -> Result<u32> {
        let sequence_number = self.sequence_number;
        self.sequence_number += 1;
        info!(self.logger, "<< {:?}", M::MESSAGE_TYPE);
        self.send_raw(&message.encode(seid, sequence_number)).await?;
        Ok(sequence_number)
    }

    pub async fn receive<M: PfcpMessage>(&self) -> Result<(PfcpHeader, M)> {
        let datagram = self.receive_raw().await?;
        let (header, message) = decode_message::<M>(&datagram, &DecodeLimits::default())?;
        info!(self.logger, ">> {:?}", M::MESSAGE_TYPE);
        Ok((header, message))
    }

    /// Send a request and wait for the response with the same sequence number.
    pub async fn request<Req: PfcpMessage, Rsp: PfcpMessage>(
        &mut self,
        request: &Req,
        seid: Option<u64>,
    ) -> Result<(PfcpHeader, Rsp)> {
        let sequence_number = self.send(request, seid).await?;
        let (header, response) = self.receive::<Rsp>().await?;
        ensure!(
            header.sequence_number == sequence_number,
            "Response sequence number {} doesn't match request {}",
            header.sequence_number,
            sequence_number
        );
        Ok((header, response))
    }

    pub async fn perform_association_setup(&mut self) -> Result<AssociationSetupResponse> {
        let request = AssociationSetupRequest {
            node_id: Some(self.node_id()),
            recovery_time_stamp: Some(RecoveryTimeStamp(3_900_000_000)),
        };
        let (_, response): (_, AssociationSetupResponse) = self.request(&request, None).await?;
        ensure!(
            response.cause == Cause::RequestAccepted,
            "Association setup failed with {:?}",
            response.cause
        );
        Ok(response)
    }

    pub async fn establish_session(
        &mut self,
        cp_seid: u64,
        pdrs: Vec<CreatePdr>,
        fars: Vec<CreateFar>,
        qers: Vec<CreateQer>,
    ) -> Result<(PfcpHeader, SessionEstablishmentResponse)> {
        let request = SessionEstablishmentRequest {
            node_id: Some(self.node_id()),
            cp_f_seid: Some(FSeid {
                seid: cp_seid,
                ipv4: Some(std::net::Ipv4Addr::LOCALHOST),
                ipv6: None,
            }),
            create_pdrs: pdrs.into_iter().map(Ok).collect(),
            create_fars: fars.into_iter().map(Ok).collect(),
            create_qers: qers.into_iter().map(Ok).collect(),
            create_urrs: 0,
            pdn_type: Some(PdnType(PdnType::IPV4)),
        };
        self.request(&request, Some(0)).await
    }

    /// Establish a session and check it was accepted, returning the UPF's SEID.
    pub async fn establish_session_ok(
        &mut self,
        cp_seid: u64,
        pdrs: Vec<CreatePdr>,
        fars: Vec<CreateFar>,
        qers: Vec<CreateQer>,
    ) -> Result<u64> {
        let (header, response) = self.establish_session(cp_seid, pdrs, fars, qers).await?;
        ensure!(
            response.cause == Cause::RequestAccepted,
            "Session establishment failed with {:?}",
            response.cause
        );
        ensure!(header.seid == Some(cp_seid));
        let up_f_seid = response
            .up_f_seid
            .ok_or(anyhow::anyhow!("No UP F-SEID in response"))?;
        Ok(up_f_seid.seid)
    }

    pub async fn modify_session(
        &mut self,
        up_seid: u64,
        request: SessionModificationRequest,
    ) -> Result<(PfcpHeader, SessionModificationResponse)> {
        self.request(&request, Some(up_seid)).await
    }

    pub async fn delete_session(
        &mut self,
        up_seid: u64,
    ) -> Result<(PfcpHeader, SessionDeletionResponse)> {
        self.request(&SessionDeletionRequest, Some(up_seid)).await
    }

    /// Wait for a Session Report Request from the UPF and accept it.
    pub async fn handle_session_report(&mut self) -> Result<(PfcpHeader, SessionReportRequest)> {
        let (header, request) = self.receive::<SessionReportRequest>().await?;
        let response = SessionReportResponse {
            cause: Cause::RequestAccepted,
        };
        self.send_raw(&response.encode(header.seid, header.sequence_number))
            .await?;
        Ok((header, request))
    }
}
