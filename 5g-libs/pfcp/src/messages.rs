//! messages - PFCP node and session messages, TS29.244, 7.4 and 7.5

use crate::grouped::*;
use crate::header::{MessageType, PfcpHeader, split_message};
use crate::ies::*;
use crate::{PfcpError, PfcpResult};
use bytes::{Bytes, BytesMut};

/// A PFCP message body.  Rules inside session messages are decoded one by one so that a bad
/// rule can be rejected without losing the rest of the message.
pub trait PfcpMessage: Sized {
    const MESSAGE_TYPE: MessageType;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self>;
    fn encode_body(&self, buf: &mut BytesMut);

    /// Encode header and body into a datagram.
    fn encode(&self, seid: Option<u64>, sequence_number: u32) -> Bytes {
        let mut body = BytesMut::new();
        self.encode_body(&mut body);
        let header = PfcpHeader::new(Self::MESSAGE_TYPE, seid, sequence_number);
        let mut buf = BytesMut::with_capacity(header.header_len() + body.len());
        header.encode(body.len(), &mut buf);
        buf.extend_from_slice(&body);
        buf.freeze()
    }
}

/// Decode a complete datagram that is expected to carry message `M`.
pub fn decode_message<M: PfcpMessage>(
    datagram: &[u8],
    limits: &DecodeLimits,
) -> PfcpResult<(PfcpHeader, M)> {
    let (header, body) = split_message(datagram)?;
    if header.message_type != M::MESSAGE_TYPE as u8 {
        return Err(PfcpError::UnknownMessageType(header.message_type));
    }
    Ok((header, M::decode_body(body, limits)?))
}

fn single<T: Ie>(ie: &RawIe, limits: &DecodeLimits) -> PfcpResult<Option<T>> {
    T::decode(ie.value, limits).map(Some)
}

fn mandatory<T>(ie: Option<T>, name: &'static str) -> PfcpResult<T> {
    ie.ok_or(PfcpError::MissingMandatoryIe(name))
}

fn encode_rules<T: Ie>(rules: &[PfcpResult<T>], buf: &mut BytesMut) {
    for rule in rules.iter().flatten() {
        rule.encode(buf)
    }
}

// TS29.244, 7.4.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    pub recovery_time_stamp: Option<RecoveryTimeStamp>,
}

impl PfcpMessage for HeartbeatRequest {
    const MESSAGE_TYPE: MessageType = MessageType::HeartbeatRequest;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut recovery_time_stamp = None;
        for ie in ies(body) {
            let ie = ie?;
            if IeType::from_u16(ie.ie_type) == Some(IeType::RecoveryTimeStamp) {
                recovery_time_stamp = single(&ie, limits)?;
            }
        }
        Ok(HeartbeatRequest {
            recovery_time_stamp,
        })
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        if let Some(x) = &self.recovery_time_stamp {
            x.encode(buf)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub recovery_time_stamp: RecoveryTimeStamp,
}

impl PfcpMessage for HeartbeatResponse {
    const MESSAGE_TYPE: MessageType = MessageType::HeartbeatResponse;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let request = HeartbeatRequest::decode_body(body, limits)?;
        Ok(HeartbeatResponse {
            recovery_time_stamp: mandatory(request.recovery_time_stamp, "Recovery Time Stamp")?,
        })
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        self.recovery_time_stamp.encode(buf)
    }
}

/// Node ID, optional Cause and optional Recovery Time Stamp.  The association messages all
/// share this shape.
#[derive(Debug, Clone, Default)]
struct NodeFields {
    node_id: Option<NodeId>,
    cause: Option<Cause>,
    recovery_time_stamp: Option<RecoveryTimeStamp>,
}

impl NodeFields {
    fn decode(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut f = NodeFields::default();
        for ie in ies(body) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::NodeId) => f.node_id = single(&ie, limits)?,
                Some(IeType::Cause) => f.cause = single(&ie, limits)?,
                Some(IeType::RecoveryTimeStamp) => f.recovery_time_stamp = single(&ie, limits)?,
                _ => {}
            }
        }
        Ok(f)
    }
}

// TS29.244, 7.4.4.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSetupRequest {
    pub node_id: Option<NodeId>,
    pub recovery_time_stamp: Option<RecoveryTimeStamp>,
}

impl PfcpMessage for AssociationSetupRequest {
    const MESSAGE_TYPE: MessageType = MessageType::AssociationSetupRequest;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let f = NodeFields::decode(body, limits)?;
        Ok(AssociationSetupRequest {
            node_id: f.node_id,
            recovery_time_stamp: f.recovery_time_stamp,
        })
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        if let Some(x) = &self.node_id {
            x.encode(buf)
        }
        if let Some(x) = &self.recovery_time_stamp {
            x.encode(buf)
        }
    }
}

// TS29.244, 7.4.4.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSetupResponse {
    pub node_id: NodeId,
    pub cause: Cause,
    pub recovery_time_stamp: RecoveryTimeStamp,
}

impl PfcpMessage for AssociationSetupResponse {
    const MESSAGE_TYPE: MessageType = MessageType::AssociationSetupResponse;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let f = NodeFields::decode(body, limits)?;
        Ok(AssociationSetupResponse {
            node_id: mandatory(f.node_id, "Node ID")?,
            cause: mandatory(f.cause, "Cause")?,
            recovery_time_stamp: mandatory(f.recovery_time_stamp, "Recovery Time Stamp")?,
        })
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        self.node_id.encode(buf);
        self.cause.encode(buf);
        self.recovery_time_stamp.encode(buf);
    }
}

macro_rules! node_request {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub node_id: Option<NodeId>,
        }

        impl PfcpMessage for $name {
            const MESSAGE_TYPE: MessageType = MessageType::$name;
            fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
                Ok($name {
                    node_id: NodeFields::decode(body, limits)?.node_id,
                })
            }
            fn encode_body(&self, buf: &mut BytesMut) {
                if let Some(x) = &self.node_id {
                    x.encode(buf)
                }
            }
        }
    };
}

macro_rules! node_response {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub node_id: NodeId,
            pub cause: Cause,
        }

        impl PfcpMessage for $name {
            const MESSAGE_TYPE: MessageType = MessageType::$name;
            fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
                let f = NodeFields::decode(body, limits)?;
                Ok($name {
                    node_id: mandatory(f.node_id, "Node ID")?,
                    cause: mandatory(f.cause, "Cause")?,
                })
            }
            fn encode_body(&self, buf: &mut BytesMut) {
                self.node_id.encode(buf);
                self.cause.encode(buf);
            }
        }
    };
}

// TS29.244, 7.4.4.3 - 7.4.4.6
node_request!(AssociationUpdateRequest);
node_response!(AssociationUpdateResponse);
node_request!(AssociationReleaseRequest);
node_response!(AssociationReleaseResponse);

// TS29.244, 7.4.4.7 - header only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionNotSupportedResponse;

impl PfcpMessage for VersionNotSupportedResponse {
    const MESSAGE_TYPE: MessageType = MessageType::VersionNotSupportedResponse;
    fn decode_body(_body: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Ok(VersionNotSupportedResponse)
    }
    fn encode_body(&self, _buf: &mut BytesMut) {}
}

/// Session Establishment Request, TS29.244, 7.5.2.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionEstablishmentRequest {
    pub node_id: Option<NodeId>,
    pub cp_f_seid: Option<FSeid>,
    pub create_pdrs: Vec<PfcpResult<CreatePdr>>,
    pub create_fars: Vec<PfcpResult<CreateFar>>,
    pub create_qers: Vec<PfcpResult<CreateQer>>,
    pub create_urrs: usize,
    pub pdn_type: Option<PdnType>,
}

impl PfcpMessage for SessionEstablishmentRequest {
    const MESSAGE_TYPE: MessageType = MessageType::SessionEstablishmentRequest;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut m = SessionEstablishmentRequest::default();
        for ie in ies(body) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::NodeId) => m.node_id = single(&ie, limits)?,
                Some(IeType::FSeid) => m.cp_f_seid = single(&ie, limits)?,
                Some(IeType::CreatePdr) => m.create_pdrs.push(CreatePdr::decode(ie.value, limits)),
                Some(IeType::CreateFar) => m.create_fars.push(CreateFar::decode(ie.value, limits)),
                Some(IeType::CreateQer) => m.create_qers.push(CreateQer::decode(ie.value, limits)),
                Some(IeType::CreateUrr) => m.create_urrs += 1,
                Some(IeType::PdnType) => m.pdn_type = single(&ie, limits)?,
                _ => {}
            }
        }
        Ok(m)
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        if let Some(x) = &self.node_id {
            x.encode(buf)
        }
        if let Some(x) = &self.cp_f_seid {
            x.encode(buf)
        }
        encode_rules(&self.create_pdrs, buf);
        encode_rules(&self.create_fars, buf);
        encode_rules(&self.create_qers, buf);
        if let Some(x) = &self.pdn_type {
            x.encode(buf)
        }
    }
}

/// Session Establishment Response, TS29.244, 7.5.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEstablishmentResponse {
    pub node_id: NodeId,
    pub cause: Cause,
    pub up_f_seid: Option<FSeid>,
    pub created_pdrs: Vec<CreatedPdr>,
}

impl PfcpMessage for SessionEstablishmentResponse {
    const MESSAGE_TYPE: MessageType = MessageType::SessionEstablishmentResponse;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut node_id = None;
        let mut cause = None;
        let mut up_f_seid = None;
        let mut created_pdrs = Vec::new();
        for ie in ies(body) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::NodeId) => node_id = single(&ie, limits)?,
                Some(IeType::Cause) => cause = single(&ie, limits)?,
                Some(IeType::FSeid) => up_f_seid = single(&ie, limits)?,
                Some(IeType::CreatedPdr) => {
                    created_pdrs.push(CreatedPdr::decode(ie.value, limits)?)
                }
                _ => {}
            }
        }
        Ok(SessionEstablishmentResponse {
            node_id: mandatory(node_id, "Node ID")?,
            cause: mandatory(cause, "Cause")?,
            up_f_seid,
            created_pdrs,
        })
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        self.node_id.encode(buf);
        self.cause.encode(buf);
        if let Some(x) = &self.up_f_seid {
            x.encode(buf)
        }
        for x in &self.created_pdrs {
            x.encode(buf)
        }
    }
}

/// Session Modification Request, TS29.244, 7.5.4.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionModificationRequest {
    pub cp_f_seid: Option<FSeid>,
    pub remove_pdrs: Vec<PfcpResult<RemovePdr>>,
    pub remove_fars: Vec<PfcpResult<RemoveFar>>,
    pub remove_qers: Vec<PfcpResult<RemoveQer>>,
    pub create_pdrs: Vec<PfcpResult<CreatePdr>>,
    pub create_fars: Vec<PfcpResult<CreateFar>>,
    pub create_qers: Vec<PfcpResult<CreateQer>>,
    pub update_pdrs: Vec<PfcpResult<UpdatePdr>>,
    pub update_fars: Vec<PfcpResult<UpdateFar>>,
    pub update_qers: Vec<PfcpResult<UpdateQer>>,
    /// Count of Create, Update and Remove URR IEs, which are not supported.
    pub urr_operations: usize,
}

impl PfcpMessage for SessionModificationRequest {
    const MESSAGE_TYPE: MessageType = MessageType::SessionModificationRequest;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut m = SessionModificationRequest::default();
        for ie in ies(body) {
            let ie = ie?;
            let value = ie.value;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::FSeid) => m.cp_f_seid = single(&ie, limits)?,
                Some(IeType::RemovePdr) => m.remove_pdrs.push(RemovePdr::decode(value, limits)),
                Some(IeType::RemoveFar) => m.remove_fars.push(RemoveFar::decode(value, limits)),
                Some(IeType::RemoveQer) => m.remove_qers.push(RemoveQer::decode(value, limits)),
                Some(IeType::CreatePdr) => m.create_pdrs.push(CreatePdr::decode(value, limits)),
                Some(IeType::CreateFar) => m.create_fars.push(CreateFar::decode(value, limits)),
                Some(IeType::CreateQer) => m.create_qers.push(CreateQer::decode(value, limits)),
                Some(IeType::UpdatePdr) => m.update_pdrs.push(UpdatePdr::decode(value, limits)),
                Some(IeType::UpdateFar) => m.update_fars.push(UpdateFar::decode(value, limits)),
                Some(IeType::UpdateQer) => m.update_qers.push(UpdateQer::decode(value, limits)),
                Some(IeType::CreateUrr | IeType::UpdateUrr | IeType::RemoveUrr) => {
                    m.urr_operations += 1
                }
                _ => {}
            }
        }
        Ok(m)
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        if let Some(x) = &self.cp_f_seid {
            x.encode(buf)
        }
        encode_rules(&self.remove_pdrs, buf);
        encode_rules(&self.remove_fars, buf);
        encode_rules(&self.remove_qers, buf);
        encode_rules(&self.create_pdrs, buf);
        encode_rules(&self.create_fars, buf);
        encode_rules(&self.create_qers, buf);
        encode_rules(&self.update_pdrs, buf);
        encode_rules(&self.update_fars, buf);
        encode_rules(&self.update_qers, buf);
    }
}

macro_rules! cause_only {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub cause: Cause,
        }

        impl PfcpMessage for $name {
            const MESSAGE_TYPE: MessageType = MessageType::$name;
            fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
                Ok($name {
                    cause: mandatory(NodeFields::decode(body, limits)?.cause, "Cause")?,
                })
            }
            fn encode_body(&self, buf: &mut BytesMut) {
                self.cause.encode(buf)
            }
        }
    };
}

/// Session Modification Response, TS29.244, 7.5.5.  Carries a Created PDR for each PDR
/// created by the request whose F-TEID was allocated by the UP function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionModificationResponse {
    pub cause: Cause,
    pub created_pdrs: Vec<CreatedPdr>,
}

impl SessionModificationResponse {
    pub fn with_cause(cause: Cause) -> Self {
        SessionModificationResponse {
            cause,
            created_pdrs: vec![],
        }
    }
}

impl PfcpMessage for SessionModificationResponse {
    const MESSAGE_TYPE: MessageType = MessageType::SessionModificationResponse;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut cause = None;
        let mut created_pdrs = Vec::new();
        for ie in ies(body) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::Cause) => cause = single(&ie, limits)?,
                Some(IeType::CreatedPdr) => {
                    created_pdrs.push(CreatedPdr::decode(ie.value, limits)?)
                }
                _ => {}
            }
        }
        Ok(SessionModificationResponse {
            cause: mandatory(cause, "Cause")?,
            created_pdrs,
        })
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        self.cause.encode(buf);
        for x in &self.created_pdrs {
            x.encode(buf)
        }
    }
}

// TS29.244, 7.5.7 and 7.5.9
cause_only!(SessionDeletionResponse);
cause_only!(SessionReportResponse);

// TS29.244, 7.5.6
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDeletionRequest;

impl PfcpMessage for SessionDeletionRequest {
    const MESSAGE_TYPE: MessageType = MessageType::SessionDeletionRequest;
    fn decode_body(_body: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Ok(SessionDeletionRequest)
    }
    fn encode_body(&self, _buf: &mut BytesMut) {}
}

/// Session Report Request, TS29.244, 7.5.8.  Only downlink data reports are produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReportRequest {
    pub report_type: ReportType,
    pub downlink_data_report: Option<DownlinkDataReport>,
}

impl SessionReportRequest {
    pub fn downlink_data(pdr_id: PdrId) -> Self {
        SessionReportRequest {
            report_type: ReportType(ReportType::DLDR),
            downlink_data_report: Some(DownlinkDataReport {
                pdr_ids: vec![pdr_id],
            }),
        }
    }
}

impl PfcpMessage for SessionReportRequest {
    const MESSAGE_TYPE: MessageType = MessageType::SessionReportRequest;
    fn decode_body(body: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut report_type = None;
        let mut downlink_data_report = None;
        for ie in ies(body) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::ReportType) => report_type = single(&ie, limits)?,
                Some(IeType::DownlinkDataReport) => downlink_data_report = single(&ie, limits)?,
                _ => {}
            }
        }
        Ok(SessionReportRequest {
            report_type: mandatory(report_type, "Report Type")?,
            downlink_data_report,
        })
    }
    fn encode_body(&self, buf: &mut BytesMut) {
        self.report_type.encode(buf);
        if let Some(x) = &self.downlink_data_report {
            x.encode(buf)
        }
    }
}
