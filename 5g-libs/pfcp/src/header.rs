#![allow(clippy::unusual_byte_groupings)]
use crate::{Cursor, PfcpError, PfcpResult};
use bytes::{BufMut, BytesMut};

pub const PFCP_VERSION: u8 = 1;
pub const PFCP_PORT: u16 = 8805; // TS29.244, 4.2.2
pub const PFCP_HEADER_LEN: usize = 8;
pub const PFCP_HEADER_LEN_WITH_SEID: usize = 16;

// TS29.244, table 7.3-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    HeartbeatRequest = 1,
    HeartbeatResponse = 2,
    AssociationSetupRequest = 5,
    AssociationSetupResponse = 6,
    AssociationUpdateRequest = 7,
    AssociationUpdateResponse = 8,
    AssociationReleaseRequest = 9,
    AssociationReleaseResponse = 10,
    VersionNotSupportedResponse = 11,
    SessionEstablishmentRequest = 50,
    SessionEstablishmentResponse = 51,
    SessionModificationRequest = 52,
    SessionModificationResponse = 53,
    SessionDeletionRequest = 54,
    SessionDeletionResponse = 55,
    SessionReportRequest = 56,
    SessionReportResponse = 57,
}

impl TryFrom<u8> for MessageType {
    type Error = PfcpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::HeartbeatRequest,
            2 => Self::HeartbeatResponse,
            5 => Self::AssociationSetupRequest,
            6 => Self::AssociationSetupResponse,
            7 => Self::AssociationUpdateRequest,
            8 => Self::AssociationUpdateResponse,
            9 => Self::AssociationReleaseRequest,
            10 => Self::AssociationReleaseResponse,
            11 => Self::VersionNotSupportedResponse,
            50 => Self::SessionEstablishmentRequest,
            51 => Self::SessionEstablishmentResponse,
            52 => Self::SessionModificationRequest,
            53 => Self::SessionModificationResponse,
            54 => Self::SessionDeletionRequest,
            55 => Self::SessionDeletionResponse,
            56 => Self::SessionReportRequest,
            57 => Self::SessionReportResponse,
            x => return Err(PfcpError::UnknownMessageType(x)),
        })
    }
}

impl MessageType {
    /// Session related messages carry a SEID in their header.
    pub fn has_seid(&self) -> bool {
        (*self as u8) >= 50
    }
}

/// PFCP message header, TS29.244, 7.2.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfcpHeader {
    pub version: u8,
    pub message_type: u8,
    /// Length of the message following the first 4 octets.
    pub length: u16,
    pub seid: Option<u64>,
    pub sequence_number: u32,
    pub priority: Option<u8>,
}

impl PfcpHeader {
    pub fn new(message_type: MessageType, seid: Option<u64>, sequence_number: u32) -> Self {
        PfcpHeader {
            version: PFCP_VERSION,
            message_type: message_type as u8,
            length: 0,
            seid,
            sequence_number,
            priority: None,
        }
    }

    pub fn header_len(&self) -> usize {
        if self.seid.is_some() {
            PFCP_HEADER_LEN_WITH_SEID
        } else {
            PFCP_HEADER_LEN
        }
    }

    /// Decode the header from the front of a datagram.  The version is returned as is so
    /// that the caller can answer with a Version Not Supported Response.
    pub fn decode(cursor: &mut Cursor) -> PfcpResult<Self> {
        let flags = cursor.read_u8()?;
        let version = flags >> 5;
        let mp = flags & 0b000_00_0_1_0 != 0;
        let s = flags & 0b000_00_1_0_0 != 0;
        let message_type = cursor.read_u8()?;
        let length = cursor.read_u16()?;
        let seid = if s { Some(cursor.read_u64()?) } else { None };
        let sequence_number = cursor.read_u24()?;
        let last = cursor.read_u8()?;
        let priority = if mp { Some(last >> 4) } else { None };
        Ok(PfcpHeader {
            version,
            message_type,
            length,
            seid,
            sequence_number,
            priority,
        })
    }

    /// Encode the header.  The length field is computed from `body_len`.
    pub fn encode(&self, body_len: usize, buf: &mut BytesMut) {
        let mut flags = self.version << 5;
        if self.priority.is_some() {
            flags |= 0b000_00_0_1_0;
        }
        if self.seid.is_some() {
            flags |= 0b000_00_1_0_0;
        }
        buf.put_u8(flags);
        buf.put_u8(self.message_type);
        buf.put_u16((self.header_len() - 4 + body_len) as u16);
        if let Some(seid) = self.seid {
            buf.put_u64(seid);
        }
        buf.put_uint(self.sequence_number as u64 & 0x00ff_ffff, 3);
        buf.put_u8(self.priority.map(|p| p << 4).unwrap_or(0));
    }
}

/// Split a datagram into header and IE body, checking the declared length.
pub fn split_message(datagram: &[u8]) -> PfcpResult<(PfcpHeader, &[u8])> {
    let mut cursor = Cursor::new(datagram);
    let header = PfcpHeader::decode(&mut cursor)?;
    if header.version != PFCP_VERSION {
        return Err(PfcpError::VersionNotSupported(header.version));
    }
    let body_len = (header.length as usize)
        .checked_sub(header.header_len() - 4)
        .ok_or(PfcpError::InvalidHeader("length shorter than header"))?;
    let body = cursor.read_bytes(body_len)?;
    Ok((header, body))
}
