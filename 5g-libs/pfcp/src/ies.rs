//! ies - PFCP information element framing and leaf IE types, TS29.244, 8.1 and 8.2
#![allow(clippy::unusual_byte_groupings)]

use crate::{Cursor, PfcpError, PfcpResult};
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

// TS29.244, table 8.1.2-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum IeType {
    CreatePdr = 1,
    Pdi = 2,
    CreateFar = 3,
    ForwardingParameters = 4,
    CreateUrr = 6,
    CreateQer = 7,
    CreatedPdr = 8,
    UpdatePdr = 9,
    UpdateFar = 10,
    UpdateForwardingParameters = 11,
    UpdateUrr = 13,
    UpdateQer = 14,
    RemovePdr = 15,
    RemoveFar = 16,
    RemoveUrr = 17,
    RemoveQer = 18,
    Cause = 19,
    SourceInterface = 20,
    FTeid = 21,
    NetworkInstance = 22,
    SdfFilter = 23,
    GateStatus = 25,
    Mbr = 26,
    Gbr = 27,
    QerCorrelationId = 28,
    Precedence = 29,
    ReportType = 39,
    ForwardingPolicy = 41,
    DestinationInterface = 42,
    ApplyAction = 44,
    PdrId = 56,
    FSeid = 57,
    NodeId = 60,
    UrrId = 81,
    DownlinkDataReport = 83,
    OuterHeaderCreation = 84,
    UeIpAddress = 93,
    PacketRate = 94,
    OuterHeaderRemoval = 95,
    RecoveryTimeStamp = 96,
    DlFlowLevelMarking = 97,
    ActivatePredefinedRules = 106,
    DeactivatePredefinedRules = 107,
    FarId = 108,
    QerId = 109,
    PdnType = 113,
    Rqi = 123,
    Qfi = 124,
}

impl IeType {
    pub fn from_u16(value: u16) -> Option<Self> {
        use IeType::*;
        Some(match value {
            1 => CreatePdr,
            2 => Pdi,
            3 => CreateFar,
            4 => ForwardingParameters,
            6 => CreateUrr,
            7 => CreateQer,
            8 => CreatedPdr,
            9 => UpdatePdr,
            10 => UpdateFar,
            11 => UpdateForwardingParameters,
            13 => UpdateUrr,
            14 => UpdateQer,
            15 => RemovePdr,
            16 => RemoveFar,
            17 => RemoveUrr,
            18 => RemoveQer,
            19 => Cause,
            20 => SourceInterface,
            21 => FTeid,
            22 => NetworkInstance,
            23 => SdfFilter,
            25 => GateStatus,
            26 => Mbr,
            27 => Gbr,
            28 => QerCorrelationId,
            29 => Precedence,
            39 => ReportType,
            41 => ForwardingPolicy,
            42 => DestinationInterface,
            44 => ApplyAction,
            56 => PdrId,
            57 => FSeid,
            60 => NodeId,
            81 => UrrId,
            83 => DownlinkDataReport,
            84 => OuterHeaderCreation,
            93 => UeIpAddress,
            94 => PacketRate,
            95 => OuterHeaderRemoval,
            96 => RecoveryTimeStamp,
            97 => DlFlowLevelMarking,
            106 => ActivatePredefinedRules,
            107 => DeactivatePredefinedRules,
            108 => FarId,
            109 => QerId,
            113 => PdnType,
            123 => Rqi,
            124 => Qfi,
            _ => return None,
        })
    }
}

/// Capacity limits applied to variable length fields while decoding.
#[derive(Debug, Clone)]
pub struct DecodeLimits {
    pub max_flow_description_len: usize,
    pub max_network_instance_len: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        DecodeLimits {
            max_flow_description_len: 256,
            max_network_instance_len: 100,
        }
    }
}

/// One type-length-value element, borrowed from the message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawIe<'a> {
    pub ie_type: u16,
    pub value: &'a [u8],
}

/// Walks a sequence of IEs.  Stops after the first framing error, since the remaining
/// bytes can no longer be delimited.
pub struct IeIter<'a> {
    cursor: Cursor<'a>,
    failed: bool,
}

pub fn ies(body: &[u8]) -> IeIter<'_> {
    IeIter {
        cursor: Cursor::new(body),
        failed: false,
    }
}

impl<'a> IeIter<'a> {
    fn next_ie(&mut self) -> PfcpResult<RawIe<'a>> {
        let ie_type = self.cursor.read_u16()?;
        let length = self.cursor.read_u16()? as usize;
        let value = self.cursor.read_bytes(length)?;
        Ok(RawIe { ie_type, value })
    }
}

impl<'a> Iterator for IeIter<'a> {
    type Item = PfcpResult<RawIe<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_empty() {
            return None;
        }
        let ie = self.next_ie();
        self.failed = ie.is_err();
        Some(ie)
    }
}

/// Write an IE header, let `f` write the value, then fill in the length.
pub fn put_ie(buf: &mut BytesMut, ie_type: IeType, f: impl FnOnce(&mut BytesMut)) {
    buf.put_u16(ie_type as u16);
    let length_pos = buf.len();
    buf.put_u16(0);
    f(buf);
    let length = (buf.len() - length_pos - 2) as u16;
    buf[length_pos..length_pos + 2].copy_from_slice(&length.to_be_bytes());
}

/// An information element that can be decoded from its value bytes and encoded as a full TLV.
pub trait Ie: Sized {
    const IE_TYPE: IeType;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self>;
    fn encode_value(&self, buf: &mut BytesMut);

    fn encode(&self, buf: &mut BytesMut) {
        put_ie(buf, Self::IE_TYPE, |b| self.encode_value(b))
    }
}

macro_rules! integer_ie {
    ($name:ident, $ty:ty, $ie:ident, $read:ident, $put:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub $ty);

        impl Ie for $name {
            const IE_TYPE: IeType = IeType::$ie;
            fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
                Ok($name(Cursor::new(value).$read()?))
            }
            fn encode_value(&self, buf: &mut BytesMut) {
                buf.$put(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_ie!(PdrId, u16, PdrId, read_u16, put_u16);
integer_ie!(FarId, u32, FarId, read_u32, put_u32);
integer_ie!(QerId, u32, QerId, read_u32, put_u32);
integer_ie!(UrrId, u32, UrrId, read_u32, put_u32);
integer_ie!(Precedence, u32, Precedence, read_u32, put_u32);
integer_ie!(QerCorrelationId, u32, QerCorrelationId, read_u32, put_u32);
integer_ie!(RecoveryTimeStamp, u32, RecoveryTimeStamp, read_u32, put_u32);

// TS29.244, 8.2.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cause {
    RequestAccepted = 1,
    RequestRejected = 64,
    SessionContextNotFound = 65,
    MandatoryIeMissing = 66,
    ConditionalIeMissing = 67,
    InvalidLength = 68,
    MandatoryIeIncorrect = 69,
    NoEstablishedPfcpAssociation = 72,
    RuleCreationModificationFailure = 73,
    NoResourcesAvailable = 75,
    ServiceNotSupported = 76,
    SystemFailure = 77,
}

impl Cause {
    pub fn is_accepted(&self) -> bool {
        *self == Cause::RequestAccepted
    }
}

impl TryFrom<u8> for Cause {
    type Error = PfcpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Cause::*;
        Ok(match value {
            1 => RequestAccepted,
            64 => RequestRejected,
            65 => SessionContextNotFound,
            66 => MandatoryIeMissing,
            67 => ConditionalIeMissing,
            68 => InvalidLength,
            69 => MandatoryIeIncorrect,
            72 => NoEstablishedPfcpAssociation,
            73 => RuleCreationModificationFailure,
            75 => NoResourcesAvailable,
            76 => ServiceNotSupported,
            77 => SystemFailure,
            x => {
                return Err(PfcpError::InvalidValue {
                    field: "Cause",
                    value: x as u32,
                });
            }
        })
    }
}

impl Ie for Cause {
    const IE_TYPE: IeType = IeType::Cause;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Cause::try_from(Cursor::new(value).read_u8()?)
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u8(*self as u8)
    }
}

// TS29.244, 8.2.38
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeId {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Fqdn(String),
}

impl From<IpAddr> for NodeId {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(x) => NodeId::Ipv4(x),
            IpAddr::V6(x) => NodeId::Ipv6(x),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Ipv4(x) => write!(f, "{x}"),
            NodeId::Ipv6(x) => write!(f, "{x}"),
            NodeId::Fqdn(x) => write!(f, "{x}"),
        }
    }
}

impl Ie for NodeId {
    const IE_TYPE: IeType = IeType::NodeId;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        match c.read_u8()? & 0x0f {
            0 => Ok(NodeId::Ipv4(c.read_ipv4()?)),
            1 => Ok(NodeId::Ipv6(c.read_ipv6()?)),
            2 => Ok(NodeId::Fqdn(decode_dns_name(c.rest()))),
            x => Err(PfcpError::InvalidValue {
                field: "Node ID type",
                value: x as u32,
            }),
        }
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        match self {
            NodeId::Ipv4(x) => {
                buf.put_u8(0);
                buf.put_slice(&x.octets());
            }
            NodeId::Ipv6(x) => {
                buf.put_u8(1);
                buf.put_slice(&x.octets());
            }
            NodeId::Fqdn(x) => {
                buf.put_u8(2);
                encode_dns_name(x, buf);
            }
        }
    }
}

// FQDN and Network Instance use DNS label encoding, TS23.003, 19.4.2.
fn decode_dns_name(bytes: &[u8]) -> String {
    let mut labels = Vec::new();
    let mut c = Cursor::new(bytes);
    while let Ok(len) = c.read_u8() {
        match c.read_bytes(len as usize) {
            Ok(label) => labels.push(String::from_utf8_lossy(label).into_owned()),
            Err(_) => {
                // Not label encoded - treat the whole thing as text.
                return String::from_utf8_lossy(bytes).into_owned();
            }
        }
    }
    labels.join(".")
}

fn encode_dns_name(name: &str, buf: &mut BytesMut) {
    for label in name.split('.') {
        buf.put_u8(label.len() as u8);
        buf.put_slice(label.as_bytes());
    }
}

// TS29.244, 8.2.37
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FSeid {
    pub seid: u64,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl Ie for FSeid {
    const IE_TYPE: IeType = IeType::FSeid;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        let flags = c.read_u8()?;
        let v6 = flags & 0b0000_00_0_1 != 0;
        let v4 = flags & 0b0000_00_1_0 != 0;
        if !v4 && !v6 {
            return Err(PfcpError::InconsistentAddressFlags("F-SEID"));
        }
        let seid = c.read_u64()?;
        let ipv4 = if v4 { Some(c.read_ipv4()?) } else { None };
        let ipv6 = if v6 { Some(c.read_ipv6()?) } else { None };
        Ok(FSeid { seid, ipv4, ipv6 })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        let mut flags = 0;
        if self.ipv6.is_some() {
            flags |= 0b0000_00_0_1;
        }
        if self.ipv4.is_some() {
            flags |= 0b0000_00_1_0;
        }
        buf.put_u8(flags);
        buf.put_u64(self.seid);
        if let Some(x) = self.ipv4 {
            buf.put_slice(&x.octets());
        }
        if let Some(x) = self.ipv6 {
            buf.put_slice(&x.octets());
        }
    }
}

/// Fully qualified TEID, TS29.244, 8.2.3.  When `choose` is set the CP function is asking
/// the UP function to allocate the TEID, and no TEID or address is present on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FTeid {
    pub teid: u32,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub choose: bool,
    pub choose_v4: bool,
    pub choose_v6: bool,
    pub choose_id: Option<u8>,
}

impl FTeid {
    pub fn new_ipv4(teid: u32, addr: Ipv4Addr) -> Self {
        FTeid {
            teid,
            ipv4: Some(addr),
            ..Default::default()
        }
    }
}

impl Ie for FTeid {
    const IE_TYPE: IeType = IeType::FTeid;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        let flags = c.read_u8()?;
        let v4 = flags & 0b0000_0_0_0_1 != 0;
        let v6 = flags & 0b0000_0_0_1_0 != 0;
        let ch = flags & 0b0000_0_1_0_0 != 0;
        let chid = flags & 0b0000_1_0_0_0 != 0;
        if ch {
            if !v4 && !v6 {
                return Err(PfcpError::InconsistentAddressFlags("F-TEID"));
            }
            let choose_id = if chid { Some(c.read_u8()?) } else { None };
            return Ok(FTeid {
                choose: true,
                choose_v4: v4,
                choose_v6: v6,
                choose_id,
                ..Default::default()
            });
        }
        if chid || (!v4 && !v6) {
            return Err(PfcpError::InconsistentAddressFlags("F-TEID"));
        }
        let teid = c.read_u32()?;
        let ipv4 = if v4 { Some(c.read_ipv4()?) } else { None };
        let ipv6 = if v6 { Some(c.read_ipv6()?) } else { None };
        Ok(FTeid {
            teid,
            ipv4,
            ipv6,
            ..Default::default()
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        if self.choose {
            let mut flags = 0b0000_0_1_0_0;
            if self.choose_v4 {
                flags |= 0b0000_0_0_0_1;
            }
            if self.choose_v6 {
                flags |= 0b0000_0_0_1_0;
            }
            if self.choose_id.is_some() {
                flags |= 0b0000_1_0_0_0;
            }
            buf.put_u8(flags);
            if let Some(id) = self.choose_id {
                buf.put_u8(id);
            }
            return;
        }
        let mut flags = 0;
        if self.ipv4.is_some() {
            flags |= 0b0000_0_0_0_1;
        }
        if self.ipv6.is_some() {
            flags |= 0b0000_0_0_1_0;
        }
        buf.put_u8(flags);
        buf.put_u32(self.teid);
        if let Some(x) = self.ipv4 {
            buf.put_slice(&x.octets());
        }
        if let Some(x) = self.ipv6 {
            buf.put_slice(&x.octets());
        }
    }
}

// TS29.244, 8.2.62
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UeIpAddress {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    /// S/D flag - set when the address is a destination address.
    pub is_destination: bool,
    pub ipv6_prefix_delegation_bits: Option<u8>,
}

impl Ie for UeIpAddress {
    const IE_TYPE: IeType = IeType::UeIpAddress;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        let flags = c.read_u8()?;
        let v6 = flags & 0b0000_0_0_0_1 != 0;
        let v4 = flags & 0b0000_0_0_1_0 != 0;
        let is_destination = flags & 0b0000_0_1_0_0 != 0;
        let ipv6d = flags & 0b0000_1_0_0_0 != 0;
        if ipv6d && !v6 {
            return Err(PfcpError::InconsistentAddressFlags("UE IP Address"));
        }
        let ipv4 = if v4 { Some(c.read_ipv4()?) } else { None };
        let ipv6 = if v6 { Some(c.read_ipv6()?) } else { None };
        let ipv6_prefix_delegation_bits = if ipv6d { Some(c.read_u8()?) } else { None };
        Ok(UeIpAddress {
            ipv4,
            ipv6,
            is_destination,
            ipv6_prefix_delegation_bits,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        let mut flags = 0;
        if self.ipv6.is_some() {
            flags |= 0b0000_0_0_0_1;
        }
        if self.ipv4.is_some() {
            flags |= 0b0000_0_0_1_0;
        }
        if self.is_destination {
            flags |= 0b0000_0_1_0_0;
        }
        if self.ipv6_prefix_delegation_bits.is_some() {
            flags |= 0b0000_1_0_0_0;
        }
        buf.put_u8(flags);
        if let Some(x) = self.ipv4 {
            buf.put_slice(&x.octets());
        }
        if let Some(x) = self.ipv6 {
            buf.put_slice(&x.octets());
        }
        if let Some(x) = self.ipv6_prefix_delegation_bits {
            buf.put_u8(x);
        }
    }
}

macro_rules! interface_ie {
    ($name:ident, $ie:ident, $field:literal, [$($variant:ident = $value:literal),+]) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl Ie for $name {
            const IE_TYPE: IeType = IeType::$ie;
            fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
                match Cursor::new(value).read_u8()? & 0x0f {
                    $($value => Ok($name::$variant),)+
                    x => Err(PfcpError::InvalidValue {
                        field: $field,
                        value: x as u32,
                    }),
                }
            }
            fn encode_value(&self, buf: &mut BytesMut) {
                buf.put_u8(*self as u8)
            }
        }
    };
}

// TS29.244, 8.2.2
interface_ie!(SourceInterface, SourceInterface, "Source Interface",
    [Access = 0, Core = 1, SgiLan = 2, CpFunction = 3, VnInternal = 4]);

// TS29.244, 8.2.24
interface_ie!(DestinationInterface, DestinationInterface, "Destination Interface",
    [Access = 0, Core = 1, SgiLan = 2, CpFunction = 3, LiFunction = 4, VnInternal = 5]);

// TS29.244, 8.2.4.  The text is DNS label encoded or a plain string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInstance(pub String);

impl Ie for NetworkInstance {
    const IE_TYPE: IeType = IeType::NetworkInstance;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        if value.len() > limits.max_network_instance_len {
            return Err(PfcpError::FieldTooLong {
                field: "Network Instance",
                length: value.len(),
                capacity: limits.max_network_instance_len,
            });
        }
        Ok(NetworkInstance(decode_dns_name(value)))
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        encode_dns_name(&self.0, buf)
    }
}

/// SDF filter, TS29.244, 8.2.5.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SdfFilter {
    pub flow_description: Option<String>,
    pub tos_traffic_class: Option<u16>,
    pub security_parameter_index: Option<u32>,
    pub flow_label: Option<u32>,
    pub sdf_filter_id: Option<u32>,
}

impl Ie for SdfFilter {
    const IE_TYPE: IeType = IeType::SdfFilter;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        let flags = c.read_u8()?;
        c.skip(1)?; // spare

        // | spare | BID | FL | SPI | TTC | FD |
        let mut filter = SdfFilter::default();
        if flags & 0b000_0_0_0_0_1 != 0 {
            let length = c.read_u16()? as usize;
            if length > limits.max_flow_description_len {
                return Err(PfcpError::FieldTooLong {
                    field: "Flow Description",
                    length,
                    capacity: limits.max_flow_description_len,
                });
            }
            let text = c.read_bytes(length)?;
            filter.flow_description = Some(String::from_utf8_lossy(text).into_owned());
        }
        if flags & 0b000_0_0_0_1_0 != 0 {
            filter.tos_traffic_class = Some(c.read_u16()?);
        }
        if flags & 0b000_0_0_1_0_0 != 0 {
            filter.security_parameter_index = Some(c.read_u32()?);
        }
        if flags & 0b000_0_1_0_0_0 != 0 {
            filter.flow_label = Some(c.read_u24()?);
        }
        if flags & 0b000_1_0_0_0_0 != 0 {
            filter.sdf_filter_id = Some(c.read_u32()?);
        }
        // Anything further belongs to fields we do not know about.
        Ok(filter)
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        let mut flags = 0;
        if self.flow_description.is_some() {
            flags |= 0b000_0_0_0_0_1;
        }
        if self.tos_traffic_class.is_some() {
            flags |= 0b000_0_0_0_1_0;
        }
        if self.security_parameter_index.is_some() {
            flags |= 0b000_0_0_1_0_0;
        }
        if self.flow_label.is_some() {
            flags |= 0b000_0_1_0_0_0;
        }
        if self.sdf_filter_id.is_some() {
            flags |= 0b000_1_0_0_0_0;
        }
        buf.put_u8(flags);
        buf.put_u8(0);
        if let Some(x) = &self.flow_description {
            buf.put_u16(x.len() as u16);
            buf.put_slice(x.as_bytes());
        }
        if let Some(x) = self.tos_traffic_class {
            buf.put_u16(x);
        }
        if let Some(x) = self.security_parameter_index {
            buf.put_u32(x);
        }
        if let Some(x) = self.flow_label {
            buf.put_uint(x as u64 & 0x00ff_ffff, 3);
        }
        if let Some(x) = self.sdf_filter_id {
            buf.put_u32(x);
        }
    }
}

/// Apply action flags, TS29.244, 8.2.26.  The bits are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyAction(pub u8);

impl ApplyAction {
    pub const DROP: u8 = 0b000_0_0_0_0_1;
    pub const FORW: u8 = 0b000_0_0_0_1_0;
    pub const BUFF: u8 = 0b000_0_0_1_0_0;
    pub const NOCP: u8 = 0b000_0_1_0_0_0;
    pub const DUPL: u8 = 0b000_1_0_0_0_0;

    pub fn drop(&self) -> bool {
        self.0 & Self::DROP != 0
    }
    pub fn forward(&self) -> bool {
        self.0 & Self::FORW != 0
    }
    pub fn buffer(&self) -> bool {
        self.0 & Self::BUFF != 0
    }
    pub fn notify_cp(&self) -> bool {
        self.0 & Self::NOCP != 0
    }
    pub fn duplicate(&self) -> bool {
        self.0 & Self::DUPL != 0
    }
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::DROP, "DROP"),
            (Self::FORW, "FORW"),
            (Self::BUFF, "BUFF"),
            (Self::NOCP, "NOCP"),
            (Self::DUPL, "DUPL"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", set.join("|"))
        }
    }
}

impl Ie for ApplyAction {
    const IE_TYPE: IeType = IeType::ApplyAction;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        // Later releases add a second octet, which we do not use.
        Ok(ApplyAction(Cursor::new(value).read_u8()?))
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u8(self.0)
    }
}

// TS29.244, 8.2.41
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingPolicy(pub String);

impl Ie for ForwardingPolicy {
    const IE_TYPE: IeType = IeType::ForwardingPolicy;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        let length = c.read_u8()? as usize;
        let id = c.read_bytes(length)?;
        Ok(ForwardingPolicy(String::from_utf8_lossy(id).into_owned()))
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u8(self.0.len() as u8);
        buf.put_slice(self.0.as_bytes());
    }
}

/// Outer header creation, TS29.244, 8.2.56.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OuterHeaderCreation {
    pub description: u16,
    pub teid: Option<u32>,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub port: Option<u16>,
}

impl OuterHeaderCreation {
    pub const GTPU_UDP_IPV4: u16 = 0b0000_0001_0000_0000;
    pub const GTPU_UDP_IPV6: u16 = 0b0000_0010_0000_0000;
    pub const UDP_IPV4: u16 = 0b0000_0100_0000_0000;
    pub const UDP_IPV6: u16 = 0b0000_1000_0000_0000;
    pub const IPV4: u16 = 0b0001_0000_0000_0000;
    pub const IPV6: u16 = 0b0010_0000_0000_0000;

    pub fn gtpu_ipv4(teid: u32, addr: Ipv4Addr) -> Self {
        OuterHeaderCreation {
            description: Self::GTPU_UDP_IPV4,
            teid: Some(teid),
            ipv4: Some(addr),
            ..Default::default()
        }
    }

    pub fn is_gtpu_ipv4(&self) -> bool {
        self.description & Self::GTPU_UDP_IPV4 != 0
    }

    fn has(&self, bits: u16) -> bool {
        self.description & bits != 0
    }
}

impl Ie for OuterHeaderCreation {
    const IE_TYPE: IeType = IeType::OuterHeaderCreation;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        let mut ohc = OuterHeaderCreation {
            description: c.read_u16()?,
            ..Default::default()
        };
        if ohc.has(Self::GTPU_UDP_IPV4 | Self::GTPU_UDP_IPV6) {
            ohc.teid = Some(c.read_u32()?);
        }
        if ohc.has(Self::GTPU_UDP_IPV4 | Self::UDP_IPV4 | Self::IPV4) {
            ohc.ipv4 = Some(c.read_ipv4()?);
        }
        if ohc.has(Self::GTPU_UDP_IPV6 | Self::UDP_IPV6 | Self::IPV6) {
            ohc.ipv6 = Some(c.read_ipv6()?);
        }
        if ohc.has(Self::UDP_IPV4 | Self::UDP_IPV6) {
            ohc.port = Some(c.read_u16()?);
        }
        Ok(ohc)
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u16(self.description);
        if let Some(x) = self.teid {
            buf.put_u32(x);
        }
        if let Some(x) = self.ipv4 {
            buf.put_slice(&x.octets());
        }
        if let Some(x) = self.ipv6 {
            buf.put_slice(&x.octets());
        }
        if let Some(x) = self.port {
            buf.put_u16(x);
        }
    }
}

/// Outer header removal description, TS29.244, 8.2.64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterHeaderRemoval {
    GtpuUdpIpv4,
    GtpuUdpIpv6,
    UdpIpv4,
    UdpIpv6,
    Ipv4,
    Ipv6,
    GtpuUdpIp,
    VlanSTag,
    SAndCTag,
    Other(u8),
}

impl From<u8> for OuterHeaderRemoval {
    fn from(value: u8) -> Self {
        use OuterHeaderRemoval::*;
        match value {
            0 => GtpuUdpIpv4,
            1 => GtpuUdpIpv6,
            2 => UdpIpv4,
            3 => UdpIpv6,
            4 => Ipv4,
            5 => Ipv6,
            6 => GtpuUdpIp,
            7 => VlanSTag,
            8 => SAndCTag,
            x => Other(x),
        }
    }
}

impl From<OuterHeaderRemoval> for u8 {
    fn from(value: OuterHeaderRemoval) -> Self {
        use OuterHeaderRemoval::*;
        match value {
            GtpuUdpIpv4 => 0,
            GtpuUdpIpv6 => 1,
            UdpIpv4 => 2,
            UdpIpv6 => 3,
            Ipv4 => 4,
            Ipv6 => 5,
            GtpuUdpIp => 6,
            VlanSTag => 7,
            SAndCTag => 8,
            Other(x) => x,
        }
    }
}

impl Ie for OuterHeaderRemoval {
    const IE_TYPE: IeType = IeType::OuterHeaderRemoval;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Ok(Cursor::new(value).read_u8()?.into())
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u8((*self).into())
    }
}

// TS29.244, 8.2.7.  Each direction is a 2 bit field where 0 means open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStatus {
    pub uplink_open: bool,
    pub downlink_open: bool,
}

impl Default for GateStatus {
    fn default() -> Self {
        GateStatus {
            uplink_open: true,
            downlink_open: true,
        }
    }
}

impl Ie for GateStatus {
    const IE_TYPE: IeType = IeType::GateStatus;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let x = Cursor::new(value).read_u8()?;
        Ok(GateStatus {
            uplink_open: (x >> 2) & 0b11 == 0,
            downlink_open: x & 0b11 == 0,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        let ul = if self.uplink_open { 0 } else { 1 };
        let dl = if self.downlink_open { 0 } else { 1 };
        buf.put_u8((ul << 2) | dl)
    }
}

/// MBR and GBR, TS29.244, 8.2.8 and 8.2.9.  Rates are in kbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bitrate {
    pub uplink: u64,
    pub downlink: u64,
}

impl Bitrate {
    fn decode_rates(value: &[u8]) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        Ok(Bitrate {
            uplink: c.read_u40()?,
            downlink: c.read_u40()?,
        })
    }
    fn encode_rates(&self, buf: &mut BytesMut) {
        buf.put_uint(self.uplink & 0xff_ffff_ffff, 5);
        buf.put_uint(self.downlink & 0xff_ffff_ffff, 5);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mbr(pub Bitrate);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gbr(pub Bitrate);

impl Ie for Mbr {
    const IE_TYPE: IeType = IeType::Mbr;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Ok(Mbr(Bitrate::decode_rates(value)?))
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.0.encode_rates(buf)
    }
}

impl Ie for Gbr {
    const IE_TYPE: IeType = IeType::Gbr;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Ok(Gbr(Bitrate::decode_rates(value)?))
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.0.encode_rates(buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub time_unit: u8,
    pub max_packets: u16,
}

impl RateLimit {
    fn decode(c: &mut Cursor) -> PfcpResult<Self> {
        Ok(RateLimit {
            time_unit: c.read_u8()? & 0b111,
            max_packets: c.read_u16()?,
        })
    }
}

// TS29.244, 8.2.68
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketRate {
    pub uplink: Option<RateLimit>,
    pub downlink: Option<RateLimit>,
}

impl Ie for PacketRate {
    const IE_TYPE: IeType = IeType::PacketRate;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        let flags = c.read_u8()?;
        let uplink = if flags & 0b01 != 0 {
            Some(RateLimit::decode(&mut c)?)
        } else {
            None
        };
        let downlink = if flags & 0b10 != 0 {
            Some(RateLimit::decode(&mut c)?)
        } else {
            None
        };
        Ok(PacketRate { uplink, downlink })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        let mut flags = 0;
        if self.uplink.is_some() {
            flags |= 0b01;
        }
        if self.downlink.is_some() {
            flags |= 0b10;
        }
        buf.put_u8(flags);
        for limit in [self.uplink, self.downlink].into_iter().flatten() {
            buf.put_u8(limit.time_unit);
            buf.put_u16(limit.max_packets);
        }
    }
}

// TS29.244, 8.2.69
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DlFlowLevelMarking {
    pub tos_traffic_class: Option<u16>,
    pub service_class_indicator: Option<u16>,
}

impl Ie for DlFlowLevelMarking {
    const IE_TYPE: IeType = IeType::DlFlowLevelMarking;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut c = Cursor::new(value);
        let flags = c.read_u8()?;
        let tos_traffic_class = if flags & 0b01 != 0 {
            Some(c.read_u16()?)
        } else {
            None
        };
        let service_class_indicator = if flags & 0b10 != 0 {
            Some(c.read_u16()?)
        } else {
            None
        };
        Ok(DlFlowLevelMarking {
            tos_traffic_class,
            service_class_indicator,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        let mut flags = 0;
        if self.tos_traffic_class.is_some() {
            flags |= 0b01;
        }
        if self.service_class_indicator.is_some() {
            flags |= 0b10;
        }
        buf.put_u8(flags);
        for x in [self.tos_traffic_class, self.service_class_indicator]
            .into_iter()
            .flatten()
        {
            buf.put_u16(x);
        }
    }
}

// TS29.244, 8.2.89
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qfi(pub u8);

impl Ie for Qfi {
    const IE_TYPE: IeType = IeType::Qfi;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Ok(Qfi(Cursor::new(value).read_u8()? & 0b0011_1111))
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u8(self.0 & 0b0011_1111)
    }
}

// TS29.244, 8.2.88
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rqi(pub bool);

impl Ie for Rqi {
    const IE_TYPE: IeType = IeType::Rqi;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Ok(Rqi(Cursor::new(value).read_u8()? & 1 != 0))
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u8(self.0 as u8)
    }
}

// TS29.244, 8.2.79
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdnType(pub u8);

impl PdnType {
    pub const IPV4: u8 = 1;
    pub const IPV6: u8 = 2;
    pub const IPV4V6: u8 = 3;
    pub const NON_IP: u8 = 4;
    pub const ETHERNET: u8 = 5;
}

impl Ie for PdnType {
    const IE_TYPE: IeType = IeType::PdnType;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        match Cursor::new(value).read_u8()? & 0b111 {
            x @ 1..=5 => Ok(PdnType(x)),
            x => Err(PfcpError::InvalidValue {
                field: "PDN Type",
                value: x as u32,
            }),
        }
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u8(self.0)
    }
}

// TS29.244, 8.2.21
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportType(pub u8);

impl ReportType {
    pub const DLDR: u8 = 0b0000_0001;
}

impl Ie for ReportType {
    const IE_TYPE: IeType = IeType::ReportType;
    fn decode(value: &[u8], _limits: &DecodeLimits) -> PfcpResult<Self> {
        Ok(ReportType(Cursor::new(value).read_u8()?))
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        buf.put_u8(self.0)
    }
}

// TS29.244, 8.2.72 - the name of a rule predefined in the UP function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredefinedRules(pub String);

impl PredefinedRules {
    pub fn decode_text(value: &[u8]) -> Self {
        PredefinedRules(String::from_utf8_lossy(value).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn decode<T: Ie>(value: &[u8]) -> PfcpResult<T> {
        T::decode(value, &DecodeLimits::default())
    }

    #[test]
    fn iterates_ies_and_stops_on_bad_framing() {
        let body = hex!("0038 0002 0001  006c 0004 00000001  0013 0005 01");
        let mut iter = ies(&body);
        assert_eq!(
            iter.next().unwrap().unwrap(),
            RawIe {
                ie_type: 56,
                value: &[0, 1]
            }
        );
        assert_eq!(iter.next().unwrap().unwrap().ie_type, 108);
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn f_teid_ipv4() {
        let fteid: FTeid = decode(&hex!("01 00000064 0a000001")).unwrap();
        assert_eq!(fteid, FTeid::new_ipv4(100, Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn f_teid_choose_with_id() {
        let fteid: FTeid = decode(&hex!("0d 05")).unwrap();
        assert!(fteid.choose);
        assert!(fteid.choose_v4);
        assert_eq!(fteid.choose_id, Some(5));
    }

    #[test]
    fn f_teid_without_address_flags_is_inconsistent() {
        assert_eq!(
            decode::<FTeid>(&hex!("00 00000064")),
            Err(PfcpError::InconsistentAddressFlags("F-TEID"))
        );
        assert_eq!(
            decode::<FTeid>(&hex!("09 00000064 0a000001")),
            Err(PfcpError::InconsistentAddressFlags("F-TEID"))
        );
    }

    #[test]
    fn ue_ip_address_dual_stack() {
        let ue_ip: UeIpAddress =
            decode(&hex!("07 0a2d0001 20010db8000000000000000000000001")).unwrap();
        assert_eq!(ue_ip.ipv4, Some(Ipv4Addr::new(10, 45, 0, 1)));
        assert_eq!(ue_ip.ipv6, Some("2001:db8::1".parse().unwrap()));
        assert!(ue_ip.is_destination);
    }

    #[test]
    fn truncated_ue_ip_address_fails() {
        assert!(matches!(
            decode::<UeIpAddress>(&hex!("03 0a2d0001 2001")),
            Err(PfcpError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn sdf_filter_all_fields() {
        let mut buf = BytesMut::new();
        let filter = SdfFilter {
            flow_description: Some("permit out ip from any to assigned".to_string()),
            tos_traffic_class: Some(0x2000),
            security_parameter_index: Some(7),
            flow_label: Some(0x012345),
            sdf_filter_id: Some(9),
        };
        filter.encode_value(&mut buf);
        assert_eq!(decode::<SdfFilter>(&buf).unwrap(), filter);
    }

    #[test]
    fn sdf_filter_skips_trailing_unknown_fields() {
        let filter: SdfFilter = decode(&hex!("02 00 1234 ffffff")).unwrap();
        assert_eq!(filter.tos_traffic_class, Some(0x1234));
        assert_eq!(filter.flow_description, None);
    }

    #[test]
    fn flow_description_longer_than_capacity_fails() {
        let limits = DecodeLimits {
            max_flow_description_len: 4,
            ..Default::default()
        };
        assert_eq!(
            SdfFilter::decode(&hex!("01 00 0005 6162636465"), &limits),
            Err(PfcpError::FieldTooLong {
                field: "Flow Description",
                length: 5,
                capacity: 4
            })
        );
    }

    #[test]
    fn flow_description_longer_than_ie_fails() {
        assert!(matches!(
            decode::<SdfFilter>(&hex!("01 00 0010 6162")),
            Err(PfcpError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn outer_header_creation_gtpu_ipv4() {
        let ohc: OuterHeaderCreation = decode(&hex!("0100 000000c8 0a000001")).unwrap();
        assert!(ohc.is_gtpu_ipv4());
        assert_eq!(ohc.teid, Some(200));
        assert_eq!(ohc.ipv4, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(ohc.port, None);
    }

    #[test]
    fn outer_header_creation_udp_ipv4_has_port() {
        let ohc: OuterHeaderCreation = decode(&hex!("0400 0a000001 0868")).unwrap();
        assert_eq!(ohc.teid, None);
        assert_eq!(ohc.port, Some(2152));
    }

    #[test]
    fn bitrates_are_forty_bits() {
        let mbr: Mbr = decode(&hex!("0000000100 0000000200")).unwrap();
        assert_eq!(mbr.0.uplink, 256);
        assert_eq!(mbr.0.downlink, 512);
    }

    #[test]
    fn gate_status_closed_uplink() {
        let gate: GateStatus = decode(&hex!("04")).unwrap();
        assert!(!gate.uplink_open);
        assert!(gate.downlink_open);
    }

    #[test]
    fn node_id_fqdn() {
        let node: NodeId = decode(&hex!("02 03736d66 056c6f63616c")).unwrap();
        assert_eq!(node, NodeId::Fqdn("smf.local".to_string()));
    }

    #[test]
    fn apply_action_display() {
        assert_eq!(
            ApplyAction(ApplyAction::BUFF | ApplyAction::NOCP).to_string(),
            "BUFF|NOCP"
        );
    }
}
