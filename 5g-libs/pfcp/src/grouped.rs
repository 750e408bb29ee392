//! grouped - grouped IEs carrying packet detection, forwarding and QoS enforcement rules
//!
//! Each grouped IE is decoded independently.  A failure inside one rule is reported for that
//! rule alone, and IEs we do not recognize are skipped.

use crate::ies::*;
use crate::{PfcpError, PfcpResult};
use bytes::BytesMut;

fn encode_opt<T: Ie>(ie: &Option<T>, buf: &mut BytesMut) {
    if let Some(x) = ie {
        x.encode(buf)
    }
}

fn encode_all<T: Ie>(ies: &[T], buf: &mut BytesMut) {
    for x in ies {
        x.encode(buf)
    }
}

fn mandatory<T>(ie: Option<T>, name: &'static str) -> PfcpResult<T> {
    ie.ok_or(PfcpError::MissingMandatoryIe(name))
}

/// Packet detection information, TS29.244, 7.5.2.2-2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdi {
    pub source_interface: SourceInterface,
    pub local_f_teid: Option<FTeid>,
    pub network_instance: Option<NetworkInstance>,
    pub ue_ip_address: Option<UeIpAddress>,
    pub sdf_filters: Vec<SdfFilter>,
    pub qfi: Option<Qfi>,
}

impl Pdi {
    pub fn new(source_interface: SourceInterface) -> Self {
        Pdi {
            source_interface,
            local_f_teid: None,
            network_instance: None,
            ue_ip_address: None,
            sdf_filters: Vec::new(),
            qfi: None,
        }
    }
}

impl Ie for Pdi {
    const IE_TYPE: IeType = IeType::Pdi;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut source_interface = None;
        let mut local_f_teid = None;
        let mut network_instance = None;
        let mut ue_ip_address = None;
        let mut sdf_filters = Vec::new();
        let mut qfi = None;
        for ie in ies(value) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::SourceInterface) => {
                    source_interface = Some(SourceInterface::decode(ie.value, limits)?)
                }
                Some(IeType::FTeid) => local_f_teid = Some(FTeid::decode(ie.value, limits)?),
                Some(IeType::NetworkInstance) => {
                    network_instance = Some(NetworkInstance::decode(ie.value, limits)?)
                }
                Some(IeType::UeIpAddress) => {
                    ue_ip_address = Some(UeIpAddress::decode(ie.value, limits)?)
                }
                Some(IeType::SdfFilter) => sdf_filters.push(SdfFilter::decode(ie.value, limits)?),
                Some(IeType::Qfi) => qfi = Some(Qfi::decode(ie.value, limits)?),
                _ => {}
            }
        }
        Ok(Pdi {
            source_interface: mandatory(source_interface, "Source Interface")?,
            local_f_teid,
            network_instance,
            ue_ip_address,
            sdf_filters,
            qfi,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.source_interface.encode(buf);
        encode_opt(&self.local_f_teid, buf);
        encode_opt(&self.network_instance, buf);
        encode_opt(&self.ue_ip_address, buf);
        encode_all(&self.sdf_filters, buf);
        encode_opt(&self.qfi, buf);
    }
}

/// Create PDR, TS29.244, table 7.5.2.2-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePdr {
    pub pdr_id: PdrId,
    pub precedence: Precedence,
    pub pdi: Pdi,
    pub outer_header_removal: Option<OuterHeaderRemoval>,
    pub far_id: Option<FarId>,
    pub urr_ids: Vec<UrrId>,
    pub qer_ids: Vec<QerId>,
    pub activate_predefined_rules: Vec<String>,
}

impl Ie for CreatePdr {
    const IE_TYPE: IeType = IeType::CreatePdr;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut pdr_id = None;
        let mut precedence = None;
        let mut pdi = None;
        let mut outer_header_removal = None;
        let mut far_id = None;
        let mut urr_ids = Vec::new();
        let mut qer_ids = Vec::new();
        let mut activate_predefined_rules = Vec::new();
        for ie in ies(value) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::PdrId) => pdr_id = Some(PdrId::decode(ie.value, limits)?),
                Some(IeType::Precedence) => {
                    precedence = Some(Precedence::decode(ie.value, limits)?)
                }
                Some(IeType::Pdi) => pdi = Some(Pdi::decode(ie.value, limits)?),
                Some(IeType::OuterHeaderRemoval) => {
                    outer_header_removal = Some(OuterHeaderRemoval::decode(ie.value, limits)?)
                }
                Some(IeType::FarId) => far_id = Some(FarId::decode(ie.value, limits)?),
                Some(IeType::UrrId) => urr_ids.push(UrrId::decode(ie.value, limits)?),
                Some(IeType::QerId) => qer_ids.push(QerId::decode(ie.value, limits)?),
                Some(IeType::ActivatePredefinedRules) => {
                    activate_predefined_rules.push(PredefinedRules::decode_text(ie.value).0)
                }
                _ => {}
            }
        }
        Ok(CreatePdr {
            pdr_id: mandatory(pdr_id, "PDR ID")?,
            precedence: mandatory(precedence, "Precedence")?,
            pdi: mandatory(pdi, "PDI")?,
            outer_header_removal,
            far_id,
            urr_ids,
            qer_ids,
            activate_predefined_rules,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.pdr_id.encode(buf);
        self.precedence.encode(buf);
        self.pdi.encode(buf);
        encode_opt(&self.outer_header_removal, buf);
        encode_opt(&self.far_id, buf);
        encode_all(&self.urr_ids, buf);
        encode_all(&self.qer_ids, buf);
    }
}

/// Update PDR, TS29.244, table 7.5.4.2-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePdr {
    pub pdr_id: PdrId,
    pub precedence: Option<Precedence>,
    pub pdi: Option<Pdi>,
    pub outer_header_removal: Option<OuterHeaderRemoval>,
    pub far_id: Option<FarId>,
    pub urr_ids: Vec<UrrId>,
    pub qer_ids: Vec<QerId>,
    pub activate_predefined_rules: Vec<String>,
    pub deactivate_predefined_rules: Vec<String>,
}

impl UpdatePdr {
    pub fn new(pdr_id: PdrId) -> Self {
        UpdatePdr {
            pdr_id,
            precedence: None,
            pdi: None,
            outer_header_removal: None,
            far_id: None,
            urr_ids: Vec::new(),
            qer_ids: Vec::new(),
            activate_predefined_rules: Vec::new(),
            deactivate_predefined_rules: Vec::new(),
        }
    }
}

impl Ie for UpdatePdr {
    const IE_TYPE: IeType = IeType::UpdatePdr;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut pdr_id = None;
        let mut update = UpdatePdr::new(PdrId(0));
        for ie in ies(value) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::PdrId) => pdr_id = Some(PdrId::decode(ie.value, limits)?),
                Some(IeType::Precedence) => {
                    update.precedence = Some(Precedence::decode(ie.value, limits)?)
                }
                Some(IeType::Pdi) => update.pdi = Some(Pdi::decode(ie.value, limits)?),
                Some(IeType::OuterHeaderRemoval) => {
                    update.outer_header_removal =
                        Some(OuterHeaderRemoval::decode(ie.value, limits)?)
                }
                Some(IeType::FarId) => update.far_id = Some(FarId::decode(ie.value, limits)?),
                Some(IeType::UrrId) => update.urr_ids.push(UrrId::decode(ie.value, limits)?),
                Some(IeType::QerId) => update.qer_ids.push(QerId::decode(ie.value, limits)?),
                Some(IeType::ActivatePredefinedRules) => update
                    .activate_predefined_rules
                    .push(PredefinedRules::decode_text(ie.value).0),
                Some(IeType::DeactivatePredefinedRules) => update
                    .deactivate_predefined_rules
                    .push(PredefinedRules::decode_text(ie.value).0),
                _ => {}
            }
        }
        update.pdr_id = mandatory(pdr_id, "PDR ID")?;
        Ok(update)
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.pdr_id.encode(buf);
        encode_opt(&self.precedence, buf);
        encode_opt(&self.pdi, buf);
        encode_opt(&self.outer_header_removal, buf);
        encode_opt(&self.far_id, buf);
        encode_all(&self.urr_ids, buf);
        encode_all(&self.qer_ids, buf);
    }
}

/// Forwarding parameters, TS29.244, table 7.5.2.3-2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingParameters {
    pub destination_interface: DestinationInterface,
    pub network_instance: Option<NetworkInstance>,
    pub outer_header_creation: Option<OuterHeaderCreation>,
    pub forwarding_policy: Option<ForwardingPolicy>,
}

impl Ie for ForwardingParameters {
    const IE_TYPE: IeType = IeType::ForwardingParameters;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let p = UpdateForwardingParameters::decode(value, limits)?;
        Ok(ForwardingParameters {
            destination_interface: mandatory(p.destination_interface, "Destination Interface")?,
            network_instance: p.network_instance,
            outer_header_creation: p.outer_header_creation,
            forwarding_policy: p.forwarding_policy,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.destination_interface.encode(buf);
        encode_opt(&self.network_instance, buf);
        encode_opt(&self.outer_header_creation, buf);
        encode_opt(&self.forwarding_policy, buf);
    }
}

/// Update forwarding parameters, TS29.244, table 7.5.4.3-2.  Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateForwardingParameters {
    pub destination_interface: Option<DestinationInterface>,
    pub network_instance: Option<NetworkInstance>,
    pub outer_header_creation: Option<OuterHeaderCreation>,
    pub forwarding_policy: Option<ForwardingPolicy>,
}

impl Ie for UpdateForwardingParameters {
    const IE_TYPE: IeType = IeType::UpdateForwardingParameters;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut p = UpdateForwardingParameters::default();
        for ie in ies(value) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::DestinationInterface) => {
                    p.destination_interface = Some(DestinationInterface::decode(ie.value, limits)?)
                }
                Some(IeType::NetworkInstance) => {
                    p.network_instance = Some(NetworkInstance::decode(ie.value, limits)?)
                }
                Some(IeType::OuterHeaderCreation) => {
                    p.outer_header_creation = Some(OuterHeaderCreation::decode(ie.value, limits)?)
                }
                Some(IeType::ForwardingPolicy) => {
                    p.forwarding_policy = Some(ForwardingPolicy::decode(ie.value, limits)?)
                }
                _ => {}
            }
        }
        Ok(p)
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        encode_opt(&self.destination_interface, buf);
        encode_opt(&self.network_instance, buf);
        encode_opt(&self.outer_header_creation, buf);
        encode_opt(&self.forwarding_policy, buf);
    }
}

/// Create FAR, TS29.244, table 7.5.2.3-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFar {
    pub far_id: FarId,
    pub apply_action: ApplyAction,
    pub forwarding_parameters: Option<ForwardingParameters>,
}

impl Ie for CreateFar {
    const IE_TYPE: IeType = IeType::CreateFar;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut far_id = None;
        let mut apply_action = None;
        let mut forwarding_parameters = None;
        for ie in ies(value) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::FarId) => far_id = Some(FarId::decode(ie.value, limits)?),
                Some(IeType::ApplyAction) => {
                    apply_action = Some(ApplyAction::decode(ie.value, limits)?)
                }
                Some(IeType::ForwardingParameters) => {
                    forwarding_parameters = Some(ForwardingParameters::decode(ie.value, limits)?)
                }
                _ => {}
            }
        }
        Ok(CreateFar {
            far_id: mandatory(far_id, "FAR ID")?,
            apply_action: mandatory(apply_action, "Apply Action")?,
            forwarding_parameters,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.far_id.encode(buf);
        self.apply_action.encode(buf);
        encode_opt(&self.forwarding_parameters, buf);
    }
}

/// Update FAR, TS29.244, table 7.5.4.3-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFar {
    pub far_id: FarId,
    pub apply_action: Option<ApplyAction>,
    pub update_forwarding_parameters: Option<UpdateForwardingParameters>,
}

impl Ie for UpdateFar {
    const IE_TYPE: IeType = IeType::UpdateFar;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut far_id = None;
        let mut apply_action = None;
        let mut update_forwarding_parameters = None;
        for ie in ies(value) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::FarId) => far_id = Some(FarId::decode(ie.value, limits)?),
                Some(IeType::ApplyAction) => {
                    apply_action = Some(ApplyAction::decode(ie.value, limits)?)
                }
                Some(IeType::UpdateForwardingParameters) => {
                    update_forwarding_parameters =
                        Some(UpdateForwardingParameters::decode(ie.value, limits)?)
                }
                _ => {}
            }
        }
        Ok(UpdateFar {
            far_id: mandatory(far_id, "FAR ID")?,
            apply_action,
            update_forwarding_parameters,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.far_id.encode(buf);
        encode_opt(&self.apply_action, buf);
        encode_opt(&self.update_forwarding_parameters, buf);
    }
}

/// The QoS enforcement fields shared by Create QER and Update QER.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QerFields {
    pub qer_correlation_id: Option<QerCorrelationId>,
    pub gate_status: Option<GateStatus>,
    pub mbr: Option<Mbr>,
    pub gbr: Option<Gbr>,
    pub packet_rate: Option<PacketRate>,
    pub dl_flow_level_marking: Option<DlFlowLevelMarking>,
    pub qfi: Option<Qfi>,
    pub rqi: Option<Rqi>,
}

impl QerFields {
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<(Option<QerId>, Self)> {
        let mut qer_id = None;
        let mut f = QerFields::default();
        for ie in ies(value) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::QerId) => qer_id = Some(QerId::decode(ie.value, limits)?),
                Some(IeType::QerCorrelationId) => {
                    f.qer_correlation_id = Some(QerCorrelationId::decode(ie.value, limits)?)
                }
                Some(IeType::GateStatus) => {
                    f.gate_status = Some(GateStatus::decode(ie.value, limits)?)
                }
                Some(IeType::Mbr) => f.mbr = Some(Mbr::decode(ie.value, limits)?),
                Some(IeType::Gbr) => f.gbr = Some(Gbr::decode(ie.value, limits)?),
                Some(IeType::PacketRate) => {
                    f.packet_rate = Some(PacketRate::decode(ie.value, limits)?)
                }
                Some(IeType::DlFlowLevelMarking) => {
                    f.dl_flow_level_marking = Some(DlFlowLevelMarking::decode(ie.value, limits)?)
                }
                Some(IeType::Qfi) => f.qfi = Some(Qfi::decode(ie.value, limits)?),
                Some(IeType::Rqi) => f.rqi = Some(Rqi::decode(ie.value, limits)?),
                _ => {}
            }
        }
        Ok((qer_id, f))
    }

    fn encode(&self, buf: &mut BytesMut) {
        encode_opt(&self.qer_correlation_id, buf);
        encode_opt(&self.gate_status, buf);
        encode_opt(&self.mbr, buf);
        encode_opt(&self.gbr, buf);
        encode_opt(&self.packet_rate, buf);
        encode_opt(&self.dl_flow_level_marking, buf);
        encode_opt(&self.qfi, buf);
        encode_opt(&self.rqi, buf);
    }
}

/// Create QER, TS29.244, table 7.5.2.5-1.  Gate status is mandatory on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateQer {
    pub qer_id: QerId,
    pub fields: QerFields,
}

impl Ie for CreateQer {
    const IE_TYPE: IeType = IeType::CreateQer;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let (qer_id, fields) = QerFields::decode(value, limits)?;
        mandatory(fields.gate_status, "Gate Status")?;
        Ok(CreateQer {
            qer_id: mandatory(qer_id, "QER ID")?,
            fields,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.qer_id.encode(buf);
        self.fields.encode(buf);
    }
}

/// Update QER, TS29.244, table 7.5.4.5-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateQer {
    pub qer_id: QerId,
    pub fields: QerFields,
}

impl Ie for UpdateQer {
    const IE_TYPE: IeType = IeType::UpdateQer;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let (qer_id, fields) = QerFields::decode(value, limits)?;
        Ok(UpdateQer {
            qer_id: mandatory(qer_id, "QER ID")?,
            fields,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.qer_id.encode(buf);
        self.fields.encode(buf);
    }
}

macro_rules! remove_ie {
    ($name:ident, $ie:ident, $field:ident, $id:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub $field: $id,
        }

        impl Ie for $name {
            const IE_TYPE: IeType = IeType::$ie;
            fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
                let mut id = None;
                for ie in ies(value) {
                    let ie = ie?;
                    if IeType::from_u16(ie.ie_type) == Some(IeType::$id) {
                        id = Some($id::decode(ie.value, limits)?);
                    }
                }
                Ok($name {
                    $field: mandatory(id, $label)?,
                })
            }
            fn encode_value(&self, buf: &mut BytesMut) {
                self.$field.encode(buf)
            }
        }
    };
}

remove_ie!(RemovePdr, RemovePdr, pdr_id, PdrId, "PDR ID");
remove_ie!(RemoveFar, RemoveFar, far_id, FarId, "FAR ID");
remove_ie!(RemoveQer, RemoveQer, qer_id, QerId, "QER ID");
remove_ie!(RemoveUrr, RemoveUrr, urr_id, UrrId, "URR ID");

/// Created PDR, TS29.244, table 7.5.3.2-1.  Returns a TEID the UP function allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPdr {
    pub pdr_id: PdrId,
    pub local_f_teid: Option<FTeid>,
}

impl Ie for CreatedPdr {
    const IE_TYPE: IeType = IeType::CreatedPdr;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut pdr_id = None;
        let mut local_f_teid = None;
        for ie in ies(value) {
            let ie = ie?;
            match IeType::from_u16(ie.ie_type) {
                Some(IeType::PdrId) => pdr_id = Some(PdrId::decode(ie.value, limits)?),
                Some(IeType::FTeid) => local_f_teid = Some(FTeid::decode(ie.value, limits)?),
                _ => {}
            }
        }
        Ok(CreatedPdr {
            pdr_id: mandatory(pdr_id, "PDR ID")?,
            local_f_teid,
        })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        self.pdr_id.encode(buf);
        encode_opt(&self.local_f_teid, buf);
    }
}

/// Downlink data report, TS29.244, table 7.5.8.2-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkDataReport {
    pub pdr_ids: Vec<PdrId>,
}

impl Ie for DownlinkDataReport {
    const IE_TYPE: IeType = IeType::DownlinkDataReport;
    fn decode(value: &[u8], limits: &DecodeLimits) -> PfcpResult<Self> {
        let mut pdr_ids = Vec::new();
        for ie in ies(value) {
            let ie = ie?;
            if IeType::from_u16(ie.ie_type) == Some(IeType::PdrId) {
                pdr_ids.push(PdrId::decode(ie.value, limits)?);
            }
        }
        if pdr_ids.is_empty() {
            return Err(PfcpError::MissingMandatoryIe("PDR ID"));
        }
        Ok(DownlinkDataReport { pdr_ids })
    }
    fn encode_value(&self, buf: &mut BytesMut) {
        encode_all(&self.pdr_ids, buf)
    }
}
