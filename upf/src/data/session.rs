//! session - a PFCP session and the packet detection, forwarding and QoS rules it owns

use super::PdrMatchOrder;
use pfcp::{
    ApplyAction, Bitrate, Cause, CreateFar, CreatePdr, CreateQer, DlFlowLevelMarking, FTeid,
    FarId, ForwardingParameters, GateStatus, OuterHeaderRemoval, PacketRate, PdrId, QerFields,
    QerId, SdfFilter, SourceInterface, UeIpAddress, UpdateFar, UpdatePdr, UpdateQer,
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("{kind} {id} already exists")]
    Duplicate { kind: &'static str, id: u32 },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    #[error("PDR {pdr} refers to unknown {kind} {id}")]
    UnresolvedReference {
        pdr: u16,
        kind: &'static str,
        id: u32,
    },

    #[error("{kind} {id} is still used by PDR {pdr}")]
    StillReferenced {
        kind: &'static str,
        id: u32,
        pdr: u16,
    },

    #[error("PDR {pdr} {key:?} already belongs to session {seid:#x}")]
    KeyInUse { pdr: u16, key: LookupKey, seid: u64 },

    #[error("PDR {pdr} update asks the UP function to choose a TEID")]
    ChooseOnUpdate { pdr: u16 },

    #[error("{kind} {id} is missing {field}")]
    Missing {
        kind: &'static str,
        id: u32,
        field: &'static str,
    },
}

impl RuleError {
    pub fn cause(&self) -> Cause {
        match self {
            RuleError::Missing { .. } => Cause::MandatoryIeMissing,
            _ => Cause::RuleCreationModificationFailure,
        }
    }
}

/// Packet detection rule.  The FAR and QER are referenced by id within the same session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdr {
    pub id: PdrId,
    pub precedence: u32,
    pub source_interface: SourceInterface,
    pub local_f_teid: Option<FTeid>,
    pub ue_ip_address: Option<UeIpAddress>,
    pub network_instance: Option<String>,
    pub sdf_filters: Vec<SdfFilter>,
    pub qfi: Option<u8>,
    pub outer_header_removal: Option<OuterHeaderRemoval>,
    pub far_id: Option<FarId>,
    pub qer_id: Option<QerId>,
}

impl Pdr {
    pub fn teid(&self) -> Option<u32> {
        self.local_f_teid.as_ref().filter(|f| !f.choose).map(|f| f.teid)
    }

    pub fn ue_ips(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.ue_ip_address.iter().flat_map(|x| {
            x.ipv4
                .map(IpAddr::V4)
                .into_iter()
                .chain(x.ipv6.map(IpAddr::V6))
        })
    }

    /// Whether the packet's ingress attributes satisfy this PDR's match conditions.  A
    /// condition that is absent from the PDR matches anything.
    pub fn matches(&self, source_interfaces: &[SourceInterface], key: &LookupKey) -> bool {
        if !source_interfaces.contains(&self.source_interface) {
            return false;
        }
        match key {
            LookupKey::Teid(teid) => self.teid().is_none_or(|x| x == *teid),
            LookupKey::UeIp(ip) => {
                self.ue_ip_address.is_none() || self.ue_ips().any(|x| x == *ip)
            }
        }
    }
}

/// How a packet was mapped to its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey {
    Teid(u32),
    UeIp(IpAddr),
}

/// Forwarding action rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Far {
    pub id: FarId,
    pub apply_action: ApplyAction,
    pub forwarding_parameters: Option<ForwardingParameters>,
}

/// The apply action before and after a FAR update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarTransition {
    pub far_id: FarId,
    pub old: ApplyAction,
    pub new: ApplyAction,
}

/// QoS enforcement rule.  Only the QFI (and RQI) are applied in the data plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qer {
    pub id: QerId,
    pub correlation_id: Option<u32>,
    pub gate_status: GateStatus,
    pub mbr: Option<Bitrate>,
    pub gbr: Option<Bitrate>,
    pub packet_rate: Option<PacketRate>,
    pub dl_flow_level_marking: Option<DlFlowLevelMarking>,
    pub qfi: Option<u8>,
    pub rqi: bool,
}

impl Qer {
    fn apply(&mut self, f: QerFields) {
        if let Some(x) = f.qer_correlation_id {
            self.correlation_id = Some(x.0);
        }
        if let Some(x) = f.gate_status {
            self.gate_status = x;
        }
        if let Some(x) = f.mbr {
            self.mbr = Some(x.0);
        }
        if let Some(x) = f.gbr {
            self.gbr = Some(x.0);
        }
        if let Some(x) = f.packet_rate {
            self.packet_rate = Some(x);
        }
        if let Some(x) = f.dl_flow_level_marking {
            self.dl_flow_level_marking = Some(x);
        }
        if let Some(x) = f.qfi {
            self.qfi = Some(x.0);
        }
        if let Some(x) = f.rqi {
            self.rqi = x.0;
        }
    }
}

/// A PFCP session.  Sessions are published to the registry as immutable snapshots, so the
/// signaling side works on its own copy and commits it when a message has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub local_seid: u64,
    pub remote_seid: u64,
    pub peer: SocketAddr,
    pub pdn_type: Option<u8>,

    // Set while a Session Report Request is outstanding for buffered downlink data.
    pub srr_flag: bool,

    pdrs: Vec<Pdr>,
    fars: HashMap<FarId, Far>,
    qers: HashMap<QerId, Qer>,
}

impl Session {
    pub fn new(local_seid: u64, remote_seid: u64, peer: SocketAddr) -> Self {
        Session {
            local_seid,
            remote_seid,
            peer,
            pdn_type: None,
            srr_flag: false,
            pdrs: Vec::new(),
            fars: HashMap::new(),
            qers: HashMap::new(),
        }
    }

    pub fn pdrs(&self) -> &[Pdr] {
        &self.pdrs
    }

    pub fn pdr(&self, id: PdrId) -> Option<&Pdr> {
        self.pdrs.iter().find(|p| p.id == id)
    }

    pub fn far(&self, id: FarId) -> Option<&Far> {
        self.fars.get(&id)
    }

    pub fn fars(&self) -> impl Iterator<Item = &Far> {
        self.fars.values()
    }

    pub fn qer(&self, id: QerId) -> Option<&Qer> {
        self.qers.get(&id)
    }

    /// Every TEID allocated to this session's PDRs.
    pub fn teids(&self) -> Vec<u32> {
        let mut teids: Vec<u32> = self.pdrs.iter().filter_map(Pdr::teid).collect();
        teids.sort_unstable();
        teids.dedup();
        teids
    }

    /// Every UE address found in this session's PDRs.
    pub fn ue_ips(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = self.pdrs.iter().flat_map(|p| p.ue_ips()).collect();
        ips.sort_unstable();
        ips.dedup();
        ips
    }

    /// Find the PDR that applies to a packet arriving on any of the given source interfaces.
    pub fn classify(
        &self,
        source_interfaces: &[SourceInterface],
        key: &LookupKey,
        order: PdrMatchOrder,
    ) -> Option<&Pdr> {
        let mut candidates = self
            .pdrs
            .iter()
            .filter(|p| p.matches(source_interfaces, key));
        match order {
            PdrMatchOrder::Insertion => candidates.next(),
            PdrMatchOrder::Precedence => candidates.min_by_key(|p| p.precedence),
        }
    }

    fn check_far_reference(&self, pdr: PdrId, far_id: Option<FarId>) -> Result<(), RuleError> {
        match far_id {
            Some(id) if !self.fars.contains_key(&id) => Err(RuleError::UnresolvedReference {
                pdr: pdr.0,
                kind: "FAR",
                id: id.0,
            }),
            _ => Ok(()),
        }
    }

    fn check_qer_reference(&self, pdr: PdrId, qer_id: Option<QerId>) -> Result<(), RuleError> {
        match qer_id {
            Some(id) if !self.qers.contains_key(&id) => Err(RuleError::UnresolvedReference {
                pdr: pdr.0,
                kind: "QER",
                id: id.0,
            }),
            _ => Ok(()),
        }
    }

    /// Add a PDR.  Only the first QER id is used.  The F-TEID must already be resolved if the
    /// SMF asked the UPF to choose it.
    pub fn create_pdr(&mut self, r: CreatePdr) -> Result<(), RuleError> {
        if self.pdr(r.pdr_id).is_some() {
            return Err(RuleError::Duplicate {
                kind: "PDR",
                id: r.pdr_id.0 as u32,
            });
        }
        let qer_id = r.qer_ids.first().copied();
        self.check_far_reference(r.pdr_id, r.far_id)?;
        self.check_qer_reference(r.pdr_id, qer_id)?;
        self.pdrs.push(Pdr {
            id: r.pdr_id,
            precedence: r.precedence.0,
            source_interface: r.pdi.source_interface,
            local_f_teid: r.pdi.local_f_teid,
            ue_ip_address: r.pdi.ue_ip_address,
            network_instance: r.pdi.network_instance.map(|x| x.0),
            sdf_filters: r.pdi.sdf_filters,
            qfi: r.pdi.qfi.map(|x| x.0),
            outer_header_removal: r.outer_header_removal,
            far_id: r.far_id,
            qer_id,
        });
        Ok(())
    }

    pub fn update_pdr(&mut self, r: UpdatePdr) -> Result<(), RuleError> {
        let qer_id = r.qer_ids.first().copied();
        self.check_far_reference(r.pdr_id, r.far_id)?;
        self.check_qer_reference(r.pdr_id, qer_id)?;
        let pdr = self
            .pdrs
            .iter_mut()
            .find(|p| p.id == r.pdr_id)
            .ok_or(RuleError::NotFound {
                kind: "PDR",
                id: r.pdr_id.0 as u32,
            })?;
        if let Some(x) = r.precedence {
            pdr.precedence = x.0;
        }
        if let Some(pdi) = r.pdi {
            pdr.source_interface = pdi.source_interface;
            pdr.local_f_teid = pdi.local_f_teid;
            pdr.ue_ip_address = pdi.ue_ip_address;
            pdr.network_instance = pdi.network_instance.map(|x| x.0);
            pdr.sdf_filters = pdi.sdf_filters;
            pdr.qfi = pdi.qfi.map(|x| x.0);
        }
        if r.outer_header_removal.is_some() {
            pdr.outer_header_removal = r.outer_header_removal;
        }
        if r.far_id.is_some() {
            pdr.far_id = r.far_id;
        }
        if qer_id.is_some() {
            pdr.qer_id = qer_id;
        }
        Ok(())
    }

    pub fn remove_pdr(&mut self, id: PdrId) -> Result<Pdr, RuleError> {
        let idx = self
            .pdrs
            .iter()
            .position(|p| p.id == id)
            .ok_or(RuleError::NotFound {
                kind: "PDR",
                id: id.0 as u32,
            })?;
        Ok(self.pdrs.remove(idx))
    }

    pub fn create_far(&mut self, r: CreateFar) -> Result<(), RuleError> {
        if self.fars.contains_key(&r.far_id) {
            return Err(RuleError::Duplicate {
                kind: "FAR",
                id: r.far_id.0,
            });
        }
        self.fars.insert(
            r.far_id,
            Far {
                id: r.far_id,
                apply_action: r.apply_action,
                forwarding_parameters: r.forwarding_parameters,
            },
        );
        Ok(())
    }

    pub fn update_far(&mut self, r: UpdateFar) -> Result<FarTransition, RuleError> {
        let far = self.fars.get_mut(&r.far_id).ok_or(RuleError::NotFound {
            kind: "FAR",
            id: r.far_id.0,
        })?;
        let old = far.apply_action;
        if let Some(update) = r.update_forwarding_parameters {
            match &mut far.forwarding_parameters {
                Some(p) => {
                    if let Some(x) = update.destination_interface {
                        p.destination_interface = x;
                    }
                    if update.network_instance.is_some() {
                        p.network_instance = update.network_instance;
                    }
                    if update.outer_header_creation.is_some() {
                        p.outer_header_creation = update.outer_header_creation;
                    }
                    if update.forwarding_policy.is_some() {
                        p.forwarding_policy = update.forwarding_policy;
                    }
                }
                None => {
                    let destination_interface =
                        update.destination_interface.ok_or(RuleError::Missing {
                            kind: "FAR",
                            id: r.far_id.0,
                            field: "Destination Interface",
                        })?;
                    far.forwarding_parameters = Some(ForwardingParameters {
                        destination_interface,
                        network_instance: update.network_instance,
                        outer_header_creation: update.outer_header_creation,
                        forwarding_policy: update.forwarding_policy,
                    });
                }
            }
        }
        if let Some(x) = r.apply_action {
            far.apply_action = x;
        }
        Ok(FarTransition {
            far_id: r.far_id,
            old,
            new: far.apply_action,
        })
    }

    /// Remove a FAR.  Refused while any PDR still refers to it.
    pub fn remove_far(&mut self, id: FarId) -> Result<Far, RuleError> {
        if let Some(pdr) = self.pdrs.iter().find(|p| p.far_id == Some(id)) {
            return Err(RuleError::StillReferenced {
                kind: "FAR",
                id: id.0,
                pdr: pdr.id.0,
            });
        }
        self.fars.remove(&id).ok_or(RuleError::NotFound {
            kind: "FAR",
            id: id.0,
        })
    }

    pub fn create_qer(&mut self, r: CreateQer) -> Result<(), RuleError> {
        if self.qers.contains_key(&r.qer_id) {
            return Err(RuleError::Duplicate {
                kind: "QER",
                id: r.qer_id.0,
            });
        }
        let mut qer = Qer {
            id: r.qer_id,
            correlation_id: None,
            gate_status: GateStatus::default(),
            mbr: None,
            gbr: None,
            packet_rate: None,
            dl_flow_level_marking: None,
            qfi: None,
            rqi: false,
        };
        qer.apply(r.fields);
        self.qers.insert(r.qer_id, qer);
        Ok(())
    }

    pub fn update_qer(&mut self, r: UpdateQer) -> Result<(), RuleError> {
        let qer = self.qers.get_mut(&r.qer_id).ok_or(RuleError::NotFound {
            kind: "QER",
            id: r.qer_id.0,
        })?;
        qer.apply(r.fields);
        Ok(())
    }

    /// Remove a QER.  Refused while any PDR still refers to it.
    pub fn remove_qer(&mut self, id: QerId) -> Result<Qer, RuleError> {
        if let Some(pdr) = self.pdrs.iter().find(|p| p.qer_id == Some(id)) {
            return Err(RuleError::StillReferenced {
                kind: "QER",
                id: id.0,
                pdr: pdr.id.0,
            });
        }
        self.qers.remove(&id).ok_or(RuleError::NotFound {
            kind: "QER",
            id: id.0,
        })
    }
}
