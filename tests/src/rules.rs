use pfcp::*;
use std::net::Ipv4Addr;

/// PDR matching uplink G-PDUs on the given TEID, removing the GTP-U header.
pub fn uplink_pdr(id: u16, f_teid: FTeid, far_id: u32) -> CreatePdr {
    let mut pdi = Pdi::new(SourceInterface::Access);
    pdi.local_f_teid = Some(f_teid);
    CreatePdr {
        pdr_id: PdrId(id),
        precedence: Precedence(100),
        pdi,
        outer_header_removal: Some(OuterHeaderRemoval::GtpuUdpIpv4),
        far_id: Some(FarId(far_id)),
        urr_ids: vec![],
        qer_ids: vec![],
        activate_predefined_rules: vec![],
    }
}

/// PDR matching downlink packets to the UE's address.
pub fn downlink_pdr(id: u16, ue_ip: Ipv4Addr, far_id: u32, qer_id: Option<u32>) -> CreatePdr {
    let mut pdi = Pdi::new(SourceInterface::Core);
    pdi.ue_ip_address = Some(UeIpAddress {
        ipv4: Some(ue_ip),
        is_destination: true,
        ..Default::default()
    });
    CreatePdr {
        pdr_id: PdrId(id),
        precedence: Precedence(100),
        pdi,
        outer_header_removal: None,
        far_id: Some(FarId(far_id)),
        urr_ids: vec![],
        qer_ids: qer_id.into_iter().map(QerId).collect(),
        activate_predefined_rules: vec![],
    }
}

/// F-TEID asking the UPF to allocate the TEID.
pub fn choose_f_teid(choose_id: Option<u8>) -> FTeid {
    FTeid {
        choose: true,
        choose_v4: true,
        choose_id,
        ..Default::default()
    }
}

pub fn forward_to_core_far(id: u32) -> CreateFar {
    CreateFar {
        far_id: FarId(id),
        apply_action: ApplyAction(ApplyAction::FORW),
        forwarding_parameters: Some(ForwardingParameters {
            destination_interface: DestinationInterface::Core,
            network_instance: None,
            outer_header_creation: None,
            forwarding_policy: None,
        }),
    }
}

pub fn forward_to_gnb_far(id: u32, teid: u32, gnb: Ipv4Addr) -> CreateFar {
    CreateFar {
        far_id: FarId(id),
        apply_action: ApplyAction(ApplyAction::FORW),
        forwarding_parameters: Some(ForwardingParameters {
            destination_interface: DestinationInterface::Access,
            network_instance: None,
            outer_header_creation: Some(OuterHeaderCreation::gtpu_ipv4(teid, gnb)),
            forwarding_policy: None,
        }),
    }
}

pub fn buffer_far(id: u32) -> CreateFar {
    CreateFar {
        far_id: FarId(id),
        apply_action: ApplyAction(ApplyAction::BUFF | ApplyAction::NOCP),
        forwarding_parameters: None,
    }
}

pub fn qfi_qer(id: u32, qfi: u8) -> CreateQer {
    CreateQer {
        qer_id: QerId(id),
        fields: QerFields {
            gate_status: Some(GateStatus::default()),
            qfi: Some(Qfi(qfi)),
            ..Default::default()
        },
    }
}

/// FAR update that starts forwarding to the gNB over a new tunnel.
pub fn forward_to_gnb_update(id: u32, teid: u32, gnb: Ipv4Addr) -> UpdateFar {
    UpdateFar {
        far_id: FarId(id),
        apply_action: Some(ApplyAction(ApplyAction::FORW)),
        update_forwarding_parameters: Some(UpdateForwardingParameters {
            destination_interface: Some(DestinationInterface::Access),
            outer_header_creation: Some(OuterHeaderCreation::gtpu_ipv4(teid, gnb)),
            ..Default::default()
        }),
    }
}
