use pfcp::*;
use upf::{DropReason, Port, Verdict};
use upf_tests::{framework::*, *};

#[async_std::test]
async fn establishment_allocates_teids() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(10).await?;
    smf.perform_association_setup().await?;

    // PDRs 1 and 2 share a Choose ID, PDR 3 has its own TEID.
    let (header, response) = smf
        .establish_session(
            0x1234,
            vec![
                uplink_pdr(1, choose_f_teid(Some(1)), 1),
                uplink_pdr(2, choose_f_teid(Some(1)), 1),
                uplink_pdr(3, choose_f_teid(None), 1),
                downlink_pdr(4, UE_IP, 2, None),
            ],
            vec![forward_to_core_far(1), forward_to_gnb_far(2, 0x99, GNB_IP)],
            vec![],
        )
        .await?;
    assert_eq!(response.cause, Cause::RequestAccepted);
    assert_eq!(header.seid, Some(0x1234));
    let up_f_seid = response.up_f_seid.unwrap();
    assert_eq!(up_f_seid.ipv4, Some("127.0.10.10".parse::<std::net::Ipv4Addr>()?));

    let created: Vec<_> = response
        .created_pdrs
        .iter()
        .map(|x| (x.pdr_id, x.local_f_teid.clone().unwrap()))
        .collect();
    assert_eq!(created.len(), 3);
    assert_eq!(created[0].0, PdrId(1));
    assert_eq!(created[0].1, created[1].1);
    assert_ne!(created[0].1.teid, created[2].1.teid);
    assert_eq!(created[2].1.ipv4, Some(UPF_N3_IP));

    // The allocated TEID is live on the data plane.
    let inner = ipv4_udp_packet(UE_IP, SERVER_IP, b"uplink");
    let frame = gtpu_frame(GNB_IP, UPF_N3_IP, created[2].1.teid, None, &inner);
    let Verdict::Forward { port, frame } = upf.handle_frame(Port::Access, &frame).await else {
        panic!("Uplink packet not forwarded");
    };
    assert_eq!(port, Port::Core);
    assert_eq!(ip_packet_of(&frame)?, inner);
    Ok(())
}

#[async_std::test]
async fn unknown_session() -> anyhow::Result<()> {
    let (mut smf, _upf, _logger) = init(11).await?;
    smf.perform_association_setup().await?;

    let (header, response) = smf
        .modify_session(999, SessionModificationRequest::default())
        .await?;
    assert_eq!(response.cause, Cause::SessionContextNotFound);
    assert_eq!(header.seid, Some(0));

    let (header, response) = smf.delete_session(999).await?;
    assert_eq!(response.cause, Cause::SessionContextNotFound);
    assert_eq!(header.seid, Some(0));
    Ok(())
}

#[async_std::test]
async fn deletion_removes_session() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(12).await?;
    smf.perform_association_setup().await?;
    let up_seid = smf
        .establish_session_ok(
            0x55,
            vec![uplink_pdr(1, FTeid::new_ipv4(100, UPF_N3_IP), 1)],
            vec![forward_to_core_far(1)],
            vec![],
        )
        .await?;

    let inner = ipv4_udp_packet(UE_IP, SERVER_IP, b"uplink");
    let frame = gtpu_frame(GNB_IP, UPF_N3_IP, 100, None, &inner);
    assert!(matches!(
        upf.handle_frame(Port::Access, &frame).await,
        Verdict::Forward { .. }
    ));

    let (header, response) = smf.delete_session(up_seid).await?;
    assert_eq!(response.cause, Cause::RequestAccepted);
    assert_eq!(header.seid, Some(0x55));
    assert_eq!(upf.session_count(), 0);
    assert_eq!(
        upf.handle_frame(Port::Access, &frame).await,
        Verdict::Drop(DropReason::UnknownSession)
    );

    // Deleting it again fails.
    let (_, response) = smf.delete_session(up_seid).await?;
    assert_eq!(response.cause, Cause::SessionContextNotFound);
    Ok(())
}

#[async_std::test]
async fn failed_rules_are_reported() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(13).await?;
    smf.perform_association_setup().await?;

    // PDR 2 refers to a FAR that doesn't exist.  PDR 1 is still installed.
    let (_, response) = smf
        .establish_session(
            0x66,
            vec![
                uplink_pdr(1, FTeid::new_ipv4(200, UPF_N3_IP), 1),
                uplink_pdr(2, FTeid::new_ipv4(201, UPF_N3_IP), 9),
            ],
            vec![forward_to_core_far(1)],
            vec![],
        )
        .await?;
    assert_eq!(response.cause, Cause::RuleCreationModificationFailure);
    let up_seid = response.up_f_seid.unwrap().seid;

    let inner = ipv4_udp_packet(UE_IP, SERVER_IP, b"uplink");
    assert!(matches!(
        upf.handle_frame(Port::Access, &gtpu_frame(GNB_IP, UPF_N3_IP, 200, None, &inner))
            .await,
        Verdict::Forward { .. }
    ));
    assert_eq!(
        upf.handle_frame(Port::Access, &gtpu_frame(GNB_IP, UPF_N3_IP, 201, None, &inner))
            .await,
        Verdict::Drop(DropReason::UnknownSession)
    );

    // FAR 1 can't be removed while PDR 1 uses it.
    let request = SessionModificationRequest {
        remove_fars: vec![Ok(RemoveFar { far_id: FarId(1) })],
        ..Default::default()
    };
    let (_, response) = smf.modify_session(up_seid, request).await?;
    assert_eq!(response.cause, Cause::RuleCreationModificationFailure);

    // Removing both in one message works, since PDRs are removed first.
    let request = SessionModificationRequest {
        remove_pdrs: vec![Ok(RemovePdr { pdr_id: PdrId(1) })],
        remove_fars: vec![Ok(RemoveFar { far_id: FarId(1) })],
        ..Default::default()
    };
    let (_, response) = smf.modify_session(up_seid, request).await?;
    assert_eq!(response.cause, Cause::RequestAccepted);
    assert_eq!(
        upf.handle_frame(Port::Access, &gtpu_frame(GNB_IP, UPF_N3_IP, 200, None, &inner))
            .await,
        Verdict::Drop(DropReason::UnknownSession)
    );
    Ok(())
}

#[async_std::test]
async fn modification_redirects_downlink() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(14).await?;
    smf.perform_association_setup().await?;
    let up_seid = smf
        .establish_session_ok(
            0x77,
            vec![downlink_pdr(1, UE_IP, 1, None)],
            vec![forward_to_gnb_far(1, 0x10, GNB_IP)],
            vec![],
        )
        .await?;

    // Handover to a gNB with a different address and TEID.
    let new_gnb: std::net::Ipv4Addr = "10.0.0.2".parse()?;
    let request = SessionModificationRequest {
        update_fars: vec![Ok(forward_to_gnb_update(1, 0x20, new_gnb))],
        ..Default::default()
    };
    let (header, response) = smf.modify_session(up_seid, request).await?;
    assert_eq!(response.cause, Cause::RequestAccepted);
    assert_eq!(header.seid, Some(0x77));

    let inner = ipv4_udp_packet(SERVER_IP, UE_IP, b"downlink");
    let Verdict::Forward { port, frame } =
        upf.handle_frame(Port::Core, &ethernet_frame(&inner)).await
    else {
        panic!("Downlink packet not forwarded");
    };
    assert_eq!(port, Port::Access);
    let gtp = parse_gtpu_frame(&frame)?;
    assert_eq!(gtp.destination, new_gnb);
    assert_eq!(gtp.teid, 0x20);
    assert_eq!(gtp.inner, inner);
    Ok(())
}

#[async_std::test]
async fn sessions_cannot_share_a_teid_or_ue_address() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(15).await?;
    smf.perform_association_setup().await?;
    smf.establish_session_ok(
        0xa,
        vec![
            uplink_pdr(1, FTeid::new_ipv4(100, UPF_N3_IP), 1),
            downlink_pdr(2, UE_IP, 2, None),
        ],
        vec![forward_to_core_far(1), forward_to_gnb_far(2, 0x10, GNB_IP)],
        vec![],
    )
    .await?;

    // A second session asking for the same TEID doesn't get it.
    let (_, response) = smf
        .establish_session(
            0xb,
            vec![uplink_pdr(1, FTeid::new_ipv4(100, UPF_N3_IP), 1)],
            vec![forward_to_gnb_far(1, 0x20, GNB_IP)],
            vec![],
        )
        .await?;
    assert_eq!(response.cause, Cause::RuleCreationModificationFailure);
    let second = response.up_f_seid.unwrap().seid;

    // Nor can it add the first session's UE address later.
    let request = SessionModificationRequest {
        create_pdrs: vec![Ok(downlink_pdr(2, UE_IP, 1, None))],
        ..Default::default()
    };
    let (_, response) = smf.modify_session(second, request).await?;
    assert_eq!(response.cause, Cause::RuleCreationModificationFailure);

    // Deleting the second session leaves the first one's traffic alone.
    smf.delete_session(second).await?;
    let inner = ipv4_udp_packet(UE_IP, SERVER_IP, b"uplink");
    let Verdict::Forward { port, .. } = upf
        .handle_frame(Port::Access, &gtpu_frame(GNB_IP, UPF_N3_IP, 100, None, &inner))
        .await
    else {
        panic!("Uplink packet not forwarded");
    };
    assert_eq!(port, Port::Core);
    let inner = ipv4_udp_packet(SERVER_IP, UE_IP, b"downlink");
    let Verdict::Forward { frame, .. } =
        upf.handle_frame(Port::Core, &ethernet_frame(&inner)).await
    else {
        panic!("Downlink packet not forwarded");
    };
    assert_eq!(parse_gtpu_frame(&frame)?.teid, 0x10);
    Ok(())
}

#[async_std::test]
async fn modification_returns_allocated_teids() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(16).await?;
    smf.perform_association_setup().await?;
    let up_seid = smf
        .establish_session_ok(
            0xc,
            vec![downlink_pdr(1, UE_IP, 1, None)],
            vec![forward_to_gnb_far(1, 0x10, GNB_IP)],
            vec![],
        )
        .await?;

    // Add an uplink path on a TEID that the UPF chooses.
    let request = SessionModificationRequest {
        create_fars: vec![Ok(forward_to_core_far(2))],
        create_pdrs: vec![Ok(uplink_pdr(2, choose_f_teid(Some(1)), 2))],
        ..Default::default()
    };
    let (_, response) = smf.modify_session(up_seid, request).await?;
    assert_eq!(response.cause, Cause::RequestAccepted);
    assert_eq!(response.created_pdrs.len(), 1);
    assert_eq!(response.created_pdrs[0].pdr_id, PdrId(2));
    let f_teid = response.created_pdrs[0].local_f_teid.clone().unwrap();
    assert_eq!(f_teid.ipv4, Some(UPF_N3_IP));

    let inner = ipv4_udp_packet(UE_IP, SERVER_IP, b"uplink");
    let frame = gtpu_frame(GNB_IP, UPF_N3_IP, f_teid.teid, None, &inner);
    let Verdict::Forward { port, frame } = upf.handle_frame(Port::Access, &frame).await else {
        panic!("Uplink packet not forwarded");
    };
    assert_eq!(port, Port::Core);
    assert_eq!(ip_packet_of(&frame)?, inner);

    // A new TEID can't be chosen for an existing PDR, since there would be no way to return it.
    let mut pdi = Pdi::new(SourceInterface::Access);
    pdi.local_f_teid = Some(choose_f_teid(None));
    let request = SessionModificationRequest {
        update_pdrs: vec![Ok(UpdatePdr {
            pdi: Some(pdi),
            ..UpdatePdr::new(PdrId(2))
        })],
        ..Default::default()
    };
    let (_, response) = smf.modify_session(up_seid, request).await?;
    assert_eq!(response.cause, Cause::RuleCreationModificationFailure);
    assert!(response.created_pdrs.is_empty());
    Ok(())
}
