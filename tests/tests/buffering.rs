use pfcp::*;
use upf::{Port, Verdict};
use upf_tests::{framework::*, *};

#[async_std::test]
async fn buffered_downlink_is_reported_and_flushed_in_order() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(30).await?;
    smf.perform_association_setup().await?;

    // The UE is idle, so downlink is buffered and the SMF is notified.
    let up_seid = smf
        .establish_session_ok(
            0x99,
            vec![downlink_pdr(5, UE_IP, 1, None)],
            vec![buffer_far(1)],
            vec![],
        )
        .await?;

    let packets: Vec<_> = (0..3u8)
        .map(|n| ipv4_udp_packet(SERVER_IP, UE_IP, &[n]))
        .collect();
    for packet in &packets {
        assert_eq!(
            upf.handle_frame(Port::Core, &ethernet_frame(packet)).await,
            Verdict::Buffered
        );
    }

    // Only one report, however many packets arrived.
    let (header, report) = smf.handle_session_report().await?;
    assert_eq!(header.seid, Some(0x99));
    assert_eq!(report.report_type, ReportType(ReportType::DLDR));
    assert_eq!(report.downlink_data_report.unwrap().pdr_ids, vec![PdrId(5)]);
    assert!(smf.receive_raw().await.is_err());

    // The UE is paged and the SMF switches the FAR to forwarding.
    let request = SessionModificationRequest {
        update_fars: vec![Ok(forward_to_gnb_update(1, 0x500, GNB_IP))],
        ..Default::default()
    };
    let (_, response) = smf.modify_session(up_seid, request).await?;
    assert_eq!(response.cause, Cause::RequestAccepted);

    let egress = upf.egress();
    for packet in &packets {
        let (port, frame) = egress.recv().await?;
        assert_eq!(port, Port::Access);
        let gtp = parse_gtpu_frame(&frame)?;
        assert_eq!(gtp.teid, 0x500);
        assert_eq!(&gtp.inner, packet);
    }

    // Later packets follow the flushed ones to the gNB.
    let later = ipv4_udp_packet(SERVER_IP, UE_IP, b"later");
    assert!(matches!(
        upf.handle_frame(Port::Core, &ethernet_frame(&later)).await,
        Verdict::Forward { .. } | Verdict::Buffered
    ));
    let (port, frame) = egress.recv().await?;
    assert_eq!(port, Port::Access);
    assert_eq!(parse_gtpu_frame(&frame)?.inner, later);
    Ok(())
}

#[async_std::test]
async fn buffered_downlink_is_discarded_by_drop() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(31).await?;
    smf.perform_association_setup().await?;
    let up_seid = smf
        .establish_session_ok(
            0xaa,
            vec![downlink_pdr(1, UE_IP, 1, None)],
            vec![buffer_far(1)],
            vec![],
        )
        .await?;

    let packet = ipv4_udp_packet(SERVER_IP, UE_IP, b"lost");
    assert_eq!(
        upf.handle_frame(Port::Core, &ethernet_frame(&packet)).await,
        Verdict::Buffered
    );
    smf.handle_session_report().await?;

    let request = SessionModificationRequest {
        update_fars: vec![Ok(UpdateFar {
            far_id: FarId(1),
            apply_action: Some(ApplyAction(ApplyAction::DROP)),
            update_forwarding_parameters: None,
        })],
        ..Default::default()
    };
    let (_, response) = smf.modify_session(up_seid, request).await?;
    assert_eq!(response.cause, Cause::RequestAccepted);

    // Deleting the session now sends nothing, so the buffered packet is gone.
    smf.delete_session(up_seid).await?;
    let egress = upf.egress();
    assert!(
        async_std::future::timeout(std::time::Duration::from_millis(200), egress.recv())
            .await
            .is_err()
    );
    Ok(())
}
