use pfcp::*;
use upf::{DropReason, Port, Verdict};
use upf_tests::{framework::*, *};

#[async_std::test]
async fn heartbeat() -> anyhow::Result<()> {
    let (mut smf, _upf, _logger) = init(1).await?;
    let request = HeartbeatRequest {
        recovery_time_stamp: Some(RecoveryTimeStamp(3_900_000_000)),
    };
    let (header, response): (_, HeartbeatResponse) = smf.request(&request, None).await?;
    assert_eq!(header.seid, None);

    // Seconds since 1900, so well past 2020.
    assert!(response.recovery_time_stamp.0 > 3_786_825_600);
    Ok(())
}

#[async_std::test]
async fn unsupported_version() -> anyhow::Result<()> {
    let (smf, _upf, _logger) = init(2).await?;

    // Heartbeat Request with version 2 and sequence number 7.
    smf.send_raw(&[0b010_0_0_0_0_0, 1, 0x00, 0x04, 0x00, 0x00, 0x07, 0x00])
        .await?;
    let datagram = smf.receive_raw().await?;
    let (header, VersionNotSupportedResponse) =
        decode_message::<VersionNotSupportedResponse>(&datagram, &DecodeLimits::default())?;
    assert_eq!(header.sequence_number, 7);
    Ok(())
}

#[async_std::test]
async fn session_establishment_needs_association() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(3).await?;
    let (_, response) = smf
        .establish_session(
            1,
            vec![uplink_pdr(1, choose_f_teid(None), 1)],
            vec![forward_to_core_far(1)],
            vec![],
        )
        .await?;
    assert_eq!(response.cause, Cause::NoEstablishedPfcpAssociation);
    assert_eq!(response.up_f_seid, None);
    assert_eq!(upf.session_count(), 0);

    // Once associated, the same request succeeds.
    smf.perform_association_setup().await?;
    smf.establish_session_ok(
        1,
        vec![uplink_pdr(1, choose_f_teid(None), 1)],
        vec![forward_to_core_far(1)],
        vec![],
    )
    .await?;
    assert_eq!(upf.session_count(), 1);
    Ok(())
}

#[async_std::test]
async fn association_update_needs_association() -> anyhow::Result<()> {
    let (mut smf, _upf, _logger) = init(4).await?;
    let request = AssociationUpdateRequest {
        node_id: Some(smf.node_id()),
    };
    let (_, response): (_, AssociationUpdateResponse) = smf.request(&request, None).await?;
    assert_eq!(response.cause, Cause::NoEstablishedPfcpAssociation);

    smf.perform_association_setup().await?;
    let (_, response): (_, AssociationUpdateResponse) = smf.request(&request, None).await?;
    assert_eq!(response.cause, Cause::RequestAccepted);
    Ok(())
}

#[async_std::test]
async fn association_release_removes_sessions() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(5).await?;
    let setup = smf.perform_association_setup().await?;
    assert_eq!(setup.node_id, NodeId::Ipv4("127.0.10.5".parse::<std::net::Ipv4Addr>()?));

    for cp_seid in [1, 2] {
        let teid = 100 + cp_seid as u32;
        smf.establish_session_ok(
            cp_seid,
            vec![uplink_pdr(1, FTeid::new_ipv4(teid, UPF_N3_IP), 1)],
            vec![forward_to_core_far(1)],
            vec![],
        )
        .await?;
    }
    assert_eq!(upf.session_count(), 2);

    let request = AssociationReleaseRequest {
        node_id: Some(smf.node_id()),
    };
    let (_, response): (_, AssociationReleaseResponse) = smf.request(&request, None).await?;
    assert_eq!(response.cause, Cause::RequestAccepted);
    assert_eq!(upf.session_count(), 0);

    let inner = ipv4_udp_packet(UE_IP, SERVER_IP, b"hello");
    let frame = gtpu_frame(GNB_IP, UPF_N3_IP, 101, None, &inner);
    assert_eq!(
        upf.handle_frame(Port::Access, &frame).await,
        Verdict::Drop(DropReason::UnknownSession)
    );

    // Without an association, new sessions are refused.
    let (_, response) = smf
        .establish_session(
            3,
            vec![uplink_pdr(1, choose_f_teid(None), 1)],
            vec![forward_to_core_far(1)],
            vec![],
        )
        .await?;
    assert_eq!(response.cause, Cause::NoEstablishedPfcpAssociation);
    Ok(())
}
