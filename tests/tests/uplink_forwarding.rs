use pfcp::*;
use upf::{DropReason, Port, Verdict};
use upf_tests::{framework::*, *};

#[async_std::test]
async fn uplink_is_retunneled() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(20).await?;
    smf.perform_association_setup().await?;

    // Uplink PDR on TEID 100, with a FAR that tunnels on to 10.0.0.1 with TEID 200.
    smf.establish_session_ok(
        1,
        vec![uplink_pdr(1, FTeid::new_ipv4(100, UPF_N3_IP), 1)],
        vec![forward_to_gnb_far(1, 200, GNB_IP)],
        vec![],
    )
    .await?;

    let inner = ipv4_udp_packet(UE_IP, SERVER_IP, b"uplink");
    let frame = gtpu_frame(GNB_IP, UPF_N3_IP, 100, None, &inner);
    let Verdict::Forward { port, frame } = upf.handle_frame(Port::Access, &frame).await else {
        panic!("Uplink packet not forwarded");
    };
    assert_eq!(port, Port::Access);
    let gtp = parse_gtpu_frame(&frame)?;
    assert_eq!(gtp.source, UPF_N3_IP);
    assert_eq!(gtp.destination, GNB_IP);
    assert_eq!(gtp.teid, 200);
    assert_eq!(gtp.inner, inner);

    // The forwarded frame also went out on the egress channel.
    let (egress_port, egress_frame) = upf.egress().recv().await?;
    assert_eq!(egress_port, Port::Access);
    assert_eq!(egress_frame, frame);
    Ok(())
}

#[async_std::test]
async fn uplink_and_downlink_to_data_network() -> anyhow::Result<()> {
    let (mut smf, upf, _logger) = init(21).await?;
    smf.perform_association_setup().await?;
    smf.establish_session_ok(
        2,
        vec![
            uplink_pdr(1, FTeid::new_ipv4(0x300, UPF_N3_IP), 1),
            downlink_pdr(2, UE_IP, 2, Some(1)),
        ],
        vec![forward_to_core_far(1), forward_to_gnb_far(2, 0x400, GNB_IP)],
        vec![qfi_qer(1, 9)],
    )
    .await?;

    // Uplink with a PDU Session Container is decapsulated toward the data network.
    let inner = ipv4_udp_packet(UE_IP, SERVER_IP, b"uplink");
    let frame = gtpu_frame(GNB_IP, UPF_N3_IP, 0x300, Some(9), &inner);
    let Verdict::Forward { port, frame } = upf.handle_frame(Port::Access, &frame).await else {
        panic!("Uplink packet not forwarded");
    };
    assert_eq!(port, Port::Core);
    assert_eq!(ip_packet_of(&frame)?, inner);

    // Downlink is tunneled to the gNB and marked with the QER's QFI.
    let inner = ipv4_udp_packet(SERVER_IP, UE_IP, b"downlink");
    let Verdict::Forward { port, frame } =
        upf.handle_frame(Port::Core, &ethernet_frame(&inner)).await
    else {
        panic!("Downlink packet not forwarded");
    };
    assert_eq!(port, Port::Access);
    let gtp = parse_gtpu_frame(&frame)?;
    assert_eq!(gtp.teid, 0x400);
    assert_eq!(gtp.qfi, Some(9));
    assert_eq!(gtp.inner, inner);

    // Traffic for some other UE is dropped.
    let other = ipv4_udp_packet(SERVER_IP, "10.45.0.99".parse()?, b"downlink");
    assert_eq!(
        upf.handle_frame(Port::Core, &ethernet_frame(&other)).await,
        Verdict::Drop(DropReason::UnknownSession)
    );
    Ok(())
}
