//! packets - build and pick apart the frames that tests pass through the UPF

#![allow(clippy::unusual_byte_groupings)]
use anyhow::{Result, bail, ensure};
use pnet_packet::Packet;
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{Ipv4Packet, MutableIpv4Packet};
use pnet_packet::udp::{MutableUdpPacket, UdpPacket};
use std::net::Ipv4Addr;

const ETH_HEADER_LEN: usize = 14;
const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const GTPU_PORT: u16 = 2152; // TS29.281
const GTP_MESSAGE_TYPE_GPU: u8 = 255; // TS29.281, table 6.1-1
const TEST_UDP_PORT: u16 = 23215;

/// An IPv4 UDP packet with correct checksums.
pub fn ipv4_udp_packet(src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    ipv4_udp_packet_with_ports(src, TEST_UDP_PORT, dst, TEST_UDP_PORT, payload)
}

fn ipv4_udp_packet_with_ports(
    src: Ipv4Addr,
    src_port: u16,
    dst: Ipv4Addr,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let total_len = IPV4_HEADER_LEN + UDP_HEADER_LEN + payload.len();
    let mut packet = vec![0u8; total_len];

    let mut udp = MutableUdpPacket::new(&mut packet[IPV4_HEADER_LEN..]).unwrap();
    udp.set_source(src_port);
    udp.set_destination(dst_port);
    udp.set_length((UDP_HEADER_LEN + payload.len()) as u16);
    udp.set_payload(payload);
    let checksum = pnet_packet::udp::ipv4_checksum(&udp.to_immutable(), &src, &dst);
    udp.set_checksum(checksum);

    let mut ip = MutableIpv4Packet::new(&mut packet).unwrap();
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length(total_len as u16);
    ip.set_ttl(64);
    ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
    ip.set_source(src);
    ip.set_destination(dst);
    let checksum = pnet_packet::ipv4::checksum(&ip.to_immutable());
    ip.set_checksum(checksum);
    packet
}

/// Wrap an IPv4 packet in an Ethernet header.  The UPF doesn't look at the MAC addresses.
pub fn ethernet_frame(ip_packet: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        0x02, 0, 0, 0, 0, 0x01, // destination
        0x02, 0, 0, 0, 0, 0x02, // source
        0x08, 0x00, // IPv4
    ];
    frame.extend_from_slice(ip_packet);
    frame
}

/// A frame carrying a GTP-U G-PDU from the gNB, as it arrives on the access side.  With a QFI,
/// the GTP-U header has an uplink PDU Session Container.
pub fn gtpu_frame(
    gnb: Ipv4Addr,
    upf: Ipv4Addr,
    teid: u32,
    qfi: Option<u8>,
    inner: &[u8],
) -> Vec<u8> {
    let mut gtp = match qfi {
        None => vec![
            0b001_1_0_0_0_0, // version, PT, R, E, S, PN
            GTP_MESSAGE_TYPE_GPU,
            0,
            0, // length, filled in below
        ],
        Some(_) => vec![
            0b001_1_0_1_0_0, // version, PT, R, E=1, S, PN
            GTP_MESSAGE_TYPE_GPU,
            0,
            0,
        ],
    };
    gtp.extend_from_slice(&teid.to_be_bytes());
    if let Some(qfi) = qfi {
        gtp.extend_from_slice(&[
            0, 0,    // sequence number
            0,    // N-PDU number
            0x85, // next extension header = PDU Session Container
            1,    // extension length in 4 octet units
            0x10, // PDU type 1 = UL PDU SESSION INFORMATION
            qfi & 0b0011_1111,
            0, // no more extension headers
        ]);
    }
    gtp.extend_from_slice(inner);
    let gtp_len = (gtp.len() - 8) as u16;
    gtp[2..4].copy_from_slice(&gtp_len.to_be_bytes());

    ethernet_frame(&ipv4_udp_packet_with_ports(
        gnb, GTPU_PORT, upf, GTPU_PORT, &gtp,
    ))
}

/// The parts of a GTP-U encapsulated frame sent by the UPF.
#[derive(Debug)]
pub struct GtpuFrame {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub teid: u32,
    pub qfi: Option<u8>,
    pub inner: Vec<u8>,
}

pub fn parse_gtpu_frame(frame: &[u8]) -> Result<GtpuFrame> {
    ensure!(frame.len() > ETH_HEADER_LEN, "Frame too short");
    let Some(ip) = Ipv4Packet::new(&frame[ETH_HEADER_LEN..]) else {
        bail!("No IPv4 header");
    };
    ensure!(
        ip.get_next_level_protocol() == IpNextHeaderProtocols::Udp,
        "Not UDP"
    );
    let Some(udp) = UdpPacket::new(ip.payload()) else {
        bail!("No UDP header");
    };
    ensure!(udp.get_destination() == GTPU_PORT, "Not to the GTP-U port");
    let gtp = udp.payload();
    ensure!(gtp.len() >= 8 && gtp[1] == GTP_MESSAGE_TYPE_GPU, "Not a G-PDU");
    let teid = u32::from_be_bytes([gtp[4], gtp[5], gtp[6], gtp[7]]);

    let mut offset = 8;
    let mut qfi = None;
    if gtp[0] & 0b111 != 0 {
        ensure!(gtp.len() >= 12, "Optional fields missing");
        let mut next_type = gtp[11];
        offset = 12;
        while next_type != 0 {
            ensure!(gtp.len() > offset, "Extension header missing");
            let len = gtp[offset] as usize * 4;
            ensure!(len > 0 && gtp.len() >= offset + len, "Bad extension header");
            if next_type == 0x85 {
                qfi = Some(gtp[offset + 2] & 0b0011_1111);
            }
            next_type = gtp[offset + len - 1];
            offset += len;
        }
    }

    Ok(GtpuFrame {
        source: ip.get_source(),
        destination: ip.get_destination(),
        teid,
        qfi,
        inner: gtp[offset..].to_vec(),
    })
}

/// The IPv4 packet in a frame sent by the UPF on the core side.
pub fn ip_packet_of(frame: &[u8]) -> Result<Vec<u8>> {
    ensure!(frame.len() > ETH_HEADER_LEN, "Frame too short");
    ensure!(frame[12..14] == [0x08, 0x00], "Not IPv4");
    Ok(frame[ETH_HEADER_LEN..].to_vec())
}
