#![allow(clippy::unusual_byte_groupings)]
//! gtpu - GTP-U header parsing and GTP-U/UDP/IPv4 encapsulation, TS29.281

use super::{GTPU_PORT, IPV4_HEADER_LEN, UDP_HEADER_LEN};
use anyhow::{Result, bail, ensure};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::udp::{self, MutableUdpPacket};
use std::net::Ipv4Addr;

pub const GTP_MESSAGE_TYPE_GPU: u8 = 255; // TS29.281, table 6.1-1
pub const GTP_BASE_HEADER_LEN: usize = 8;
pub const GTP_OPTIONAL_FIELDS_LEN: usize = 4;
pub const EXT_PDU_SESSION_CONTAINER: u8 = 0x85; // TS29.281, 5.2.1.3

const FLAG_E: u8 = 0b000_0_0_1_0_0;
const FLAG_S: u8 = 0b000_0_0_0_1_0;
const FLAG_PN: u8 = 0b000_0_0_0_0_1;

/// The parts of a GTP-U header the data plane needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GtpuHeader {
    pub message_type: u8,
    pub teid: u32,
    /// Length of the header including optional fields and every extension header.
    pub header_len: usize,
    /// QFI found in a PDU Session Container, if there was one.
    pub qfi: Option<u8>,
}

impl GtpuHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure!(buf.len() >= GTP_BASE_HEADER_LEN, "GTP-U header too short");
        let flags = buf[0];
        ensure!(flags >> 5 == 1, "GTP version {} not supported", flags >> 5);
        let message_type = buf[1];
        let teid = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let mut header_len = GTP_BASE_HEADER_LEN;
        let mut qfi = None;

        if flags & (FLAG_E | FLAG_S | FLAG_PN) != 0 {
            header_len += GTP_OPTIONAL_FIELDS_LEN;
            ensure!(buf.len() >= header_len, "GTP-U optional fields missing");
            let mut next_type = if flags & FLAG_E != 0 {
                buf[header_len - 1]
            } else {
                0
            };

            // Each extension header gives its own length in units of 4 bytes and ends
            // with the type of the next one.
            while next_type != 0 {
                let Some(&units) = buf.get(header_len) else {
                    bail!("GTP-U extension header truncated");
                };
                ensure!(units != 0, "GTP-U extension header of length 0");
                let ext_len = units as usize * 4;
                ensure!(
                    buf.len() >= header_len + ext_len,
                    "GTP-U extension header truncated"
                );
                if next_type == EXT_PDU_SESSION_CONTAINER {
                    qfi = Some(buf[header_len + 2] & 0x3f);
                }
                header_len += ext_len;
                next_type = buf[header_len - 1];
            }
        }

        Ok(GtpuHeader {
            message_type,
            teid,
            header_len,
            qfi,
        })
    }
}

/// QoS flow marking carried in the PDU Session Container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosMarking {
    pub qfi: u8,
    pub rqi: bool,
    pub downlink: bool,
}

/// Where and how to send an encapsulated packet.
#[derive(Debug, Clone, Copy)]
pub struct Tunnel {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub teid: u32,
    pub port: u16,
}

/// Wrap an inner IP packet in GTP-U/UDP/IPv4.  A PDU Session Container is added if QoS
/// marking is given.
pub fn encapsulate(tunnel: &Tunnel, marking: Option<QosMarking>, inner: &[u8]) -> Vec<u8> {
    let gtp_len = match marking {
        Some(_) => GTP_BASE_HEADER_LEN + GTP_OPTIONAL_FIELDS_LEN + 4,
        None => GTP_BASE_HEADER_LEN,
    };
    let total_len = IPV4_HEADER_LEN + UDP_HEADER_LEN + gtp_len + inner.len();
    let mut packet = vec![0u8; total_len];

    // ---- GTP header, TS29.281, 5.1 ----
    let gtp = &mut packet[IPV4_HEADER_LEN + UDP_HEADER_LEN..];
    let gtp_payload_len = ((gtp_len - GTP_BASE_HEADER_LEN + inner.len()) as u16).to_be_bytes();
    gtp[0] = 0b001_1_0_0_0_0; // version=1, PT=1, R, E=0, S=0, PN=0
    gtp[1] = GTP_MESSAGE_TYPE_GPU;
    gtp[2] = gtp_payload_len[0];
    gtp[3] = gtp_payload_len[1];
    gtp[4..8].copy_from_slice(&tunnel.teid.to_be_bytes());

    if let Some(marking) = marking {
        gtp[0] |= FLAG_E;
        // Sequence number and N-PDU number are not used.
        gtp[11] = EXT_PDU_SESSION_CONTAINER;

        // ---- PDU Session Container, TS38.415, 5.5.2 ----
        gtp[12] = 1; // length / 4
        if marking.downlink {
            gtp[13] = 0b0000_0000; // PDU type 0 = DL PDU SESSION INFORMATION
            gtp[14] = ((marking.rqi as u8) << 6) | (marking.qfi & 0x3f);
        } else {
            gtp[13] = 0b0001_0000; // PDU type 1 = UL PDU SESSION INFORMATION
            gtp[14] = marking.qfi & 0x3f;
        }
        gtp[15] = 0; // no next extension header
    }
    gtp[gtp_len..].copy_from_slice(inner);

    // ---- UDP header ----
    let udp_len = (UDP_HEADER_LEN + gtp_len + inner.len()) as u16;
    if let Some(mut udp_packet) = MutableUdpPacket::new(&mut packet[IPV4_HEADER_LEN..]) {
        udp_packet.set_source(GTPU_PORT);
        udp_packet.set_destination(tunnel.port);
        udp_packet.set_length(udp_len);
        let checksum =
            udp::ipv4_checksum(&udp_packet.to_immutable(), &tunnel.source, &tunnel.destination);
        udp_packet.set_checksum(checksum);
    }

    // ---- Outer IPv4 header ----
    if let Some(mut ipv4_packet) = MutableIpv4Packet::new(&mut packet[..IPV4_HEADER_LEN]) {
        ipv4_packet.set_version(4);
        ipv4_packet.set_header_length((IPV4_HEADER_LEN / 4) as u8);
        ipv4_packet.set_total_length(total_len as u16);
        ipv4_packet.set_ttl(64);
        ipv4_packet.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        ipv4_packet.set_source(tunnel.source);
        ipv4_packet.set_destination(tunnel.destination);
        let checksum = ipv4::checksum(&ipv4_packet.to_immutable());
        ipv4_packet.set_checksum(checksum);
    }

    packet
}
