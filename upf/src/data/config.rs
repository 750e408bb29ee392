use anyhow::{Result, ensure};
use serde::Deserialize;
use slog::{Logger, error, info};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};

/// Order in which the data plane scans a session's PDRs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PdrMatchOrder {
    /// First matching PDR in the order the PDRs were created.
    #[default]
    Insertion,
    /// Matching PDR with the lowest precedence value.
    Precedence,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    // The N4 IP address.  PFCP is served on UDP port 8805 on this address, and
    // it is also signaled as the UPF's Node ID.
    pub n4_ip_addr: IpAddr,

    // The N3 IP address - the UPF end of GTP-U tunnels.  Uplink packets are recognized
    // by this destination address, and it is the source address of encapsulated packets.
    pub n3_ip_addr: Ipv4Addr,

    // Name of the tap device on the access side (port 0).  If neither tap device is
    // configured, packets are only passed through the API.
    pub access_tap_name: Option<String>,

    // Name of the tap device on the core side (port 1).
    pub core_tap_name: Option<String>,

    // MAC addresses used to build the link layer header of egress frames.
    #[serde(with = "hex")]
    pub access_local_mac: [u8; 6],
    #[serde(with = "hex")]
    pub access_next_hop_mac: [u8; 6],
    #[serde(with = "hex")]
    pub core_local_mac: [u8; 6],
    #[serde(with = "hex")]
    pub core_next_hop_mac: [u8; 6],

    // Maximum number of buffered downlink packets, across all sessions.
    pub buffer_capacity: usize,

    // Longest SDF filter flow description accepted from the SMF.
    pub max_flow_description_len: usize,

    pub pdr_match_order: PdrMatchOrder,

    // Depth of the queue of downlink data notifications from the data plane.
    pub report_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            n4_ip_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            n3_ip_addr: Ipv4Addr::LOCALHOST,
            access_tap_name: None,
            core_tap_name: None,
            access_local_mac: [0x02, 0, 0, 0, 0, 0x01],
            access_next_hop_mac: [0x02, 0, 0, 0, 0, 0x02],
            core_local_mac: [0x02, 0, 0, 0, 0, 0x11],
            core_next_hop_mac: [0x02, 0, 0, 0, 0, 0x12],
            buffer_capacity: 1600,
            max_flow_description_len: 256,
            pdr_match_order: PdrMatchOrder::Insertion,
            report_queue_depth: 256,
        }
    }
}

impl Config {
    pub fn check(&self) -> Result<()> {
        ensure!(
            !self.n4_ip_addr.is_unspecified(),
            "Unspecified N4 address not allowed - this must be an address that the SMF can send to"
        );
        ensure!(
            !self.n3_ip_addr.is_unspecified(),
            "Unspecified N3 address not allowed - this is the GTP-U address signaled to the SMF"
        );
        ensure!(self.buffer_capacity > 0, "Buffer capacity must be non zero");
        ensure!(
            self.report_queue_depth > 0,
            "Report queue depth must be non zero"
        );
        Ok(())
    }
}

/// Load the config from a TOML file.  Fields missing from the file take their default values.
pub fn load_config_file(filename: &str, logger: &Logger) -> Result<Config> {
    let path = std::env::current_dir()?;
    let contents = fs::read_to_string(filename).inspect_err(|e| {
        error!(
            logger,
            "Failed to load config file {filename} (current directory {}) with error code {e}",
            path.display()
        )
    })?;
    let config: Config = toml::from_str(&contents)?;
    info!(logger, "Loaded config from {filename}");
    Ok(config)
}
