use super::MockSmf;
use anyhow::Result;
use slog::{Drain, Logger, o};
use std::net::Ipv4Addr;
use upf::{Config, Upf};

/// The UPF end of GTP-U tunnels in every test.
pub const UPF_N3_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
pub const GNB_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const UE_IP: Ipv4Addr = Ipv4Addr::new(10, 45, 0, 1);
pub const SERVER_IP: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// Start a UPF and a mock SMF.  Tests run in parallel, so each passes a different `test_id`,
/// giving the pair of them their own loopback addresses.
pub async fn init(test_id: u8) -> Result<(MockSmf, Upf, Logger)> {
    exit_on_panic();
    let upf_ip = format!("127.0.10.{test_id}");
    let smf_ip = format!("127.0.20.{test_id}");
    let logger = init_logging();
    let upf = start_upf(&upf_ip, &logger).await?;
    let smf = MockSmf::new(&smf_ip, upf.n4_addr()?, &logger).await?;
    Ok((smf, upf, logger))
}

fn exit_on_panic() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::exit(1);
    }));
}

fn init_logging() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build();
    let drain = std::sync::Mutex::new(drain).fuse();
    let drain = slog_envlogger::new(drain);
    slog::Logger::root(drain, o!())
}

async fn start_upf(addr: &str, logger: &Logger) -> Result<Upf> {
    Upf::start(
        Config {
            n4_ip_addr: addr.parse()?,
            n3_ip_addr: UPF_N3_IP,
            ..Default::default()
        },
        logger.new(o!("upf" => 1)),
    )
    .await
}
