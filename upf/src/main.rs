//! main - starts a UPF serving PFCP on N4 and forwarding packets between N3 and N6

use anyhow::{Result, bail};
use async_std::channel::Sender;
use async_std::prelude::*;
use clap::Parser;
use signal_hook::consts::signal::*;
use signal_hook_async_std::Signals;
use slog::{Drain, Logger, o};
use std::net::{IpAddr, Ipv4Addr};
use upf::{Config, Upf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file.  Fields missing from the file take their default values.
    #[arg(long)]
    config: Option<String>,

    /// Local IP address for N4.  The UPF binds UDP port 8805 (for PFCP) on this address.
    /// Overrides the config file.  Defaults to the eth0 address.
    #[arg(long)]
    n4_ip: Option<IpAddr>,

    /// Local IPv4 address for N3, the UPF end of GTP-U tunnels.  Overrides the config file.
    /// Defaults to the N4 address.
    #[arg(long)]
    n3_ip: Option<Ipv4Addr>,

    /// Name of the tap device on the access (N3) side.
    #[arg(long)]
    access_tap: Option<String>,

    /// Name of the tap device on the core (N6) side.
    #[arg(long)]
    core_tap: Option<String>,
}

#[async_std::main]
async fn main() -> Result<()> {
    exit_on_panic();
    let logger = init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(filename) => upf::load_config_file(filename, &logger)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, args)?;

    let upf = Upf::start(config, logger).await?;

    wait_for_signal().await?;
    upf.graceful_shutdown().await;

    Ok(())
}

fn apply_overrides(config: &mut Config, args: Args) -> Result<()> {
    match (args.n4_ip, &args.config) {
        (Some(ip), _) => config.n4_ip_addr = ip,
        (None, None) => config.n4_ip_addr = local_ip_address::local_ip()?,
        (None, Some(_)) => {}
    }
    match (args.n3_ip, config.n4_ip_addr) {
        (Some(ip), _) => config.n3_ip_addr = ip,
        (None, IpAddr::V4(n4_ip)) if args.config.is_none() => config.n3_ip_addr = n4_ip,
        (None, IpAddr::V6(_)) if args.config.is_none() => {
            bail!("--n3-ip is needed when the N4 address is IPv6")
        }
        _ => {}
    }
    if args.access_tap.is_some() {
        config.access_tap_name = args.access_tap;
    }
    if args.core_tap.is_some() {
        config.core_tap_name = args.core_tap;
    }
    Ok(())
}

fn init_logging() -> Logger {
    // Use info level logging by default
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info") }
    }
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog_envlogger::new(drain);
    slog::Logger::root(drain, o!())
}

fn exit_on_panic() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::exit(1);
    }));
}

async fn wait_for_signal() -> Result<i32> {
    let signals = Signals::new([SIGHUP, SIGTERM, SIGINT, SIGQUIT])?;
    let handle = signals.handle();
    let (sig_sender, sig_receiver) = async_std::channel::unbounded();
    let signals_task = async_std::task::spawn(handle_signals(signals, sig_sender));
    let signal = sig_receiver.recv().await;
    handle.close();
    signals_task.await;
    Ok(signal?)
}

async fn handle_signals(signals: Signals, sig_sender: Sender<i32>) {
    let mut signals = signals.fuse();
    while let Some(signal) = signals.next().await {
        match signal {
            SIGHUP => {
                // Configuration is only read at startup
            }
            SIGTERM | SIGINT | SIGQUIT => {
                let _ = sig_sender.send(signal).await;
            }
            _ => {}
        }
    }
}
