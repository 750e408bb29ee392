//! pfcp_server - the N4 socket and the task that serves it

use crate::HandlerApi;
use crate::procedures::PfcpHandler;
use crate::userplane::DownlinkDataNotification;
use anyhow::{Context, Result};
use async_channel::Receiver;
use async_std::net::UdpSocket;
use async_std::task::JoinHandle;
use pfcp::PFCP_PORT;
use slog::{Logger, info, o, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use stop_token::future::FutureExt;
use stop_token::{StopSource, StopToken};

const MAX_PFCP_DATAGRAM: usize = 65535;

/// Stops a server task and waits for it to finish.
pub struct ShutdownHandle {
    handle: JoinHandle<()>,
    stop_source: StopSource,
}

impl ShutdownHandle {
    pub fn new(handle: JoinHandle<()>, stop_source: StopSource) -> Self {
        ShutdownHandle {
            handle,
            stop_source,
        }
    }

    pub async fn graceful_shutdown(self) {
        drop(self.stop_source);
        self.handle.await
    }
}

pub fn create_n4_socket(local_ip: IpAddr, logger: &Logger) -> Result<UdpSocket> {
    let transport_address = SocketAddr::new(local_ip, PFCP_PORT);
    let domain = match local_ip {
        IpAddr::V4(_) => Domain::IPV4,
        IpAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket
        .bind(&transport_address.into())
        .context(format!("Failed to bind {}", transport_address))?;
    info!(logger, "Serving PFCP on {transport_address}");
    let socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from(socket))
}

/// Spawn the PFCP server task.  This task is the only one that changes sessions: it handles
/// requests from SMFs and downlink data notifications from the data plane one at a time.
pub fn serve<A: HandlerApi>(
    socket: Arc<UdpSocket>,
    handler: PfcpHandler<A>,
    notifications: Receiver<DownlinkDataNotification>,
    logger: Logger,
) -> ShutdownHandle {
    let stop_source = StopSource::new();
    let stop_token = stop_source.token();
    let handle = async_std::task::spawn(run(socket, handler, notifications, stop_token, logger));
    ShutdownHandle::new(handle, stop_source)
}

enum Event {
    Datagram(std::io::Result<(usize, SocketAddr)>),
    Notification(Option<DownlinkDataNotification>),
}

async fn run<A: HandlerApi>(
    socket: Arc<UdpSocket>,
    handler: PfcpHandler<A>,
    notifications: Receiver<DownlinkDataNotification>,
    stop_token: StopToken,
    logger: Logger,
) {
    let mut buf = vec![0u8; MAX_PFCP_DATAGRAM];
    loop {
        let next_event = futures_lite::future::race(
            async { Event::Datagram(socket.recv_from(&mut buf).await) },
            async { Event::Notification(notifications.recv().await.ok()) },
        );
        let Ok(event) = next_event.timeout_at(stop_token.clone()).await else {
            info!(logger, "PFCP server stopped");
            return;
        };

        match event {
            Event::Datagram(Ok((len, peer))) => {
                let peer_logger = logger.new(o!("peer" => peer.to_string()));
                if let Some(response) = handler
                    .handle_datagram(&buf[..len], peer, &peer_logger)
                    .await
                {
                    if let Err(e) = socket.send_to(&response, peer).await {
                        warn!(peer_logger, "Failed to send PFCP response - {e}");
                    }
                }
            }
            Event::Datagram(Err(e)) => warn!(logger, "PFCP socket receive error - {e}"),
            Event::Notification(Some(notification)) => {
                handler.handle_downlink_data(notification, &logger).await
            }
            Event::Notification(None) => {
                warn!(logger, "Data plane notification channel closed");
                return;
            }
        }
    }
}
