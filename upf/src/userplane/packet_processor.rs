use super::counters::{counter_indices::*, dump_stats};
use super::pipeline::Pipeline;
use super::{Counters, DownlinkDataNotification, Engine, PacketBuffer, Port, Verdict};
use crate::Config;
use crate::data::SessionRegistry;
use anyhow::{Result, bail};
use async_channel::{Receiver, Sender};
use async_std::{fs::File, io::WriteExt};
use async_tun::{Tun, TunBuilder};
use atomic_counter::AtomicCounter;
use slog::{Logger, debug, info, o, warn};
use std::os::fd::{AsRawFd, FromRawFd};
use std::sync::Arc;

/// Instructions from the signaling side to the data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserplaneCommand {
    /// Send the session's buffered packets, in the order they were buffered.
    Flush(u64),
    /// Throw away the session's buffered packets.
    Discard(u64),
}

#[derive(Clone)]
pub struct PacketProcessor {
    engine: Arc<Engine>,
    commands: Sender<UserplaneCommand>,
    egress_sender: Sender<(Port, Vec<u8>)>,
    egress_receiver: Receiver<(Port, Vec<u8>)>,
}

impl PacketProcessor {
    pub async fn new(
        config: &Config,
        registry: Arc<SessionRegistry>,
        notifications: Sender<DownlinkDataNotification>,
        logger: &Logger,
    ) -> Result<Self> {
        let buffer = Arc::new(PacketBuffer::new(config.buffer_capacity));
        let counters = Arc::new(Counters::default());
        let engine = Arc::new(Engine::new(
            config.clone(),
            registry,
            buffer.clone(),
            counters.clone(),
            notifications,
            logger.new(o!("dp" => 1)),
        ));
        let (egress_sender, egress_receiver) = async_channel::unbounded();

        // Open the packet source/sinks.  With no tap devices, frames are passed in through
        // handle_frame() and forwarded frames are collected from egress().
        let mut access_writer = None;
        let mut core_writer = None;
        for (port, name, writer) in [
            (Port::Access, &config.access_tap_name, &mut access_writer),
            (Port::Core, &config.core_tap_name, &mut core_writer),
        ] {
            if let Some(name) = name {
                let tap = open_tap_device(name, port, logger).await?;
                *writer = Some(unsafe { File::from_raw_fd(tap.as_raw_fd()) });
                let _pipeline_task = Pipeline::new(port, tap, engine.clone(), egress_sender.clone())
                    .run(logger.new(o!("port" => port.to_string())));
            }
        }
        if access_writer.is_some() || core_writer.is_some() {
            let _transmit_task = async_std::task::spawn(transmit(
                egress_receiver.clone(),
                access_writer,
                core_writer,
                logger.clone(),
            ));
        }

        let (commands, command_receiver) = async_channel::unbounded();
        let _command_task = async_std::task::spawn(handle_commands(
            command_receiver,
            engine.clone(),
            buffer,
            counters.clone(),
            egress_sender.clone(),
            logger.clone(),
        ));

        // Spawn the stats task
        let _stats_task = async_std::task::spawn(dump_stats(logger.clone(), counters));

        Ok(PacketProcessor {
            engine,
            commands,
            egress_sender,
            egress_receiver,
        })
    }

    /// Process a frame as if it had been received on the given port.
    pub async fn handle_frame(&self, port: Port, frame: &[u8]) -> Verdict {
        let verdict = self.engine.process(port, frame).await;
        if let Verdict::Forward { port, frame } = &verdict {
            let _ = self.egress_sender.send((*port, frame.clone())).await;
        }
        verdict
    }

    /// Frames leaving the UPF.  Only meaningful when no tap devices are configured.
    pub fn egress(&self) -> Receiver<(Port, Vec<u8>)> {
        self.egress_receiver.clone()
    }

    pub async fn command(&self, command: UserplaneCommand) {
        let _ = self.commands.send(command).await;
    }
}

async fn handle_commands(
    commands: Receiver<UserplaneCommand>,
    engine: Arc<Engine>,
    buffer: Arc<PacketBuffer>,
    counters: Arc<Counters>,
    egress: Sender<(Port, Vec<u8>)>,
    logger: Logger,
) {
    while let Ok(command) = commands.recv().await {
        match command {
            UserplaneCommand::Flush(seid) => {
                let released = engine.flush(seid, &egress).await;
                debug!(logger, "Flushed {released} buffered packets of session {seid}");
                if egress.is_closed() {
                    return;
                }
            }
            UserplaneCommand::Discard(seid) => {
                let discarded = buffer.discard(seid).await;
                if discarded > 0 {
                    debug!(logger, "Discarded {discarded} buffered packets of session {seid}");
                    counters[DROP_DISCARDED].add(discarded);
                }
            }
        }
    }
}

async fn transmit(
    frames: Receiver<(Port, Vec<u8>)>,
    mut access: Option<File>,
    mut core: Option<File>,
    logger: Logger,
) {
    while let Ok((port, frame)) = frames.recv().await {
        let device = match port {
            Port::Access => access.as_mut(),
            Port::Core => core.as_mut(),
        };
        let Some(device) = device else {
            debug!(logger, "No {port} tap device - dropping frame");
            continue;
        };
        if let Err(e) = device.write_all(&frame).await {
            warn!(logger, "Failed to write to {port} tap device - {e}");
        }
    }
}

async fn open_tap_device(tap_device_name: &str, port: Port, logger: &Logger) -> Result<Tun> {
    match TunBuilder::new()
        .name(tap_device_name)
        .tap(true)
        .packet_info(false)
        .try_build()
        .await
    {
        Ok(tap) => {
            info!(logger, "Opened tap device '{tap_device_name}' for {port} side");
            Ok(tap)
        }
        Err(e) => bail!(
            "Failed to open tap device '{tap_device_name}' - have you followed the instructions in the readme?
Device open error code: {e}
 EPERM: may indicate that the device doesn't exist or is not owned by the current user
 EINVAL: may indicate that the device is actually a tun device rather than a tap device
 EBUSY: another process, e.g. another upf instance, has the device open"
        ),
    }
}
