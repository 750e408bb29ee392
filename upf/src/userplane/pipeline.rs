use super::{Engine, Port, Verdict};
use anyhow::Result;
use async_channel::Sender;
use async_std::{
    io::ReadExt,
    task::{self, JoinHandle},
};
use async_tun::Tun;
use slog::{Logger, info};
use std::sync::Arc;

/// Reads frames from one tap device, runs them through the engine and queues forwarded
/// frames for transmission.
pub struct Pipeline {
    port: Port,
    tap_device: Tun,
    engine: Arc<Engine>,
    egress: Sender<(Port, Vec<u8>)>,
}

impl Pipeline {
    pub fn new(
        port: Port,
        tap_device: Tun,
        engine: Arc<Engine>,
        egress: Sender<(Port, Vec<u8>)>,
    ) -> Self {
        Pipeline {
            port,
            tap_device,
            engine,
            egress,
        }
    }

    pub fn run(self, logger: Logger) -> JoinHandle<()> {
        task::spawn(async move {
            let mut buf = [0u8; 2000];
            loop {
                if let Err(e) = self.handle_next_frame(&mut buf).await {
                    info!(logger, "Exiting {} pipeline with error {e}", self.port);
                    break;
                }
            }
        })
    }

    async fn handle_next_frame(&self, buf: &mut [u8; 2000]) -> Result<()> {
        let bytes_read = self.tap_device.reader().read(buf).await?;
        if let Verdict::Forward { port, frame } =
            self.engine.process(self.port, &buf[..bytes_read]).await
        {
            self.egress.send((port, frame)).await?;
        }
        Ok(())
    }
}
