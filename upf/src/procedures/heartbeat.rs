//! heartbeat - liveness check between PFCP peers

use crate::{HandlerApi, Procedure};
use bytes::Bytes;
use derive_deref::{Deref, DerefMut};
use pfcp::{HeartbeatRequest, HeartbeatResponse, PfcpHeader, PfcpMessage};
use slog::Logger;

#[derive(Deref, DerefMut)]
pub struct HeartbeatProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> HeartbeatProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        HeartbeatProcedure(Procedure::new(api, logger))
    }

    // Heartbeat Procedure
    // 1.    Pfcp HeartbeatRequest >>
    // 2.    Pfcp HeartbeatResponse <<
    pub fn run(&self, header: &PfcpHeader, _r: HeartbeatRequest) -> Bytes {
        self.log_message(">> HeartbeatRequest");
        let response = HeartbeatResponse {
            recovery_time_stamp: self.recovery_time_stamp(),
        };
        self.log_message("<< HeartbeatResponse");
        response.encode(None, header.sequence_number)
    }
}
