//! association_setup - establish a PFCP association with an SMF

use crate::data::AssociationState;
use crate::{HandlerApi, Procedure};
use bytes::Bytes;
use derive_deref::{Deref, DerefMut};
use pfcp::{AssociationSetupRequest, AssociationSetupResponse, Cause, PfcpHeader, PfcpMessage};
use slog::{Logger, info, warn};
use std::net::SocketAddr;

#[derive(Deref, DerefMut)]
pub struct AssociationSetupProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> AssociationSetupProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        AssociationSetupProcedure(Procedure::new(api, logger))
    }

    // Association Setup Procedure
    // 1.    Pfcp AssociationSetupRequest >>
    // 2.    Pfcp AssociationSetupResponse <<
    pub fn run(&self, header: &PfcpHeader, r: AssociationSetupRequest, peer: SocketAddr) -> Bytes {
        self.log_message(">> AssociationSetupRequest");
        let cause = match r.node_id {
            Some(node_id) => {
                let mut node = self.pfcp_node(&peer);
                if node.is_associated() {
                    info!(self.logger, "Association with {node} replaced");
                }
                node.state = AssociationState::Associated;
                node.node_id = Some(node_id);
                node.recovery_time_stamp = r.recovery_time_stamp.map(|x| x.0);
                info!(self.logger, "PFCP association set up with {node}");
                self.set_pfcp_node(node);
                Cause::RequestAccepted
            }
            None => {
                warn!(self.logger, "Association Setup Request without Node ID");
                Cause::MandatoryIeMissing
            }
        };
        let response = AssociationSetupResponse {
            node_id: self.node_id(),
            cause,
            recovery_time_stamp: self.recovery_time_stamp(),
        };
        self.log_message("<< AssociationSetupResponse");
        response.encode(None, header.sequence_number)
    }
}
