//! association_update - the SMF changes the parameters of an existing association

use crate::{HandlerApi, Procedure};
use bytes::Bytes;
use derive_deref::{Deref, DerefMut};
use pfcp::{
    AssociationUpdateRequest, AssociationUpdateResponse, Cause, PfcpHeader, PfcpMessage,
};
use slog::{Logger, info, warn};
use std::net::SocketAddr;

#[derive(Deref, DerefMut)]
pub struct AssociationUpdateProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> AssociationUpdateProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        AssociationUpdateProcedure(Procedure::new(api, logger))
    }

    // Association Update Procedure
    // 1.    Pfcp AssociationUpdateRequest >>
    // 2.    Pfcp AssociationUpdateResponse <<
    pub fn run(&self, header: &PfcpHeader, r: AssociationUpdateRequest, peer: SocketAddr) -> Bytes {
        self.log_message(">> AssociationUpdateRequest");
        let mut node = self.pfcp_node(&peer);
        let cause = if !node.is_associated() {
            warn!(self.logger, "Association Update from unassociated peer {node}");
            Cause::NoEstablishedPfcpAssociation
        } else {
            if let Some(node_id) = r.node_id {
                node.node_id = Some(node_id);
            }
            info!(self.logger, "PFCP association updated with {node}");
            self.set_pfcp_node(node);
            Cause::RequestAccepted
        };
        let response = AssociationUpdateResponse {
            node_id: self.node_id(),
            cause,
        };
        self.log_message("<< AssociationUpdateResponse");
        response.encode(None, header.sequence_number)
    }
}
