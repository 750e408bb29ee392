//! association_release - tear down an association and every session that came with it

use crate::data::AssociationState;
use crate::userplane::UserplaneCommand;
use crate::{HandlerApi, Procedure};
use bytes::Bytes;
use derive_deref::{Deref, DerefMut};
use pfcp::{
    AssociationReleaseRequest, AssociationReleaseResponse, Cause, PfcpHeader, PfcpMessage,
};
use slog::{Logger, info, warn};
use std::net::SocketAddr;

#[derive(Deref, DerefMut)]
pub struct AssociationReleaseProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> AssociationReleaseProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        AssociationReleaseProcedure(Procedure::new(api, logger))
    }

    // Association Release Procedure
    // 1.    Pfcp AssociationReleaseRequest >>
    // 2.    Pfcp AssociationReleaseResponse <<
    pub async fn run(
        &self,
        header: &PfcpHeader,
        _r: AssociationReleaseRequest,
        peer: SocketAddr,
    ) -> Bytes {
        self.log_message(">> AssociationReleaseRequest");
        let mut node = self.pfcp_node(&peer);
        let cause = if !node.is_associated() {
            warn!(self.logger, "Association Release from unassociated peer {node}");
            Cause::NoEstablishedPfcpAssociation
        } else {
            let seids = self.registry().remove_for_peer(&peer);
            for seid in &seids {
                self.userplane_command(UserplaneCommand::Discard(*seid))
                    .await;
            }
            info!(
                self.logger,
                "PFCP association released with {node}, removed {} sessions",
                seids.len()
            );
            node.state = AssociationState::Released;
            self.set_pfcp_node(node);
            Cause::RequestAccepted
        };
        let response = AssociationReleaseResponse {
            node_id: self.node_id(),
            cause,
        };
        self.log_message("<< AssociationReleaseResponse");
        response.encode(None, header.sequence_number)
    }
}
