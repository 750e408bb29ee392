//! session_deletion - remove a session and everything it owns

use crate::userplane::UserplaneCommand;
use crate::{HandlerApi, Procedure};
use bytes::Bytes;
use derive_deref::{Deref, DerefMut};
use pfcp::{Cause, PfcpHeader, PfcpMessage, SessionDeletionRequest, SessionDeletionResponse};
use slog::{Logger, info, warn};

#[derive(Deref, DerefMut)]
pub struct SessionDeletionProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> SessionDeletionProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        SessionDeletionProcedure(Procedure::new(api, logger))
    }

    // Session Deletion Procedure
    // 1.    Pfcp SessionDeletionRequest >>
    // 2.    Pfcp SessionDeletionResponse <<
    pub async fn run(&self, header: &PfcpHeader, _r: SessionDeletionRequest) -> Bytes {
        self.log_message(">> SessionDeletionRequest");
        let seid = header.seid.unwrap_or(0);
        let (cause, remote_seid) = match self.registry().remove(seid) {
            Some(session) => {
                self.userplane_command(UserplaneCommand::Discard(seid))
                    .await;
                info!(self.logger, "Deleted session {seid}");
                (Cause::RequestAccepted, session.remote_seid)
            }
            None => {
                warn!(self.logger, "Session Deletion Request for unknown SEID {seid}");
                (Cause::SessionContextNotFound, 0)
            }
        };
        let response = SessionDeletionResponse { cause };
        self.log_message("<< SessionDeletionResponse");
        response.encode(Some(remote_seid), header.sequence_number)
    }
}
