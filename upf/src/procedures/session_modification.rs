//! session_modification - apply rule changes from the SMF to an existing session

use super::rules::{RuleOutcome, TeidAllocator, check_keys, warn_unsupported};
use crate::data::RuleError;
use crate::userplane::UserplaneCommand;
use crate::{HandlerApi, Procedure};
use bytes::Bytes;
use derive_deref::{Deref, DerefMut};
use pfcp::{
    Cause, CreatedPdr, PfcpHeader, PfcpMessage, SessionModificationRequest,
    SessionModificationResponse,
};
use slog::{Logger, debug, info, o, warn};

#[derive(Deref, DerefMut)]
pub struct SessionModificationProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> SessionModificationProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        SessionModificationProcedure(Procedure::new(api, logger))
    }

    // Session Modification Procedure
    // 1.    Pfcp SessionModificationRequest >>
    // 2.    Pfcp SessionModificationResponse <<
    pub async fn run(&self, header: &PfcpHeader, r: SessionModificationRequest) -> Bytes {
        self.log_message(">> SessionModificationRequest");
        let seid = header.seid.unwrap_or(0);
        let Some(session) = self.registry().find_by_seid(seid) else {
            warn!(self.logger, "Session Modification Request for unknown SEID {seid}");
            self.log_message("<< SessionModificationResponse");
            return SessionModificationResponse::with_cause(Cause::SessionContextNotFound)
                .encode(Some(0), header.sequence_number);
        };
        let logger = self.logger.new(o!("seid" => seid));
        let mut session = (*session).clone();
        let mut outcome = RuleOutcome::new(&logger);

        if let Some(cp_f_seid) = r.cp_f_seid {
            session.remote_seid = cp_f_seid.seid;
        }
        if r.urr_operations > 0 {
            warn!(
                logger,
                "Ignoring {} URR operations - usage reporting not supported", r.urr_operations
            );
        }

        // Creates and updates of FARs and QERs before PDRs, so that PDR references resolve.
        for far in r.create_fars {
            if let Some(far) = outcome.decoded("Create FAR", far) {
                outcome.applied("Create FAR", session.create_far(far));
            }
        }
        for qer in r.create_qers {
            if let Some(qer) = outcome.decoded("Create QER", qer) {
                outcome.applied("Create QER", session.create_qer(qer));
            }
        }
        let mut transitions = Vec::new();
        for far in r.update_fars {
            if let Some(far) = outcome.decoded("Update FAR", far) {
                if let Some(t) = outcome.applied("Update FAR", session.update_far(far)) {
                    debug!(logger, "FAR {} action {} -> {}", t.far_id, t.old, t.new);
                    transitions.push(t);
                }
            }
        }
        for qer in r.update_qers {
            if let Some(qer) = outcome.decoded("Update QER", qer) {
                outcome.applied("Update QER", session.update_qer(qer));
            }
        }

        let mut teids = TeidAllocator::new(self.registry(), self.config().n3_ip_addr);
        let mut created_pdrs = Vec::new();
        for pdr in r.create_pdrs {
            let Some(mut pdr) = outcome.decoded("Create PDR", pdr) else {
                continue;
            };
            warn_unsupported(&pdr, &logger);
            let pdr_id = pdr.pdr_id;
            let local_f_teid = pdr
                .pdi
                .local_f_teid
                .as_mut()
                .and_then(|f_teid| teids.resolve(f_teid));
            let created = check_keys(self.registry(), seid, pdr_id, &pdr.pdi)
                .and_then(|_| session.create_pdr(pdr));
            if outcome.applied("Create PDR", created).is_some() && local_f_teid.is_some() {
                created_pdrs.push(CreatedPdr {
                    pdr_id,
                    local_f_teid,
                });
            }
        }
        for pdr in r.update_pdrs {
            if let Some(pdr) = outcome.decoded("Update PDR", pdr) {
                // There is no Created PDR in which to return a TEID chosen for an update.
                let local_f_teid = pdr.pdi.as_ref().and_then(|x| x.local_f_teid.as_ref());
                if local_f_teid.is_some_and(|f| f.choose) {
                    outcome.applied::<()>(
                        "Update PDR",
                        Err(RuleError::ChooseOnUpdate { pdr: pdr.pdr_id.0 }),
                    );
                    continue;
                }
                let keys = match &pdr.pdi {
                    Some(pdi) => check_keys(self.registry(), seid, pdr.pdr_id, pdi),
                    None => Ok(()),
                };
                outcome.applied("Update PDR", keys.and_then(|_| session.update_pdr(pdr)));
            }
        }

        // Removes, PDRs first so that a FAR or QER can be removed along with its last user.
        for pdr in r.remove_pdrs {
            if let Some(pdr) = outcome.decoded("Remove PDR", pdr) {
                outcome.applied("Remove PDR", session.remove_pdr(pdr.pdr_id));
            }
        }
        for far in r.remove_fars {
            if let Some(far) = outcome.decoded("Remove FAR", far) {
                outcome.applied("Remove FAR", session.remove_far(far.far_id));
            }
        }
        for qer in r.remove_qers {
            if let Some(qer) = outcome.decoded("Remove QER", qer) {
                outcome.applied("Remove QER", session.remove_qer(qer.qer_id));
            }
        }

        // Work out what happens to buffered packets.
        let mut command = None;
        for t in &transitions {
            if t.old.notify_cp() && !t.new.notify_cp() {
                session.srr_flag = false;
            }
            // DROP takes priority over FORW, which takes priority over BUFF.
            let was_buffering = t.old.buffer() && !t.old.forward() && !t.old.drop();
            if was_buffering {
                if t.new.drop() {
                    if command.is_none() {
                        command = Some(UserplaneCommand::Discard(seid));
                    }
                } else if t.new.forward() {
                    command = Some(UserplaneCommand::Flush(seid));
                }
            }
        }

        let remote_seid = session.remote_seid;
        self.registry().commit(session);
        if let Some(command) = command {
            info!(logger, "Buffered packets: {:?}", command);
            self.userplane_command(command).await;
        }

        let response = SessionModificationResponse {
            cause: outcome.cause(),
            created_pdrs,
        };
        self.log_message("<< SessionModificationResponse");
        response.encode(Some(remote_seid), header.sequence_number)
    }
}
