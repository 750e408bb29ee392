//! session_establishment - create a session and its rules at the request of the SMF

use super::rules::{RuleOutcome, TeidAllocator, check_keys, warn_unsupported};
use crate::{HandlerApi, Procedure};
use bytes::Bytes;
use derive_deref::{Deref, DerefMut};
use pfcp::{
    Cause, CreatedPdr, FSeid, PfcpHeader, PfcpMessage, SessionEstablishmentRequest,
    SessionEstablishmentResponse,
};
use slog::{Logger, info, o, warn};
use std::net::{IpAddr, SocketAddr};

#[derive(Deref, DerefMut)]
pub struct SessionEstablishmentProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> SessionEstablishmentProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        SessionEstablishmentProcedure(Procedure::new(api, logger))
    }

    // Session Establishment Procedure
    // 1.    Pfcp SessionEstablishmentRequest >>
    // 2.    Pfcp SessionEstablishmentResponse <<
    pub fn run(
        &self,
        header: &PfcpHeader,
        r: SessionEstablishmentRequest,
        peer: SocketAddr,
    ) -> Bytes {
        self.log_message(">> SessionEstablishmentRequest");
        let cp_seid = r.cp_f_seid.as_ref().map(|x| x.seid).unwrap_or(0);
        let response = self
            .establish(r, peer)
            .unwrap_or_else(|cause| self.rejection(cause));
        self.log_message("<< SessionEstablishmentResponse");
        response.encode(Some(cp_seid), header.sequence_number)
    }

    pub fn rejection(&self, cause: Cause) -> SessionEstablishmentResponse {
        SessionEstablishmentResponse {
            node_id: self.node_id(),
            cause,
            up_f_seid: None,
            created_pdrs: vec![],
        }
    }

    fn establish(
        &self,
        r: SessionEstablishmentRequest,
        peer: SocketAddr,
    ) -> Result<SessionEstablishmentResponse, Cause> {
        let node = self.pfcp_node(&peer);
        if !node.is_associated() {
            warn!(self.logger, "Session establishment from unassociated peer {node}");
            return Err(Cause::NoEstablishedPfcpAssociation);
        }
        let Some(cp_f_seid) = r.cp_f_seid else {
            warn!(self.logger, "Session Establishment Request without CP F-SEID");
            return Err(Cause::MandatoryIeMissing);
        };
        if r.node_id.is_none() || r.create_pdrs.is_empty() || r.create_fars.is_empty() {
            warn!(
                self.logger,
                "Session Establishment Request missing Node ID, Create PDR or Create FAR"
            );
            return Err(Cause::MandatoryIeMissing);
        }
        if r.create_urrs > 0 {
            warn!(
                self.logger,
                "Ignoring {} Create URR - usage reporting not supported", r.create_urrs
            );
        }

        let local_seid = self.registry().allocate_seid();
        let mut session = self
            .registry()
            .create(local_seid, cp_f_seid.seid, peer)
            .map_err(|e| {
                warn!(self.logger, "Failed to create session - {e}");
                Cause::NoResourcesAvailable
            })?;
        session.pdn_type = r.pdn_type.map(|x| x.0);
        let logger = self.logger.new(o!("seid" => local_seid));
        let mut outcome = RuleOutcome::new(&logger);

        // FARs and QERs go first so that PDRs can refer to them.
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
            let created = check_keys(self.registry(), local_seid, pdr_id, &pdr.pdi)
                .and_then(|_| session.create_pdr(pdr));
            if outcome.applied("Create PDR", created).is_some()
                && local_f_teid.is_some()
            {
                created_pdrs.push(CreatedPdr {
                    pdr_id,
                    local_f_teid,
                });
            }
        }

        let cause = outcome.cause();
        info!(
            &logger,
            "Session established for peer SEID {:#x}, {} PDRs, TEIDs {:x?}, UE IPs {:?}",
            cp_f_seid.seid,
            session.pdrs().len(),
            session.teids(),
            session.ue_ips()
        );
        self.registry().commit(session);

        let (ipv4, ipv6) = match self.config().n4_ip_addr {
            IpAddr::V4(x) => (Some(x), None),
            IpAddr::V6(x) => (None, Some(x)),
        };
        Ok(SessionEstablishmentResponse {
            node_id: self.node_id(),
            cause,
            up_f_seid: Some(FSeid {
                seid: local_seid,
                ipv4,
                ipv6,
            }),
            created_pdrs,
        })
    }
}
