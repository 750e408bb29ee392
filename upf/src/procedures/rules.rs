//! rules - helpers shared by the procedures that create and modify session rules

use crate::data::{LookupKey, RuleError, SessionRegistry};
use pfcp::{Cause, CreatePdr, FTeid, PdrId, Pdi, PfcpResult};
use slog::{Logger, warn};
use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};

/// Outcome of the individual rule operations in one session message.  A failed operation
/// is skipped and the rest still apply.  The first failure decides the response cause.
pub struct RuleOutcome<'a> {
    logger: &'a Logger,
    cause: Cause,
}

impl<'a> RuleOutcome<'a> {
    pub fn new(logger: &'a Logger) -> Self {
        RuleOutcome {
            logger,
            cause: Cause::RequestAccepted,
        }
    }

    pub fn decoded<T>(&mut self, what: &str, r: PfcpResult<T>) -> Option<T> {
        r.map_err(|e| self.fail(what, e.cause(), e)).ok()
    }

    pub fn applied<T>(&mut self, what: &str, r: Result<T, RuleError>) -> Option<T> {
        r.map_err(|e| self.fail(what, e.cause(), e)).ok()
    }

    fn fail(&mut self, what: &str, cause: Cause, e: impl Display) {
        warn!(self.logger, "{what} failed - {e}");
        if self.cause.is_accepted() {
            self.cause = cause;
        }
    }

    pub fn cause(&self) -> Cause {
        self.cause
    }
}

/// Allocates TEIDs for F-TEIDs that ask the UPF to choose (CH).  F-TEIDs that carry the same
/// Choose ID within one message get the same TEID.
pub struct TeidAllocator<'a> {
    registry: &'a SessionRegistry,
    address: Ipv4Addr,
    by_choose_id: HashMap<u8, FTeid>,
    allocated: Vec<u32>,
}

impl<'a> TeidAllocator<'a> {
    pub fn new(registry: &'a SessionRegistry, address: Ipv4Addr) -> Self {
        TeidAllocator {
            registry,
            address,
            by_choose_id: HashMap::new(),
            allocated: Vec::new(),
        }
    }

    /// Fill in an F-TEID if it has CH set.  Returns the F-TEID to signal back in a Created PDR.
    pub fn resolve(&mut self, f_teid: &mut FTeid) -> Option<FTeid> {
        if !f_teid.choose {
            return None;
        }
        if let Some(existing) = f_teid.choose_id.and_then(|id| self.by_choose_id.get(&id)) {
            *f_teid = existing.clone();
            return Some(existing.clone());
        }

        let mut teid = rand::random::<u32>();
        while teid == 0 || self.registry.teid_in_use(teid) || self.allocated.contains(&teid) {
            teid = rand::random::<u32>();
        }
        self.allocated.push(teid);

        let allocated = FTeid::new_ipv4(teid, self.address);
        if let Some(id) = f_teid.choose_id {
            self.by_choose_id.insert(id, allocated.clone());
        }
        *f_teid = allocated.clone();
        Some(allocated)
    }
}

/// Refuse a PDR whose TEID or UE address is already indexed to a different session, so that
/// it cannot take over that session's traffic.  Call after any CH F-TEID has been resolved.
pub fn check_keys(
    registry: &SessionRegistry,
    seid: u64,
    pdr_id: PdrId,
    pdi: &Pdi,
) -> Result<(), RuleError> {
    let teid = pdi
        .local_f_teid
        .as_ref()
        .filter(|f| !f.choose)
        .map(|f| LookupKey::Teid(f.teid));
    let ue_ips = pdi.ue_ip_address.iter().flat_map(|x| {
        x.ipv4
            .map(IpAddr::V4)
            .into_iter()
            .chain(x.ipv6.map(IpAddr::V6))
            .map(LookupKey::UeIp)
    });
    for key in teid.into_iter().chain(ue_ips) {
        if let Some(owner) = registry.owner(&key).filter(|x| *x != seid) {
            return Err(RuleError::KeyInUse {
                pdr: pdr_id.0,
                key,
                seid: owner,
            });
        }
    }
    Ok(())
}

/// Log the parts of a Create PDR that are accepted but have no effect.
pub fn warn_unsupported(pdr: &CreatePdr, logger: &Logger) {
    if pdr.qer_ids.len() > 1 {
        warn!(
            logger,
            "PDR {} has {} QERs - only QER {} is applied",
            pdr.pdr_id,
            pdr.qer_ids.len(),
            pdr.qer_ids[0]
        );
    }
    if !pdr.urr_ids.is_empty() {
        warn!(logger, "PDR {} URR IDs ignored - usage reporting not supported", pdr.pdr_id);
    }
    if !pdr.activate_predefined_rules.is_empty() {
        warn!(logger, "PDR {} predefined rules ignored", pdr.pdr_id);
    }
}
