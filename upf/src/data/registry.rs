//! registry - the set of live sessions, looked up by SEID, TEID or UE address

use super::{LookupKey, Session};
use anyhow::{Result, bail};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Session store shared between the signaling side and the data plane.
///
/// Sessions are held as `Arc` snapshots.  A signaling procedure clones the session, applies
/// its changes and calls [`SessionRegistry::commit`].  The data plane only ever sees whole
/// snapshots, and an index entry never points at a SEID that has no session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<u64, Arc<Session>>,
    by_teid: DashMap<u32, u64>,
    by_ue_ip: DashMap<IpAddr, u64>,
    next_seid: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            next_seid: AtomicU64::new(1),
            ..Default::default()
        }
    }

    /// Allocate an unused local SEID.  Zero is never allocated.
    pub fn allocate_seid(&self) -> u64 {
        loop {
            let seid = self.next_seid.fetch_add(1, Ordering::Relaxed);
            if seid != 0 && !self.sessions.contains_key(&seid) {
                return seid;
            }
        }
    }

    /// Create an empty session and return a working copy of it.
    pub fn create(&self, local_seid: u64, remote_seid: u64, peer: SocketAddr) -> Result<Session> {
        let session = Session::new(local_seid, remote_seid, peer);
        match self.sessions.entry(local_seid) {
            Entry::Occupied(_) => bail!("Session {local_seid} already exists"),
            Entry::Vacant(v) => {
                v.insert(Arc::new(session.clone()));
            }
        }
        Ok(session)
    }

    /// Publish a new version of a session.  Index entries for its TEIDs and UE addresses are
    /// added before the session is published, and entries it no longer uses are removed after.
    /// A key already indexed to another session stays with that session.
    pub fn commit(&self, session: Session) -> Arc<Session> {
        let seid = session.local_seid;
        let teids = session.teids();
        let ue_ips = session.ue_ips();
        for teid in &teids {
            self.by_teid.entry(*teid).or_insert(seid);
        }
        for ip in &ue_ips {
            self.by_ue_ip.entry(*ip).or_insert(seid);
        }

        let session = Arc::new(session);
        if let Some(old) = self.sessions.insert(seid, session.clone()) {
            for teid in old.teids().iter().filter(|x| !teids.contains(x)) {
                self.by_teid.remove_if(teid, |_, v| *v == seid);
            }
            for ip in old.ue_ips().iter().filter(|x| !ue_ips.contains(x)) {
                self.by_ue_ip.remove_if(ip, |_, v| *v == seid);
            }
        }
        session
    }

    /// The SEID of the session that a TEID or UE address is indexed to.
    pub fn owner(&self, key: &LookupKey) -> Option<u64> {
        match key {
            LookupKey::Teid(teid) => self.by_teid.get(teid).map(|x| *x),
            LookupKey::UeIp(ip) => self.by_ue_ip.get(ip).map(|x| *x),
        }
    }

    pub fn find_by_seid(&self, seid: u64) -> Option<Arc<Session>> {
        self.sessions.get(&seid).map(|x| x.clone())
    }

    pub fn find_by_teid(&self, teid: u32) -> Option<Arc<Session>> {
        let seid = *self.by_teid.get(&teid)?;
        self.find_by_seid(seid)
    }

    pub fn find_by_ue_ip(&self, ip: &IpAddr) -> Option<Arc<Session>> {
        let seid = *self.by_ue_ip.get(ip)?;
        self.find_by_seid(seid)
    }

    pub fn teid_in_use(&self, teid: u32) -> bool {
        self.by_teid.contains_key(&teid)
    }

    /// Remove a session and its index entries.
    pub fn remove(&self, seid: u64) -> Option<Arc<Session>> {
        let session = self.find_by_seid(seid)?;
        for teid in session.teids() {
            self.by_teid.remove_if(&teid, |_, v| *v == seid);
        }
        for ip in session.ue_ips() {
            self.by_ue_ip.remove_if(&ip, |_, v| *v == seid);
        }
        self.sessions.remove(&seid).map(|(_, x)| x)
    }

    /// Remove every session established by the given peer, returning their SEIDs.
    pub fn remove_for_peer(&self, peer: &SocketAddr) -> Vec<u64> {
        let seids: Vec<u64> = self
            .sessions
            .iter()
            .filter(|x| x.peer == *peer)
            .map(|x| *x.key())
            .collect();
        for seid in &seids {
            self.remove(*seid);
        }
        seids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
