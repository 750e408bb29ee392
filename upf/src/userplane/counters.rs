use atomic_counter::{AtomicCounter, RelaxedCounter};
use derive_deref::Deref;
use slog::{Logger, info, warn};
use std::sync::Arc;

pub mod counter_indices {
    pub const RX_ACCESS_PKTS: usize = 0;
    pub const RX_ACCESS_BYTES: usize = 1;
    pub const RX_CORE_PKTS: usize = 2;
    pub const RX_CORE_BYTES: usize = 3;
    pub const TX_ACCESS_PKTS: usize = 4;
    pub const TX_CORE_PKTS: usize = 5;
    pub const BUFFERED_PKTS: usize = 6;
    pub const FLUSHED_PKTS: usize = 7;

    // Everything from here on is a drop.
    pub const DROP_TOO_SHORT: usize = 8;
    pub const DROP_NOT_IPV4: usize = 9;
    pub const DROP_NOT_GTP_TPDU: usize = 10;
    pub const DROP_UNKNOWN_SESSION: usize = 11;
    pub const DROP_NO_PDR: usize = 12;
    pub const DROP_NO_FAR: usize = 13;
    pub const DROP_ACTION: usize = 14;
    pub const DROP_BUFFER_FULL: usize = 15;
    pub const DROP_DISCARDED: usize = 16;
    pub const NUM_COUNTERS: usize = 17;
}
use counter_indices::*;

#[derive(Deref)]
pub struct Counters([RelaxedCounter; NUM_COUNTERS]);

impl Default for Counters {
    fn default() -> Self {
        Counters(std::array::from_fn(|_| RelaxedCounter::new(0)))
    }
}

impl Counters {
    pub fn snapshot(&self) -> [usize; NUM_COUNTERS] {
        std::array::from_fn(|idx| self[idx].get())
    }
}

pub async fn dump_stats(logger: Logger, counters: Arc<Counters>) {
    let mut last = [0usize; NUM_COUNTERS];

    loop {
        async_std::task::sleep(std::time::Duration::new(5, 0)).await;
        let now = counters.snapshot();

        if now[RX_ACCESS_PKTS] != last[RX_ACCESS_PKTS] || now[RX_CORE_PKTS] != last[RX_CORE_PKTS]
        {
            info!(
                &logger,
                "UL pkts={} bytes={} DL pkts={} bytes={} tx access={} core={} buffered={} flushed={}",
                now[RX_ACCESS_PKTS],
                now[RX_ACCESS_BYTES],
                now[RX_CORE_PKTS],
                now[RX_CORE_BYTES],
                now[TX_ACCESS_PKTS],
                now[TX_CORE_PKTS],
                now[BUFFERED_PKTS],
                now[FLUSHED_PKTS]
            );
        }

        if now[DROP_TOO_SHORT..] != last[DROP_TOO_SHORT..] {
            warn!(
                &logger,
                "DROPS too_short={} not_ipv4={} not_gtp={} no_session={} no_pdr={} no_far={} action={} buffer_full={} discarded={}",
                now[DROP_TOO_SHORT],
                now[DROP_NOT_IPV4],
                now[DROP_NOT_GTP_TPDU],
                now[DROP_UNKNOWN_SESSION],
                now[DROP_NO_PDR],
                now[DROP_NO_FAR],
                now[DROP_ACTION],
                now[DROP_BUFFER_FULL],
                now[DROP_DISCARDED]
            );
        }

        last = now;
    }
}
