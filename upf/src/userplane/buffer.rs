use super::Port;
use async_std::sync::Mutex;
use pfcp::FarId;
use std::collections::VecDeque;

struct BufferedPacket {
    seid: u64,
    far_id: FarId,
    port: Port,
    frame: Vec<u8>,
}

/// Bounded FIFO of downlink packets held back by a FAR with the BUFF action.  The capacity is
/// shared by all sessions.  Packets stay here, as received, until the control plane changes
/// the FAR.  Each packet keeps its ingress port so that it can be processed again.
pub struct PacketBuffer {
    capacity: usize,
    packets: Mutex<VecDeque<BufferedPacket>>,
}

impl PacketBuffer {
    pub fn new(capacity: usize) -> Self {
        PacketBuffer {
            capacity,
            packets: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Queue a received frame.  Returns false, dropping the frame, if the buffer is full.
    pub async fn push(&self, seid: u64, far_id: FarId, port: Port, frame: Vec<u8>) -> bool {
        let mut packets = self.packets.lock().await;
        Self::push_locked(&mut packets, self.capacity, seid, far_id, port, frame)
    }

    /// Queue a frame only if frames buffered by the same FAR are still waiting to be flushed,
    /// so that it goes out after them.  Returns None, leaving the frame with the caller, when
    /// nothing is waiting.  Otherwise returns whether the frame was queued.
    pub async fn push_behind(
        &self,
        seid: u64,
        far_id: FarId,
        port: Port,
        frame: &[u8],
    ) -> Option<bool> {
        let mut packets = self.packets.lock().await;
        if !packets
            .iter()
            .any(|p| p.seid == seid && p.far_id == far_id)
        {
            return None;
        }
        Some(Self::push_locked(
            &mut packets,
            self.capacity,
            seid,
            far_id,
            port,
            frame.to_vec(),
        ))
    }

    fn push_locked(
        packets: &mut VecDeque<BufferedPacket>,
        capacity: usize,
        seid: u64,
        far_id: FarId,
        port: Port,
        frame: Vec<u8>,
    ) -> bool {
        if packets.len() >= capacity {
            return false;
        }
        packets.push_back(BufferedPacket {
            seid,
            far_id,
            port,
            frame,
        });
        true
    }

    /// The oldest frame buffered for a session, left in place.
    pub async fn front(&self, seid: u64) -> Option<(Port, Vec<u8>)> {
        let packets = self.packets.lock().await;
        packets
            .iter()
            .find(|p| p.seid == seid)
            .map(|p| (p.port, p.frame.clone()))
    }

    /// Remove the oldest frame buffered for a session.
    pub async fn remove_front(&self, seid: u64) {
        let mut packets = self.packets.lock().await;
        if let Some(i) = packets.iter().position(|p| p.seid == seid) {
            packets.remove(i);
        }
    }

    /// Throw away a session's packets.  Returns how many were discarded.
    pub async fn discard(&self, seid: u64) -> usize {
        let mut packets = self.packets.lock().await;
        let before = packets.len();
        packets.retain(|p| p.seid != seid);
        before - packets.len()
    }

    pub async fn len(&self) -> usize {
        self.packets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.packets.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn capacity_is_enforced() {
        let buffer = PacketBuffer::new(2);
        assert!(buffer.push(1, FarId(1), Port::Access, vec![1]).await);
        assert!(buffer.push(1, FarId(1), Port::Access, vec![2]).await);
        assert!(!buffer.push(2, FarId(1), Port::Access, vec![3]).await);
        assert_eq!(buffer.push_behind(1, FarId(1), Port::Access, &[4]).await, Some(false));
        assert_eq!(buffer.len().await, 2);
    }

    #[async_std::test]
    async fn front_keeps_order_and_other_sessions() {
        let buffer = PacketBuffer::new(10);
        buffer.push(1, FarId(1), Port::Access, vec![1]).await;
        buffer.push(2, FarId(1), Port::Access, vec![2]).await;
        buffer.push(1, FarId(1), Port::Access, vec![3]).await;

        assert_eq!(buffer.front(1).await, Some((Port::Access, vec![1])));
        assert_eq!(buffer.front(1).await, Some((Port::Access, vec![1])));
        buffer.remove_front(1).await;
        assert_eq!(buffer.front(1).await, Some((Port::Access, vec![3])));
        buffer.remove_front(1).await;
        assert_eq!(buffer.front(1).await, None);
        assert_eq!(buffer.len().await, 1);

        assert_eq!(buffer.discard(2).await, 1);
        assert!(buffer.is_empty().await);
    }

    #[async_std::test]
    async fn push_behind_only_queues_after_the_same_far() {
        let buffer = PacketBuffer::new(10);
        assert_eq!(buffer.push_behind(1, FarId(1), Port::Core, &[0]).await, None);

        buffer.push(1, FarId(1), Port::Core, vec![1]).await;
        assert_eq!(buffer.push_behind(1, FarId(2), Port::Core, &[9]).await, None);
        assert_eq!(buffer.push_behind(2, FarId(1), Port::Core, &[9]).await, None);
        assert_eq!(buffer.push_behind(1, FarId(1), Port::Core, &[2]).await, Some(true));

        buffer.remove_front(1).await;
        assert_eq!(buffer.front(1).await, Some((Port::Core, vec![2])));
        buffer.remove_front(1).await;
        assert_eq!(buffer.push_behind(1, FarId(1), Port::Core, &[3]).await, None);
    }
}
