use super::request::MemRequest;
use crate::timeq::Cycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Read,
    Write,
    /// Prefetches share the read queue.
    Prefetch,
}

/// One independent partition of main memory: a read queue, a write queue and a fixed latency.
/// Queue lengths are set once at construction; slots are reused, never added.
#[derive(Debug)]
pub struct DramChannel {
    pub(crate) rq: Vec<MemRequest>,
    pub(crate) wq: Vec<MemRequest>,
    latency: Cycle,
}

impl DramChannel {
    pub fn new(rq_size: usize, wq_size: usize, latency: Cycle) -> Self {
        Self {
            rq: vec![MemRequest::default(); rq_size],
            wq: vec![MemRequest::default(); wq_size],
            latency,
        }
    }

    pub fn latency(&self) -> Cycle {
        self.latency
    }

    pub fn queue(&self, kind: QueueKind) -> &[MemRequest] {
        match kind {
            QueueKind::Read | QueueKind::Prefetch => &self.rq,
            QueueKind::Write => &self.wq,
        }
    }

    fn queue_mut(&mut self, kind: QueueKind) -> &mut [MemRequest] {
        match kind {
            QueueKind::Read | QueueKind::Prefetch => &mut self.rq,
            QueueKind::Write => &mut self.wq,
        }
    }

    pub fn occupancy(&self, kind: QueueKind) -> usize {
        self.queue(kind).iter().filter(|slot| slot.valid).count()
    }

    pub fn capacity(&self, kind: QueueKind) -> usize {
        self.queue(kind).len()
    }

    /// Index of the valid entry holding the same block as `address`, if any.
    pub fn find_block(&self, kind: QueueKind, address: u64, log2_block_size: u32) -> Option<usize> {
        self.queue(kind)
            .iter()
            .position(|slot| slot.matches_block(address, log2_block_size))
    }

    pub fn first_free(&self, kind: QueueKind) -> Option<usize> {
        self.queue(kind).iter().position(|slot| !slot.valid)
    }

    pub(crate) fn slot_mut(&mut self, kind: QueueKind, index: usize) -> &mut MemRequest {
        &mut self.queue_mut(kind)[index]
    }

    /// Take out the lowest-indexed entry that is ready at `now`, leaving an empty slot behind.
    pub fn pop_ready(&mut self, kind: QueueKind, now: Cycle) -> Option<(usize, MemRequest)> {
        let queue = self.queue_mut(kind);
        let index = queue.iter().position(|slot| slot.is_ready(now))?;
        Some((index, std::mem::take(&mut queue[index])))
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy(QueueKind::Read) == 0 && self.occupancy(QueueKind::Write) == 0
    }

    pub fn clear(&mut self) {
        self.rq.fill_with(MemRequest::default);
        self.wq.fill_with(MemRequest::default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dram::request::RequestPacket;

    fn fill(channel: &mut DramChannel, kind: QueueKind, index: usize, addr: u64, now: Cycle) {
        let latency = channel.latency();
        *channel.slot_mut(kind, index) =
            MemRequest::admit(RequestPacket::new_read(0, addr), now, latency);
    }

    #[test]
    fn new_channel_is_empty_with_fixed_capacity() {
        let channel = DramChannel::new(8, 4, 180);
        assert!(channel.is_empty());
        assert_eq!(channel.capacity(QueueKind::Read), 8);
        assert_eq!(channel.capacity(QueueKind::Prefetch), 8);
        assert_eq!(channel.capacity(QueueKind::Write), 4);
        assert_eq!(channel.first_free(QueueKind::Write), Some(0));
    }

    #[test]
    fn pop_ready_prefers_lowest_slot() {
        let mut channel = DramChannel::new(4, 1, 10);
        fill(&mut channel, QueueKind::Read, 2, 0x80, 0);
        fill(&mut channel, QueueKind::Read, 1, 0x40, 5);
        fill(&mut channel, QueueKind::Read, 3, 0xc0, 0);

        assert!(channel.pop_ready(QueueKind::Read, 9).is_none());
        let (index, entry) = channel.pop_ready(QueueKind::Read, 20).unwrap();
        assert_eq!(index, 1);
        assert_eq!(entry.address, 0x40);
        assert!(!channel.queue(QueueKind::Read)[1].valid);
        assert_eq!(channel.occupancy(QueueKind::Read), 2);
        assert_eq!(channel.first_free(QueueKind::Read), Some(0));
    }

    #[test]
    fn find_block_skips_empty_slots() {
        let mut channel = DramChannel::new(4, 1, 10);
        fill(&mut channel, QueueKind::Read, 3, 0x1000, 0);
        assert_eq!(channel.find_block(QueueKind::Read, 0x1010, 6), Some(3));
        assert_eq!(channel.find_block(QueueKind::Read, 0x2000, 6), None);
        channel.clear();
        assert_eq!(channel.find_block(QueueKind::Read, 0x1010, 6), None);
    }
}
