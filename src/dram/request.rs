use std::fmt;
use std::sync::Arc;

use smallvec::{Array, SmallVec};

use crate::timeq::{Cycle, Ticket};

/// Anything that wants to hear back when a packet it is waiting on completes.
pub trait ReturnTarget: fmt::Debug {
    fn return_data(&self, packet: &RequestPacket);
}

pub type ReturnRef = Arc<dyn ReturnTarget>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketKind {
    #[default]
    Load,
    Prefetch,
    Writeback,
}

#[derive(Debug, Clone, Default)]
pub struct RequestPacket {
    pub address: u64,
    pub data: u64,
    pub cpu: usize,
    pub kind: PacketKind,
    pub instr_id: u64,
    pub scheduled: bool,
    pub lq_index_depend_on_me: SmallVec<[usize; 2]>,
    pub sq_index_depend_on_me: SmallVec<[usize; 2]>,
    pub instr_depend_on_me: SmallVec<[u64; 2]>,
    pub to_return: SmallVec<[ReturnRef; 2]>,
}

impl RequestPacket {
    pub fn new_read(cpu: usize, address: u64) -> Self {
        Self {
            address,
            cpu,
            kind: PacketKind::Load,
            ..Self::default()
        }
    }

    pub fn new_write(cpu: usize, address: u64, data: u64) -> Self {
        Self {
            address,
            data,
            cpu,
            kind: PacketKind::Writeback,
            ..Self::default()
        }
    }

    pub fn new_prefetch(cpu: usize, address: u64) -> Self {
        Self {
            address,
            cpu,
            kind: PacketKind::Prefetch,
            ..Self::default()
        }
    }

    pub fn with_return(mut self, target: ReturnRef) -> Self {
        self.to_return.push(target);
        self
    }

    pub fn with_instr(mut self, instr_id: u64) -> Self {
        self.instr_id = instr_id;
        self.instr_depend_on_me.push(instr_id);
        self
    }

    /// Notify every registered return target, in registration order.
    pub fn notify(&self) {
        for target in &self.to_return {
            target.return_data(self);
        }
    }

    /// Fold the dependents of `other` into this packet. Address, data and kind stay untouched.
    pub fn merge_dependents(&mut self, other: &RequestPacket) {
        merge_sorted(&mut self.lq_index_depend_on_me, &other.lq_index_depend_on_me);
        merge_sorted(&mut self.sq_index_depend_on_me, &other.sq_index_depend_on_me);
        merge_sorted(&mut self.instr_depend_on_me, &other.instr_depend_on_me);
        for target in &other.to_return {
            if !self.to_return.iter().any(|t| Arc::ptr_eq(t, target)) {
                self.to_return.push(Arc::clone(target));
            }
        }
    }
}

fn merge_sorted<A>(dest: &mut SmallVec<A>, src: &[A::Item])
where
    A: Array,
    A::Item: Ord + Copy,
{
    dest.extend_from_slice(src);
    dest.sort_unstable();
    dest.dedup();
}

/// Block-granularity address comparison.
pub fn same_block(lhs: u64, rhs: u64, log2_block_size: u32) -> bool {
    (lhs >> log2_block_size) == (rhs >> log2_block_size)
}

/// One slot of a channel queue. Either empty or fully populated.
#[derive(Debug, Clone, Default)]
pub struct MemRequest {
    pub valid: bool,
    pub ticket: Ticket,
    pub address: u64,
    pub packet: RequestPacket,
}

impl MemRequest {
    pub fn admit(packet: RequestPacket, now: Cycle, latency: Cycle) -> Self {
        Self {
            valid: true,
            ticket: Ticket::new(now, latency),
            address: packet.address,
            packet,
        }
    }

    pub fn completion_cycle(&self) -> Cycle {
        self.ticket.ready_at()
    }

    pub fn is_ready(&self, now: Cycle) -> bool {
        self.valid && self.ticket.is_ready(now)
    }

    pub fn matches_block(&self, address: u64, log2_block_size: u32) -> bool {
        self.valid && same_block(self.address, address, log2_block_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAdmit {
    /// Warm-up is still running; return targets were notified immediately.
    FastForwarded,
    /// Satisfied from an in-flight write to the same block.
    Forwarded,
    /// Folded into the read already queued at this slot index.
    Merged(usize),
    /// Allocated a slot; carries the read queue occupancy afterwards.
    Queued(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAdmit {
    FastForwarded,
    /// A write to the same block is already queued; this one was absorbed.
    DuplicateDropped,
    Queued(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DramRejectReason {
    ReadQueueFull,
    WriteQueueFull,
}

/// Request the controller could not take. The packet is handed back for a later retry.
#[derive(Debug, Clone)]
pub struct DramReject {
    pub reason: DramRejectReason,
    pub packet: RequestPacket,
}

pub type ReadResult = Result<ReadAdmit, DramReject>;
pub type WriteResult = Result<WriteAdmit, DramReject>;
