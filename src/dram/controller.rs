use std::sync::{Arc, OnceLock};

use log::{debug, warn};

use super::channel::{DramChannel, QueueKind};
use super::mapping::ChannelMapper;
use super::request::{
    DramReject, DramRejectReason, MemRequest, ReadAdmit, ReadResult, RequestPacket, WriteAdmit,
    WriteResult,
};
use super::stats::DramStats;
use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::sim::config::DramConfig;
use crate::timeq::{module_now, Cycle};

/// How many CPUs have finished warming up. While any CPU is still warming up the controller
/// skips timing: reads are answered on the spot and writes are absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupStatus {
    pub complete: usize,
    pub num_cpus: usize,
}

impl WarmupStatus {
    pub fn new(num_cpus: usize) -> Self {
        Self { complete: 0, num_cpus }
    }

    pub fn done(num_cpus: usize) -> Self {
        Self { complete: num_cpus, num_cpus }
    }

    pub fn fast_forwarding(&self) -> bool {
        self.complete < self.num_cpus
    }
}

#[derive(Debug)]
pub struct DramState {
    channels: Vec<DramChannel>,
    mapper: ChannelMapper,
    stats: DramStats,
    warmup: WarmupStatus,
}

#[derive(Debug)]
pub struct MemoryController {
    base: ModuleBase<DramState, DramConfig>,
}

module!(MemoryController, DramState, DramConfig,);

impl MemoryController {
    pub fn new(config: Arc<DramConfig>, warmup: WarmupStatus) -> anyhow::Result<Self> {
        config.ensure_valid()?;
        let channels = (0..config.channels)
            .map(|_| DramChannel::new(config.rq_size, config.wq_size, config.latency))
            .collect();
        let mut me = MemoryController {
            base: ModuleBase {
                cycle: 0,
                state: DramState {
                    channels,
                    mapper: ChannelMapper::new(&config),
                    stats: DramStats::new(config.channels),
                    warmup,
                },
                config: OnceLock::new(),
            },
        };
        me.init_conf(config);
        Ok(me)
    }

    pub fn cycle(&self) -> Cycle {
        module_now(self)
    }

    /// The driving scheduler owns simulation time and pushes it in before intake and `operate`.
    pub fn set_cycle(&mut self, now: Cycle) {
        self.base.cycle = now;
    }

    pub fn warmup(&self) -> WarmupStatus {
        self.state().warmup
    }

    pub fn set_warmup(&mut self, warmup: WarmupStatus) {
        self.state_mut().warmup = warmup;
    }

    pub fn stats(&self) -> &DramStats {
        &self.state().stats
    }

    pub fn num_channels(&self) -> usize {
        self.state().channels.len()
    }

    pub fn channel(&self, id: usize) -> &DramChannel {
        &self.state().channels[id]
    }

    pub fn is_idle(&self) -> bool {
        self.state().channels.iter().all(DramChannel::is_empty)
    }

    pub fn add_read(&mut self, packet: RequestPacket) -> ReadResult {
        let shamt = self.conf().log2_block_size;
        let now = self.base.cycle;
        let state = &mut self.base.state;

        if state.warmup.fast_forwarding() {
            packet.notify();
            state.stats.record_read_fast_forwarded();
            return Ok(ReadAdmit::FastForwarded);
        }

        let id = state.mapper.select(packet.address);
        let channel = &mut state.channels[id];

        if let Some(wq_idx) = channel.find_block(QueueKind::Write, packet.address, shamt) {
            let mut packet = packet;
            packet.data = channel.queue(QueueKind::Write)[wq_idx].packet.data;
            packet.notify();
            state.stats.record_read_forwarded();
            debug!(
                "dram ch{} @{}: {:?} {:#x} forwarded from wq[{}]",
                id, now, packet.kind, packet.address, wq_idx
            );
            return Ok(ReadAdmit::Forwarded);
        }

        if let Some(rq_idx) = channel.find_block(QueueKind::Read, packet.address, shamt) {
            channel
                .slot_mut(QueueKind::Read, rq_idx)
                .packet
                .merge_dependents(&packet);
            state.stats.record_read_merged();
            debug!(
                "dram ch{} @{}: {:?} {:#x} merged into rq[{}]",
                id, now, packet.kind, packet.address, rq_idx
            );
            return Ok(ReadAdmit::Merged(rq_idx));
        }

        let Some(rq_idx) = channel.first_free(QueueKind::Read) else {
            state.stats.record_rq_full();
            warn!("dram ch{} @{}: read queue full, rejecting {:#x}", id, now, packet.address);
            return Err(DramReject {
                reason: DramRejectReason::ReadQueueFull,
                packet,
            });
        };
        let latency = channel.latency();
        let (kind, address) = (packet.kind, packet.address);
        *channel.slot_mut(QueueKind::Read, rq_idx) = MemRequest::admit(packet, now, latency);
        let occupancy = channel.occupancy(QueueKind::Read);
        state.stats.record_read_queued(occupancy);
        debug!(
            "dram ch{} @{}: {:?} {:#x} queued in rq[{}], ready at {}",
            id,
            now,
            kind,
            address,
            rq_idx,
            now.saturating_add(latency)
        );
        Ok(ReadAdmit::Queued(occupancy))
    }

    pub fn add_write(&mut self, packet: RequestPacket) -> WriteResult {
        let shamt = self.conf().log2_block_size;
        let now = self.base.cycle;
        let state = &mut self.base.state;

        if state.warmup.fast_forwarding() {
            state.stats.record_write_fast_forwarded();
            return Ok(WriteAdmit::FastForwarded);
        }

        let id = state.mapper.select(packet.address);
        let channel = &mut state.channels[id];

        // a second write to the same block is absorbed, its dependents are not merged
        if let Some(wq_idx) = channel.find_block(QueueKind::Write, packet.address, shamt) {
            state.stats.record_write_dropped();
            debug!(
                "dram ch{} @{}: write {:#x} dropped, duplicate of wq[{}]",
                id, now, packet.address, wq_idx
            );
            return Ok(WriteAdmit::DuplicateDropped);
        }

        let Some(wq_idx) = channel.first_free(QueueKind::Write) else {
            state.stats.record_wq_full();
            warn!("dram ch{} @{}: write queue full, rejecting {:#x}", id, now, packet.address);
            return Err(DramReject {
                reason: DramRejectReason::WriteQueueFull,
                packet,
            });
        };
        let latency = channel.latency();
        let address = packet.address;
        *channel.slot_mut(QueueKind::Write, wq_idx) = MemRequest::admit(packet, now, latency);
        let occupancy = channel.occupancy(QueueKind::Write);
        state.stats.record_write_queued(occupancy);
        debug!("dram ch{} @{}: write {:#x} queued in wq[{}]", id, now, address, wq_idx);
        Ok(WriteAdmit::Queued(occupancy))
    }

    pub fn add_prefetch(&mut self, packet: RequestPacket) -> ReadResult {
        self.add_read(packet)
    }

    /// Return every request whose latency has elapsed. Channels are visited in order and each
    /// read queue is drained before its write queue; within a queue the lowest ready slot always
    /// goes first.
    pub fn operate(&mut self) {
        let now = self.base.cycle;
        let state = &mut self.base.state;
        for (id, channel) in state.channels.iter_mut().enumerate() {
            while let Some((slot, entry)) = channel.pop_ready(QueueKind::Read, now) {
                debug!(
                    "dram ch{} @{}: rq[{}] {:?} {:#x} complete",
                    id, now, slot, entry.packet.kind, entry.address
                );
                entry.packet.notify();
                let latency = now - entry.ticket.issued_at();
                state.stats.record_read_completion(id, latency, now);
            }
            while let Some((slot, entry)) = channel.pop_ready(QueueKind::Write, now) {
                debug!(
                    "dram ch{} @{}: wq[{}] {:#x} complete",
                    id, now, slot, entry.address
                );
                entry.packet.notify();
                state.stats.record_write_completion(id, now);
            }
        }
    }

    /// Valid entries in the queue of `kind` in the channel `address` maps to. With weighted
    /// mapping this consumes a draw and may look at a different channel than the request used.
    pub fn occupancy(&mut self, kind: QueueKind, address: u64) -> usize {
        let state = &mut self.base.state;
        let id = state.mapper.select(address);
        state.channels[id].occupancy(kind)
    }

    pub fn capacity(&mut self, kind: QueueKind, address: u64) -> usize {
        let state = &mut self.base.state;
        let id = state.mapper.select(address);
        state.channels[id].capacity(kind)
    }

    /// Occupancy summed over all channels; does not touch the mapper.
    pub fn total_occupancy(&self, kind: QueueKind) -> usize {
        self.state()
            .channels
            .iter()
            .map(|channel| channel.occupancy(kind))
            .sum()
    }
}

impl ModuleBehaviors for MemoryController {
    fn tick_one(&mut self) {
        self.operate();
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        let channels = self.conf().channels;
        let mapper = ChannelMapper::new(self.conf());
        let state = self.state_mut();
        state.channels.iter_mut().for_each(DramChannel::clear);
        state.mapper = mapper;
        state.stats = DramStats::new(channels);
        self.base.cycle = 0;
    }
}
