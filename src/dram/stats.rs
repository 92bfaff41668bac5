use crate::timeq::Cycle;
use serde::Serialize;
use std::ops::AddAssign;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DramStats {
    reads_queued: u64,
    reads_merged: u64,
    reads_forwarded: u64,
    reads_fast_forwarded: u64,
    writes_queued: u64,
    writes_dropped: u64,
    writes_fast_forwarded: u64,
    rq_full_rejects: u64,
    wq_full_rejects: u64,
    reads_completed: u64,
    writes_completed: u64,
    total_read_latency: u64,
    max_rq_occupancy: u64,
    max_wq_occupancy: u64,
    last_completion_cycle: Option<Cycle>,
    per_channel_completed: Vec<u64>,
}

impl DramStats {
    pub fn new(channels: usize) -> Self {
        Self {
            per_channel_completed: vec![0; channels],
            ..Self::default()
        }
    }

    pub fn reads_queued(&self) -> u64 {
        self.reads_queued
    }

    pub fn reads_merged(&self) -> u64 {
        self.reads_merged
    }

    pub fn reads_forwarded(&self) -> u64 {
        self.reads_forwarded
    }

    pub fn reads_fast_forwarded(&self) -> u64 {
        self.reads_fast_forwarded
    }

    pub fn writes_queued(&self) -> u64 {
        self.writes_queued
    }

    pub fn writes_dropped(&self) -> u64 {
        self.writes_dropped
    }

    pub fn writes_fast_forwarded(&self) -> u64 {
        self.writes_fast_forwarded
    }

    pub fn rq_full_rejects(&self) -> u64 {
        self.rq_full_rejects
    }

    pub fn wq_full_rejects(&self) -> u64 {
        self.wq_full_rejects
    }

    pub fn reads_completed(&self) -> u64 {
        self.reads_completed
    }

    pub fn writes_completed(&self) -> u64 {
        self.writes_completed
    }

    pub fn max_rq_occupancy(&self) -> u64 {
        self.max_rq_occupancy
    }

    pub fn max_wq_occupancy(&self) -> u64 {
        self.max_wq_occupancy
    }

    pub fn last_completion_cycle(&self) -> Option<Cycle> {
        self.last_completion_cycle
    }

    pub fn per_channel_completed(&self) -> &[u64] {
        &self.per_channel_completed
    }

    pub fn avg_read_latency(&self) -> f64 {
        if self.reads_completed == 0 {
            return 0.0;
        }
        self.total_read_latency as f64 / self.reads_completed as f64
    }

    pub fn record_read_queued(&mut self, occupancy: usize) {
        self.reads_queued = self.reads_queued.saturating_add(1);
        self.max_rq_occupancy = self.max_rq_occupancy.max(occupancy as u64);
    }

    pub fn record_read_merged(&mut self) {
        self.reads_merged = self.reads_merged.saturating_add(1);
    }

    pub fn record_read_forwarded(&mut self) {
        self.reads_forwarded = self.reads_forwarded.saturating_add(1);
    }

    pub fn record_read_fast_forwarded(&mut self) {
        self.reads_fast_forwarded = self.reads_fast_forwarded.saturating_add(1);
    }

    pub fn record_write_queued(&mut self, occupancy: usize) {
        self.writes_queued = self.writes_queued.saturating_add(1);
        self.max_wq_occupancy = self.max_wq_occupancy.max(occupancy as u64);
    }

    pub fn record_write_dropped(&mut self) {
        self.writes_dropped = self.writes_dropped.saturating_add(1);
    }

    pub fn record_write_fast_forwarded(&mut self) {
        self.writes_fast_forwarded = self.writes_fast_forwarded.saturating_add(1);
    }

    pub fn record_rq_full(&mut self) {
        self.rq_full_rejects = self.rq_full_rejects.saturating_add(1);
    }

    pub fn record_wq_full(&mut self) {
        self.wq_full_rejects = self.wq_full_rejects.saturating_add(1);
    }

    pub fn record_read_completion(&mut self, channel: usize, latency: Cycle, now: Cycle) {
        self.reads_completed = self.reads_completed.saturating_add(1);
        self.total_read_latency = self.total_read_latency.saturating_add(latency);
        self.record_channel_completion(channel, now);
    }

    pub fn record_write_completion(&mut self, channel: usize, now: Cycle) {
        self.writes_completed = self.writes_completed.saturating_add(1);
        self.record_channel_completion(channel, now);
    }

    fn record_channel_completion(&mut self, channel: usize, now: Cycle) {
        if let Some(count) = self.per_channel_completed.get_mut(channel) {
            *count = count.saturating_add(1);
        }
        self.last_completion_cycle = Some(now);
    }
}

impl AddAssign<&DramStats> for DramStats {
    fn add_assign(&mut self, other: &DramStats) {
        self.reads_queued = self.reads_queued.saturating_add(other.reads_queued);
        self.reads_merged = self.reads_merged.saturating_add(other.reads_merged);
        self.reads_forwarded = self.reads_forwarded.saturating_add(other.reads_forwarded);
        self.reads_fast_forwarded = self
            .reads_fast_forwarded
            .saturating_add(other.reads_fast_forwarded);
        self.writes_queued = self.writes_queued.saturating_add(other.writes_queued);
        self.writes_dropped = self.writes_dropped.saturating_add(other.writes_dropped);
        self.writes_fast_forwarded = self
            .writes_fast_forwarded
            .saturating_add(other.writes_fast_forwarded);
        self.rq_full_rejects = self.rq_full_rejects.saturating_add(other.rq_full_rejects);
        self.wq_full_rejects = self.wq_full_rejects.saturating_add(other.wq_full_rejects);
        self.reads_completed = self.reads_completed.saturating_add(other.reads_completed);
        self.writes_completed = self.writes_completed.saturating_add(other.writes_completed);
        self.total_read_latency = self
            .total_read_latency
            .saturating_add(other.total_read_latency);
        self.max_rq_occupancy = self.max_rq_occupancy.max(other.max_rq_occupancy);
        self.max_wq_occupancy = self.max_wq_occupancy.max(other.max_wq_occupancy);
        self.last_completion_cycle = match (self.last_completion_cycle, other.last_completion_cycle) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if self.per_channel_completed.len() < other.per_channel_completed.len() {
            self.per_channel_completed
                .resize(other.per_channel_completed.len(), 0);
        }
        for (mine, theirs) in self
            .per_channel_completed
            .iter_mut()
            .zip(&other.per_channel_completed)
        {
            *mine = mine.saturating_add(*theirs);
        }
    }
}
