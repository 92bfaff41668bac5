use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::dram::{
    DramReject, MemoryController, ReadAdmit, RequestPacket, ReturnRef, ReturnTarget, WriteAdmit,
};
use crate::sim::log::Logger;
use crate::timeq::Cycle;
use crate::traffic::config::TrafficConfig;
use crate::traffic::logging::TrafficLogger;
use crate::traffic::patterns::{PatternEngine, PatternOp};
use crate::{debug, info};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CpuSummary {
    pub cpu: usize,
    pub reads_issued: u64,
    pub prefetches_issued: u64,
    pub writes_issued: u64,
    pub rejects: u64,
    pub completed: u64,
    pub total_latency: u64,
    pub max_latency: u64,
    pub avg_latency: f64,
    pub last_data: u64,
}

#[derive(Debug, Default)]
struct PortState {
    // instr id -> cycle of the first issue attempt
    pending: HashMap<u64, Cycle>,
    completed: u64,
    total_latency: u64,
    max_latency: u64,
    last_data: u64,
}

/// Return target standing in for one cpu's cache. It answers for the instruction ids it handed
/// out and ignores any others a merged packet carries.
#[derive(Debug)]
pub struct CpuPort {
    now: AtomicU64,
    state: Mutex<PortState>,
}

impl CpuPort {
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
            state: Mutex::new(PortState::default()),
        }
    }

    pub fn set_cycle(&self, now: Cycle) {
        self.now.store(now, Ordering::Relaxed);
    }

    pub fn expect(&self, instr_id: u64, now: Cycle) {
        let mut state = self.state.lock().expect("cpu port poisoned");
        state.pending.entry(instr_id).or_insert(now);
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().expect("cpu port poisoned").pending.len()
    }

    fn fill_summary(&self, summary: &mut CpuSummary) {
        let state = self.state.lock().expect("cpu port poisoned");
        summary.completed = state.completed;
        summary.total_latency = state.total_latency;
        summary.max_latency = state.max_latency;
        summary.avg_latency = if state.completed == 0 {
            0.0
        } else {
            state.total_latency as f64 / state.completed as f64
        };
        summary.last_data = state.last_data;
    }
}

impl ReturnTarget for CpuPort {
    fn return_data(&self, packet: &RequestPacket) {
        let now = self.now.load(Ordering::Relaxed);
        let mut state = self.state.lock().expect("cpu port poisoned");
        for instr_id in &packet.instr_depend_on_me {
            if let Some(issued_at) = state.pending.remove(instr_id) {
                let latency = now.saturating_sub(issued_at);
                state.completed += 1;
                state.total_latency += latency;
                state.max_latency = state.max_latency.max(latency);
                state.last_data = packet.data;
            }
        }
    }
}

#[derive(Debug)]
struct CpuTraffic {
    port: Arc<CpuPort>,
    issued: u32,
    next_seq: u64,
    retry: Option<(PatternOp, RequestPacket)>,
    summary: CpuSummary,
    done_logged: bool,
}

/// Upstream requesters feeding the controller: each cpu issues up to `issue_per_cycle` requests a
/// cycle while it has fewer than `max_inflight` reads outstanding, and re-offers a rejected
/// packet on the following cycle before generating anything new.
#[derive(Debug)]
pub struct TrafficDriver {
    config: TrafficConfig,
    engine: PatternEngine,
    cpus: Vec<CpuTraffic>,
    logger: Arc<Logger>,
}

impl TrafficDriver {
    pub fn new(config: TrafficConfig, num_cpus: usize, logger: Arc<Logger>) -> Self {
        let engine = PatternEngine::new(&config, num_cpus);
        let cpus = (0..num_cpus)
            .map(|cpu| CpuTraffic {
                port: Arc::new(CpuPort::new()),
                issued: 0,
                next_seq: 0,
                retry: None,
                summary: CpuSummary {
                    cpu,
                    ..CpuSummary::default()
                },
                done_logged: false,
            })
            .collect();
        Self {
            config,
            engine,
            cpus,
            logger,
        }
    }

    pub fn reset(&mut self) {
        *self = TrafficDriver::new(self.config.clone(), self.cpus.len(), Arc::clone(&self.logger));
    }

    fn cpu_done(&self, cpu: &CpuTraffic) -> bool {
        !self.config.enabled
            || (cpu.issued >= self.config.reqs_per_cpu
                && cpu.retry.is_none()
                && cpu.port.outstanding() == 0)
    }

    pub fn is_done(&self) -> bool {
        self.cpus.iter().all(|cpu| self.cpu_done(cpu))
    }

    pub fn summaries(&self) -> Vec<CpuSummary> {
        self.cpus
            .iter()
            .map(|cpu| {
                let mut summary = cpu.summary.clone();
                cpu.port.fill_summary(&mut summary);
                summary
            })
            .collect()
    }

    /// Publish `now` to every port. Must run before the controller's `operate` for the cycle.
    pub fn set_cycle(&self, now: Cycle) {
        for cpu in &self.cpus {
            cpu.port.set_cycle(now);
        }
    }

    pub fn tick(&mut self, now: Cycle, dram: &mut MemoryController) {
        if !self.config.enabled {
            return;
        }
        self.set_cycle(now);
        for id in 0..self.cpus.len() {
            self.tick_cpu(id, now, dram);
        }
        for id in 0..self.cpus.len() {
            let done = self.cpu_done(&self.cpus[id]);
            let cpu = &mut self.cpus[id];
            if done && !cpu.done_logged {
                cpu.done_logged = true;
                info!(self.logger, "cpu {} finished all {} requests", id, cpu.issued);
                if self.config.print_traffic_lines {
                    TrafficLogger::log_cpu_done(id, now);
                }
            }
        }
    }

    fn tick_cpu(&mut self, id: usize, now: Cycle, dram: &mut MemoryController) {
        for _ in 0..self.config.issue_per_cycle {
            // a pending retry is already outstanding and is re-offered regardless of max_inflight
            let (op, packet) = match self.cpus[id].retry.take() {
                Some(retry) => retry,
                None => {
                    if self.cpus[id].issued >= self.config.reqs_per_cpu
                        || self.cpus[id].port.outstanding() >= self.config.max_inflight
                    {
                        break;
                    }
                    let next = self.engine.next(id);
                    let cpu = &mut self.cpus[id];
                    cpu.issued += 1;
                    let packet = make_packet(id, cpu.next_seq, next.op, next.address, &cpu.port);
                    cpu.next_seq += 1;
                    (next.op, packet)
                }
            };

            let cpu = &mut self.cpus[id];
            if !op.is_store() {
                cpu.port.expect(packet.instr_id, now);
            }
            let address = packet.address;
            let result = submit(dram, op, packet);
            match &result {
                Ok(outcome) => {
                    match op {
                        PatternOp::Read => cpu.summary.reads_issued += 1,
                        PatternOp::Prefetch => cpu.summary.prefetches_issued += 1,
                        PatternOp::Write => cpu.summary.writes_issued += 1,
                    }
                    debug!(self.logger, "cpu {} {} {:#x}: {:?}", id, op.short(), address, outcome);
                }
                Err(reject) => {
                    cpu.summary.rejects += 1;
                    debug!(self.logger, "cpu {} {:#x} rejected: {:?}", id, address, reject.reason);
                }
            }
            if self.config.print_traffic_lines {
                TrafficLogger::log_issue(id, op, address, &outcome_str(&result), now);
            }
            if let Err(reject) = result {
                cpu.retry = Some((op, reject.packet));
                break;
            }
        }
    }
}

#[derive(Debug)]
enum Submitted {
    Read(ReadAdmit),
    Write(WriteAdmit),
}

fn submit(
    dram: &mut MemoryController,
    op: PatternOp,
    packet: RequestPacket,
) -> Result<Submitted, DramReject> {
    match op {
        PatternOp::Read => dram.add_read(packet).map(Submitted::Read),
        PatternOp::Prefetch => dram.add_prefetch(packet).map(Submitted::Read),
        PatternOp::Write => dram.add_write(packet).map(Submitted::Write),
    }
}

fn outcome_str(result: &Result<Submitted, DramReject>) -> String {
    match result {
        Ok(Submitted::Read(admit)) => format!("{admit:?}"),
        Ok(Submitted::Write(admit)) => format!("{admit:?}"),
        Err(reject) => format!("{:?}", reject.reason),
    }
}

fn make_packet(cpu: usize, seq: u64, op: PatternOp, address: u64, port: &Arc<CpuPort>) -> RequestPacket {
    // instr ids are unique across cpus so merged packets can be told apart by each port
    let instr_id = ((cpu as u64) << 48) | seq;
    match op {
        PatternOp::Write => RequestPacket::new_write(cpu, address, instr_id),
        PatternOp::Read | PatternOp::Prefetch => {
            let packet = if op == PatternOp::Read {
                RequestPacket::new_read(cpu, address)
            } else {
                RequestPacket::new_prefetch(cpu, address)
            };
            let target: ReturnRef = port.clone();
            packet.with_instr(instr_id).with_return(target)
        }
    }
}
