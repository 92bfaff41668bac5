use crate::base::behavior::ModuleBehaviors;
use crate::dram::{DramStats, MemoryController, QueueKind, WarmupStatus};
use crate::info;
use crate::sim::config::{DramConfig, SimConfig};
use crate::sim::log::Logger;
use crate::timeq::Cycle;
use crate::traffic::{CpuSummary, TrafficConfig, TrafficDriver};
use anyhow::{bail, Context};
use serde::Serialize;
use std::fs;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct SimReport {
    pub cycles: Cycle,
    pub warmup_cycles: Cycle,
    pub dram: DramStats,
    pub avg_read_latency: f64,
    pub per_cpu: Vec<CpuSummary>,
}

fn initial_warmup(config: &SimConfig) -> WarmupStatus {
    if config.warmup_cycles == 0 {
        WarmupStatus::done(config.num_cpus)
    } else {
        WarmupStatus::new(config.num_cpus)
    }
}

/// Owns simulation time. Each cycle it publishes the cycle and warm-up state to the controller,
/// lets the cpus issue, then runs the controller's completion scan.
pub struct Sim {
    config: SimConfig,
    logger: Arc<Logger>,
    pub dram: MemoryController,
    pub traffic: TrafficDriver,
    cycle: Cycle,
}

impl Sim {
    pub fn new(
        sim_config: SimConfig,
        dram_config: DramConfig,
        traffic_config: TrafficConfig,
    ) -> anyhow::Result<Sim> {
        anyhow::ensure!(sim_config.num_cpus > 0, "num_cpus must be > 0");
        traffic_config
            .ensure_valid()
            .context("invalid [traffic] section")?;
        let logger = Arc::new(Logger::new(sim_config.log_level));
        let dram = MemoryController::new(Arc::new(dram_config), initial_warmup(&sim_config))
            .context("invalid [dram] section")?;
        let traffic = TrafficDriver::new(traffic_config, sim_config.num_cpus, Arc::clone(&logger));
        Ok(Sim {
            config: sim_config,
            logger,
            dram,
            traffic,
            cycle: 0,
        })
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn finished(&self) -> bool {
        self.traffic.is_done() && self.dram.is_idle()
    }

    // every cpu finishes warm-up on the same cycle
    fn update_warmup(&mut self, now: Cycle) {
        let warmup = self.dram.warmup();
        if warmup.fast_forwarding() && now >= self.config.warmup_cycles {
            info!(self.logger, "warm-up complete for {} cpus", warmup.num_cpus);
            self.dram.set_warmup(WarmupStatus::done(warmup.num_cpus));
        }
    }

    pub fn simulate(&mut self) -> anyhow::Result<SimReport> {
        while !self.finished() {
            if self.cycle >= self.config.timeout {
                bail!(
                    "simulation timed out after {} cycles ({} reads, {} writes still queued)",
                    self.cycle,
                    self.dram.total_occupancy(QueueKind::Read),
                    self.dram.total_occupancy(QueueKind::Write)
                );
            }
            self.tick_one();
        }
        info!(self.logger, "simulation finished after {} cycles", self.cycle);

        let report = self.report();
        if let Some(path) = &self.config.stats_json {
            let json = serde_json::to_string_pretty(&report)?;
            fs::write(path, json)
                .with_context(|| format!("failed to write stats to {}", path.display()))?;
        }
        Ok(report)
    }

    pub fn report(&self) -> SimReport {
        let stats = self.dram.stats().clone();
        SimReport {
            cycles: self.cycle,
            warmup_cycles: self.config.warmup_cycles,
            avg_read_latency: stats.avg_read_latency(),
            dram: stats,
            per_cpu: self.traffic.summaries(),
        }
    }
}

impl ModuleBehaviors for Sim {
    fn tick_one(&mut self) {
        let now = self.cycle;
        self.logger.set_cycle(now);
        self.update_warmup(now);
        self.dram.set_cycle(now);
        self.traffic.tick(now, &mut self.dram);
        self.dram.operate();
        self.cycle += 1;
    }

    fn reset(&mut self) {
        self.dram.reset();
        self.dram.set_warmup(initial_warmup(&self.config));
        self.traffic.reset();
        self.cycle = 0;
    }
}
