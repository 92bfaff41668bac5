use serde::Deserialize;

use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrafficPattern {
    /// Sequential blocks inside a private per-cpu window.
    #[default]
    Stream,
    /// Uniform random blocks inside a private per-cpu window.
    Random,
    /// A small set of blocks shared by every cpu, to exercise merging and forwarding.
    Hot,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    pub enabled: bool,
    pub reqs_per_cpu: u32,
    pub issue_per_cycle: u32,
    pub max_inflight: usize,
    pub write_ratio: f64,
    pub prefetch_ratio: f64,
    pub pattern: TrafficPattern,
    pub base_addr: u64,
    pub footprint_bytes: u64,
    pub stride_bytes: u64,
    pub hot_blocks: u64,
    pub seed: u64,
    pub print_traffic_lines: bool,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reqs_per_cpu: 1024,
            issue_per_cycle: 1,
            max_inflight: 16,
            write_ratio: 0.25,
            prefetch_ratio: 0.0,
            pattern: TrafficPattern::Stream,
            base_addr: 0x8000_0000,
            footprint_bytes: 1 << 20,
            stride_bytes: 64,
            hot_blocks: 16,
            seed: 0,
            print_traffic_lines: false,
        }
    }
}

impl TrafficConfig {
    pub fn ensure_valid(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.stride_bytes > 0, "stride_bytes must be > 0");
        anyhow::ensure!(
            self.footprint_bytes >= self.stride_bytes,
            "footprint_bytes must hold at least one stride"
        );
        anyhow::ensure!(self.hot_blocks > 0, "hot_blocks must be > 0");
        anyhow::ensure!(self.max_inflight > 0, "max_inflight must be > 0");
        anyhow::ensure!(
            (0.0..=1.0).contains(&(self.write_ratio + self.prefetch_ratio))
                && self.write_ratio >= 0.0
                && self.prefetch_ratio >= 0.0,
            "write_ratio and prefetch_ratio must be non-negative and sum to at most 1"
        );
        Ok(())
    }
}
