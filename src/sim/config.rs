use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{ensure, Context};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::*;

use crate::timeq::Cycle;

/// How a request address is turned into a channel index.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// Weighted random draw, independent of the address.
    #[default]
    Weighted,
    /// Block address modulo channel count.
    Interleaved,
}

impl FromStr for MappingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "weighted" => Ok(Self::Weighted),
            "interleaved" => Ok(Self::Interleaved),
            _ => Err(format!(
                "unsupported channel mapping '{}', expected one of: weighted, interleaved",
                value
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    pub log_level: u64,
    pub timeout: u64,
    /// Cycles before every CPU reports warm-up complete.
    pub warmup_cycles: u64,
    pub num_cpus: usize,
    pub stats_json: Option<PathBuf>,
}

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> anyhow::Result<Self> {
        match section {
            Some(value) => value
                .clone()
                .try_into()
                .context("cannot deserialize config section"),
            None => {
                warn!("config section not found");
                Ok(Self::default())
            }
        }
    }
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_level: 0,
            timeout: 10000000,
            warmup_cycles: 0,
            num_cpus: 1,
            stats_json: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DramConfig {
    pub channels: usize,
    pub latency: Cycle,
    pub rq_size: usize,
    pub wq_size: usize,
    pub log2_block_size: u32,
    pub mapping: MappingMode,
    /// Relative draw weight per channel, only used by `MappingMode::Weighted`.
    pub weights: Vec<u32>,
    pub seed: u64,
}

impl Config for DramConfig {}

impl Default for DramConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            latency: 180,
            rq_size: 2048,
            wq_size: 2048,
            log2_block_size: 6,
            mapping: MappingMode::Weighted,
            // draw in [0, 295) against thresholds 33, 43, 88
            weights: vec![33, 10, 45, 207],
            seed: 0,
        }
    }
}

impl DramConfig {
    /// A weighted-mapping config with a single channel; every address lands in channel 0.
    pub fn single_channel(latency: Cycle, queue_size: usize) -> Self {
        Self {
            channels: 1,
            latency,
            rq_size: queue_size,
            wq_size: queue_size,
            weights: vec![1],
            ..Self::default()
        }
    }

    pub fn ensure_valid(&self) -> anyhow::Result<()> {
        ensure!(self.channels > 0, "channels must be > 0");
        ensure!(self.rq_size > 0, "rq_size must be > 0");
        ensure!(self.wq_size > 0, "wq_size must be > 0");
        ensure!(self.log2_block_size < 64, "log2_block_size must be < 64");
        if self.mapping == MappingMode::Weighted {
            ensure!(
                self.weights.len() == self.channels,
                "weighted mapping needs one weight per channel ({} weights, {} channels)",
                self.weights.len(),
                self.channels
            );
            ensure!(
                self.weights.iter().any(|&w| w > 0),
                "weighted mapping needs at least one non-zero weight"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dram_config_is_valid() {
        let config = DramConfig::default();
        config.ensure_valid().unwrap();
        assert_eq!(config.weights.iter().sum::<u32>(), 295);
    }

    #[test]
    fn weighted_mapping_needs_weight_per_channel() {
        let config = DramConfig {
            channels: 2,
            ..DramConfig::default()
        };
        assert!(config.ensure_valid().is_err());

        let interleaved = DramConfig {
            channels: 2,
            mapping: MappingMode::Interleaved,
            ..DramConfig::default()
        };
        interleaved.ensure_valid().unwrap();
    }

    #[test]
    fn sections_deserialize_with_defaults() {
        let table: Table = toml::from_str(
            r#"
            [dram]
            channels = 2
            mapping = "interleaved"
            latency = 50
            "#,
        )
        .unwrap();
        let dram = DramConfig::from_section(table.get("dram")).unwrap();
        assert_eq!(dram.channels, 2);
        assert_eq!(dram.latency, 50);
        assert_eq!(dram.mapping, MappingMode::Interleaved);
        assert_eq!(dram.rq_size, 2048);

        let sim = SimConfig::from_section(table.get("sim")).unwrap();
        assert_eq!(sim.num_cpus, 1);
    }

    #[test]
    fn malformed_section_is_an_error() {
        let table: Table = toml::from_str("[dram]\nchannels = \"four\"\n").unwrap();
        assert!(DramConfig::from_section(table.get("dram")).is_err());
    }

    #[test]
    fn mapping_mode_parses_from_str() {
        assert_eq!("interleaved".parse::<MappingMode>(), Ok(MappingMode::Interleaved));
        assert!("hashed".parse::<MappingMode>().is_err());
    }
}
