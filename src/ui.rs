use anyhow::Context;
use clap::Parser;
use crate::sim::config::{Config, DramConfig, MappingMode, SimConfig};
use crate::sim::top::Sim;
use crate::traffic::TrafficConfig;
use std::fs;
use std::path::{Path, PathBuf};
use toml::Table;

#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct DramqArgs {
    #[arg(help = "Path to config.toml")]
    pub config_path: PathBuf,
    #[arg(long, help = "Enable log at level (0:none, 1:info, 2:debug)")]
    pub log: Option<u64>,
    #[arg(long, help = "Override simulation timeout in cycles")]
    pub timeout: Option<u64>,
    #[arg(long, help = "Override number of cpus issuing traffic")]
    pub num_cpus: Option<usize>,
    #[arg(long, help = "Override number of DRAM channels")]
    pub channels: Option<usize>,
    #[arg(long, help = "Override per-channel latency in cycles")]
    pub latency: Option<u64>,
    #[arg(long, help = "Override channel mapping (weighted, interleaved)")]
    pub mapping: Option<MappingMode>,
    #[arg(long, help = "Override the seed of both the channel mapper and the traffic")]
    pub seed: Option<u64>,
}

pub fn read_toml(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))
}

/// Make a Sim object from the TOML configuration.
/// If `cli_args` is given, override TOML options with CLI arguments.
pub fn make_sim(toml_string: &str, cli_args: Option<&DramqArgs>) -> anyhow::Result<Sim> {
    let config_table: Table = toml::from_str(toml_string).context("cannot parse config toml")?;
    let mut sim_config =
        SimConfig::from_section(config_table.get("sim")).context("invalid [sim] section")?;
    let mut dram_config =
        DramConfig::from_section(config_table.get("dram")).context("invalid [dram] section")?;
    let mut traffic_config = TrafficConfig::from_section(config_table.get("traffic"))
        .context("invalid [traffic] section")?;

    // override toml configs with CLI args
    if let Some(args) = cli_args {
        sim_config.log_level = args.log.unwrap_or(sim_config.log_level);
        sim_config.timeout = args.timeout.unwrap_or(sim_config.timeout);
        sim_config.num_cpus = args.num_cpus.unwrap_or(sim_config.num_cpus);
        dram_config.channels = args.channels.unwrap_or(dram_config.channels);
        dram_config.latency = args.latency.unwrap_or(dram_config.latency);
        dram_config.mapping = args.mapping.unwrap_or(dram_config.mapping);
        if let Some(seed) = args.seed {
            dram_config.seed = seed;
            traffic_config.seed = seed;
        }
    }

    Sim::new(sim_config, dram_config, traffic_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_toml() {
        let toml = "[dram]\nchannels = 2\nmapping = \"interleaved\"\n[sim]\nnum_cpus = 1\n";
        let args = DramqArgs {
            latency: Some(7),
            num_cpus: Some(3),
            ..DramqArgs::default()
        };
        let sim = make_sim(toml, Some(&args)).unwrap();
        assert_eq!(sim.dram.num_channels(), 2);
        assert_eq!(sim.dram.channel(0).latency(), 7);
        assert_eq!(sim.traffic.summaries().len(), 3);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(make_sim("[dram\n", None).is_err());
        // four weights for two channels
        assert!(make_sim("[dram]\nchannels = 2\n", None).is_err());
    }
}
