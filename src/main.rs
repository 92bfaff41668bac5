use clap::Parser;
use dramq::ui::{make_sim, read_toml, DramqArgs};

pub fn main() -> anyhow::Result<()> {
    env_logger::init();

    let argv = DramqArgs::parse();
    let config = read_toml(&argv.config_path)?;
    let mut sim = make_sim(&config, Some(&argv))?;
    let report = sim.simulate()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
