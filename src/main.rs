use clap::{Parser, ValueEnum};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, LevelFilter};
use std::fs;
use std::path::PathBuf;

use ipnetlab::config_loader;
use ipnetlab::network::Network;
use ipnetlab::plan::NetworkPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

/// Address and router-id planning for emulated IP networks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Where to write the allocation plan, stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Format of the allocation plan
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,
}

fn render(plan: &NetworkPlan, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(plan).wrap_err("Failed to serialize plan as YAML"),
        OutputFormat::Json => serde_json::to_string_pretty(plan).wrap_err("Failed to serialize plan as JSON"),
    }
}

/// Level requested by the topology file, unless RUST_LOG already decides
fn configured_level(log_level: Option<&str>, rust_log_set: bool) -> Option<LevelFilter> {
    if rust_log_set {
        return None;
    }
    log_level.and_then(|level| level.parse().ok())
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Without RUST_LOG, start at "info" and let the topology file adjust the
    // level once it is loaded
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(Env::default().default_filter_or("trace")).init();
    if !rust_log_set {
        log::set_max_level(LevelFilter::Info);
    }

    info!("Configuration file: {:?}", args.config);
    let config = config_loader::load_config(&args.config)?;
    if let Some(level) = configured_level(config.general.log_level.as_deref(), rust_log_set) {
        log::set_max_level(level);
    }

    let mut network = Network::from_config(&config)?;
    network.build()?;
    let plan = network.plan()?;
    let rendered = render(&plan, args.format)?;

    match &args.output {
        Some(path) => {
            fs::write(path, rendered)
                .wrap_err_with(|| format!("Failed to write plan to '{}'", path.display()))?;
            info!("Allocation plan written to {:?}", path);
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["ipnetlab", "--config", "topo.yaml"]);

        assert_eq!(args.config, PathBuf::from("topo.yaml"));
        assert_eq!(args.output, None);
        assert_eq!(args.format, OutputFormat::Yaml);
    }

    #[test]
    fn test_json_output_args() {
        let args = Args::parse_from([
            "ipnetlab",
            "-c",
            "topo.yaml",
            "--output",
            "plan.json",
            "--format",
            "json",
        ]);

        assert_eq!(args.output, Some(PathBuf::from("plan.json")));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_configured_level() {
        assert_eq!(configured_level(Some("debug"), false), Some(LevelFilter::Debug));
        assert_eq!(configured_level(Some("WARN"), false), Some(LevelFilter::Warn));
        assert_eq!(configured_level(None, false), None);
        // RUST_LOG takes precedence
        assert_eq!(configured_level(Some("debug"), true), None);
    }
}
