use crate::config::Config;
use crate::topology::{Topology, TopologyError};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info};
use std::fs::File;
use std::path::Path;

/// Load, parse and validate a topology file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse '{}'", config_path.display()))?;

    config.validate()?;

    info!(
        "Loaded {} nodes, {} links and {} overlays",
        config.nodes.len(),
        config.links.len(),
        config.overlays.len()
    );
    Ok(config)
}

/// Parse and validate a topology from a YAML string
pub fn parse_config(yaml: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(yaml).wrap_err("Failed to parse configuration")?;
    config.validate()?;
    Ok(config)
}

/// Build the topology described by `config` and apply its overlays
pub fn build_topology(config: &Config) -> Result<Topology, TopologyError> {
    let mut topo = Topology::with_igp_defaults(config.network.igp_metric, config.network.igp_area.clone());

    for node_config in &config.nodes {
        let id = topo.add_node(node_config.name.clone(), node_config.kind)?;
        let node = topo.node_mut(id);
        node.asn = node_config.asn;
        node.lo_addresses = node_config.lo_addresses.clone();
        node.daemons = node_config.daemons.to_daemons();
    }

    for link in &config.links {
        let (a, b) = &link.nodes;
        topo.add_link_by_name(a, b, link.to_params())?;
    }

    let reservation = config.network.subnet_reservation();
    for overlay in &config.overlays {
        debug!("Applying overlay {:?}", overlay);
        overlay.apply(&mut topo, reservation)?;
    }

    Ok(topo)
}
