use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::ip::address_space::{V4_RESERVED, V6_RESERVED};
use crate::ip::FamilySettings;
use crate::router::daemon::{self, BgpConfig, Daemon, OspfConfig, RipngConfig};
use crate::router::ROUTER_ID_SEED;
use crate::topology::types::{IntfParams, LinkParams, NodeKind, MIN_IGP_METRIC, OSPF_DEFAULT_AREA};
use crate::topology::overlay::SubnetReservation;
use crate::topology::Overlay;

/// Overlays are declared in the topology file as they are applied
pub type OverlayConfig = Overlay;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// A topology file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub network: NetworkSettings,
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    #[serde(default)]
    pub overlays: Vec<OverlayConfig>,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(level) = &self.general.log_level {
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(ValidationError::InvalidGeneral(format!(
                    "unknown log_level '{}', expected one of {}",
                    level,
                    LOG_LEVELS.join(", ")
                )));
            }
        }

        self.network.validate()?;

        let mut names = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(ValidationError::InvalidNode(
                    "node name cannot be empty".to_string(),
                ));
            }
            if !names.insert(node.name.as_str()) {
                return Err(ValidationError::InvalidNode(format!(
                    "node name '{}' is used twice",
                    node.name
                )));
            }
            if node.kind != NodeKind::Router && (node.asn.is_some() || !node.daemons.is_empty()) {
                return Err(ValidationError::InvalidNode(format!(
                    "{} '{}' cannot have an AS number or routing daemons",
                    node.kind, node.name
                )));
            }
        }

        for link in &self.links {
            let (a, b) = &link.nodes;
            for end in [a, b] {
                if !names.contains(end.as_str()) {
                    return Err(ValidationError::InvalidLink(format!(
                        "link {} - {} references unknown node '{}'",
                        a, b, end
                    )));
                }
            }
            if a == b {
                return Err(ValidationError::InvalidLink(format!(
                    "link {} - {} connects a node to itself",
                    a, b
                )));
            }
        }

        Ok(())
    }
}

/// Shared general configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Address allocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub use_v4: bool,
    pub ip_base: Ipv4Net,
    /// Shortest prefix an IPv4 broadcast domain may receive
    pub max_v4_prefixlen: u8,
    /// Longest prefix an IPv4 broadcast domain may receive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v4_block_prefixlen: Option<u8>,
    pub v4_reserved: u8,
    pub use_v6: bool,
    pub ip6_base: Ipv6Net,
    pub max_v6_prefixlen: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v6_block_prefixlen: Option<u8>,
    pub v6_reserved: u8,
    /// Allocate addresses, otherwise only static addresses are used
    pub allocate_ips: bool,
    pub igp_metric: u32,
    pub igp_area: String,
    pub router_id_seed: Ipv4Addr,
}

/// Default implementations
impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            use_v4: true,
            ip_base: Ipv4Net::new(Ipv4Addr::new(192, 168, 0, 0), 16).unwrap_or_default(),
            max_v4_prefixlen: 24,
            v4_block_prefixlen: None,
            v4_reserved: V4_RESERVED,
            use_v6: true,
            ip6_base: Ipv6Net::new(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7).unwrap_or_default(),
            max_v6_prefixlen: 48,
            v6_block_prefixlen: None,
            v6_reserved: V6_RESERVED,
            allocate_ips: true,
            igp_metric: MIN_IGP_METRIC,
            igp_area: OSPF_DEFAULT_AREA.to_string(),
            router_id_seed: ROUTER_ID_SEED,
        }
    }
}

impl NetworkSettings {
    pub fn use_v4(mut self, enabled: bool) -> Self {
        self.use_v4 = enabled;
        self
    }

    pub fn ip_base(mut self, base: Ipv4Net) -> Self {
        self.ip_base = base;
        self
    }

    pub fn max_v4_prefixlen(mut self, prefix_len: u8) -> Self {
        self.max_v4_prefixlen = prefix_len;
        self
    }

    pub fn v4_block_prefixlen(mut self, prefix_len: u8) -> Self {
        self.v4_block_prefixlen = Some(prefix_len);
        self
    }

    pub fn use_v6(mut self, enabled: bool) -> Self {
        self.use_v6 = enabled;
        self
    }

    pub fn ip6_base(mut self, base: Ipv6Net) -> Self {
        self.ip6_base = base;
        self
    }

    pub fn max_v6_prefixlen(mut self, prefix_len: u8) -> Self {
        self.max_v6_prefixlen = prefix_len;
        self
    }

    pub fn v6_block_prefixlen(mut self, prefix_len: u8) -> Self {
        self.v6_block_prefixlen = Some(prefix_len);
        self
    }

    pub fn allocate_ips(mut self, enabled: bool) -> Self {
        self.allocate_ips = enabled;
        self
    }

    pub fn router_id_seed(mut self, seed: Ipv4Addr) -> Self {
        self.router_id_seed = seed;
        self
    }

    /// IPv4 sizing rules
    pub fn v4(&self) -> FamilySettings {
        FamilySettings {
            max_prefix_len: self.max_v4_prefixlen,
            block_prefix_len: self.v4_block_prefixlen,
            reserved: self.v4_reserved,
        }
    }

    /// IPv6 sizing rules
    pub fn v6(&self) -> FamilySettings {
        FamilySettings {
            max_prefix_len: self.max_v6_prefixlen,
            block_prefix_len: self.v6_block_prefixlen,
            reserved: self.v6_reserved,
        }
    }

    /// Reservation applied to the prefixes of `subnet` overlays
    pub fn subnet_reservation(&self) -> SubnetReservation {
        SubnetReservation {
            v4: self.v4_reserved,
            v6: self.v6_reserved,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        Self::validate_family("IPv4", 32, &self.v4())?;
        Self::validate_family("IPv6", 128, &self.v6())?;
        if self.igp_metric == 0 {
            return Err(ValidationError::InvalidNetwork(
                "igp_metric must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_family(family: &str, bits: u8, settings: &FamilySettings) -> Result<(), ValidationError> {
        if settings.max_prefix_len > bits {
            return Err(ValidationError::InvalidNetwork(format!(
                "{} max prefix length /{} exceeds /{}",
                family, settings.max_prefix_len, bits
            )));
        }
        if let Some(floor) = settings.block_prefix_len {
            if floor > bits || floor < settings.max_prefix_len {
                return Err(ValidationError::InvalidNetwork(format!(
                    "{} block prefix length /{} must lie between /{} and /{}",
                    family, floor, settings.max_prefix_len, bits
                )));
            }
        }
        if settings.reserved > 2 {
            return Err(ValidationError::InvalidNetwork(format!(
                "{} reserved addresses per subnet must be 0, 1 or 2",
                family
            )));
        }
        Ok(())
    }
}

/// A router, host or switch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lo_addresses: Vec<IpNet>,
    #[serde(default, skip_serializing_if = "DaemonsConfig::is_empty")]
    pub daemons: DaemonsConfig,
}

/// Daemons to run on a router, keyed by daemon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonsConfig {
    pub zebra: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ospf: Option<OspfConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ospf6: Option<OspfConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ripng: Option<RipngConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp: Option<BgpConfig>,
    #[serde(rename = "static")]
    pub static_routes: bool,
    pub iptables: bool,
    pub ip6tables: bool,
}

impl DaemonsConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The daemon list, with zebra added where required
    pub fn to_daemons(&self) -> Vec<Daemon> {
        let mut daemons = Vec::new();
        if self.zebra {
            daemons.push(Daemon::Zebra);
        }
        if let Some(ospf) = &self.ospf {
            daemons.push(Daemon::Ospf(ospf.clone()));
        }
        if let Some(ospf6) = &self.ospf6 {
            daemons.push(Daemon::Ospf6(ospf6.clone()));
        }
        if let Some(ripng) = &self.ripng {
            daemons.push(Daemon::Ripng(ripng.clone()));
        }
        if let Some(bgp) = &self.bgp {
            daemons.push(Daemon::Bgp(bgp.clone()));
        }
        if self.static_routes {
            daemons.push(Daemon::Static);
        }
        if self.iptables {
            daemons.push(Daemon::Iptables);
        }
        if self.ip6tables {
            daemons.push(Daemon::Ip6tables);
        }
        daemon::with_dependencies(daemons)
    }
}

fn default_width() -> u32 {
    1
}

/// A link between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub nodes: (String, String),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub igp_metric: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub igp_area: Option<String>,
    #[serde(default)]
    pub igp_passive: bool,
    #[serde(default = "default_width")]
    pub v4_width: u32,
    #[serde(default = "default_width")]
    pub v6_width: u32,
    #[serde(default)]
    pub params1: IntfParams,
    #[serde(default)]
    pub params2: IntfParams,
}

impl LinkConfig {
    pub fn to_params(&self) -> LinkParams {
        LinkParams {
            igp_metric: self.igp_metric,
            igp_area: self.igp_area.clone(),
            igp_passive: self.igp_passive,
            v4_width: self.v4_width,
            v6_width: self.v6_width,
            params1: self.params1.clone(),
            params2: self.params2.clone(),
        }
    }
}

/// Validation errors for configuration
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
    #[error("Invalid node configuration: {0}")]
    InvalidNode(String),
    #[error("Invalid link configuration: {0}")]
    InvalidLink(String),
}
