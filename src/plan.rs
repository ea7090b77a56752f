//! Serialisable view of an allocated network.
//!
//! A [`NetworkPlan`] is what the command line tool writes out: every
//! broadcast domain with its subnets, every interface with its addresses,
//! router identities and BGP sessions, host gateways and what is left of the
//! address pools.

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::Serialize;

use crate::router::daemon::{BgpConfig, Daemon, OspfConfig, RipngConfig};
use crate::router::BgpNeighbor;

// ============================================================================
// Plan Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkPlan {
    pub domains: Vec<DomainPlan>,
    pub interfaces: Vec<InterfacePlan>,
    pub routers: Vec<RouterPlan>,
    pub hosts: Vec<HostPlan>,
    pub pools: PoolPlan,
}

/// One broadcast domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainPlan {
    pub id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Net>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Net>,
    /// Member interface names
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfacePlan {
    pub name: String,
    pub node: String,
    pub addresses: Vec<IpNet>,
    pub igp_metric: u32,
    pub igp_area: String,
    pub igp_passive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterPlan {
    pub name: String,
    pub router_id: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    /// Daemons in start-up order
    pub daemons: Vec<DaemonPlan>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub loopbacks: Vec<IpNet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bgp_neighbors: Vec<BgpNeighbor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rr_clients: Vec<BgpNeighbor>,
}

/// A daemon and the settings it runs with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaemonPlan {
    pub name: String,
    #[serde(flatten)]
    pub settings: Option<DaemonSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DaemonSettings {
    Ospf(OspfConfig),
    Ripng(RipngConfig),
    Bgp(BgpConfig),
}

impl From<&Daemon> for DaemonPlan {
    fn from(daemon: &Daemon) -> Self {
        let settings = match daemon {
            Daemon::Ospf(config) | Daemon::Ospf6(config) => Some(DaemonSettings::Ospf(config.clone())),
            Daemon::Ripng(config) => Some(DaemonSettings::Ripng(config.clone())),
            Daemon::Bgp(config) => Some(DaemonSettings::Bgp(config.clone())),
            Daemon::Zebra | Daemon::Static | Daemon::Iptables | Daemon::Ip6tables => None,
        };
        Self {
            name: daemon.name().to_string(),
            settings,
        }
    }
}

/// Default gateway of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gateway {
    pub router: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Addr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostPlan {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Gateway>,
}

/// Unallocated blocks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolPlan {
    pub ipv4: Vec<Ipv4Net>,
    pub ipv6: Vec<Ipv6Net>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_settings_in_plan() {
        let ospf = DaemonPlan::from(&Daemon::Ospf(OspfConfig {
            hello_int: 5,
            ..OspfConfig::default()
        }));
        assert_eq!(ospf.name, "ospfd");
        let yaml = serde_yaml::to_string(&ospf).unwrap();
        assert!(yaml.contains("name: ospfd"));
        assert!(yaml.contains("hello_int: 5"));
        assert!(yaml.contains("dead_int: 3"));
        assert!(!yaml.contains("router_id"));

        let zebra = DaemonPlan::from(&Daemon::Zebra);
        assert_eq!(zebra.settings, None);
        assert_eq!(serde_yaml::to_string(&zebra).unwrap().trim(), "name: zebra");
    }
}
