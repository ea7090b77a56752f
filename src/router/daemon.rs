//! Routing daemon settings attached to routers.
//!
//! Only the settings that matter to address planning are modelled: the
//! optional user-set router-id, the BGP port and the IGP timers. They are
//! written out with each router in the allocation plan.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Default TCP port of BGP sessions
pub const BGP_DEFAULT_PORT: u16 = 179;

fn default_hello_int() -> u32 {
    1
}

fn default_dead_int() -> u32 {
    3
}

fn default_ospf_priority() -> u32 {
    10
}

fn default_bgp_port() -> u16 {
    BGP_DEFAULT_PORT
}

fn default_update_timer() -> u32 {
    30
}

fn default_timeout_timer() -> u32 {
    180
}

fn default_garbage_timer() -> u32 {
    120
}

/// OSPFv2 / OSPFv3 settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_id: Option<Ipv4Addr>,
    #[serde(default = "default_hello_int")]
    pub hello_int: u32,
    #[serde(default = "default_dead_int")]
    pub dead_int: u32,
    #[serde(default = "default_ospf_priority")]
    pub priority: u32,
}

impl Default for OspfConfig {
    fn default() -> Self {
        Self {
            router_id: None,
            hello_int: default_hello_int(),
            dead_int: default_dead_int(),
            priority: default_ospf_priority(),
        }
    }
}

/// RIPng settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RipngConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_id: Option<Ipv4Addr>,
    #[serde(default = "default_update_timer")]
    pub update_timer: u32,
    #[serde(default = "default_timeout_timer")]
    pub timeout_timer: u32,
    #[serde(default = "default_garbage_timer")]
    pub garbage_timer: u32,
}

impl Default for RipngConfig {
    fn default() -> Self {
        Self {
            router_id: None,
            update_timer: default_update_timer(),
            timeout_timer: default_timeout_timer(),
            garbage_timer: default_garbage_timer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_id: Option<Ipv4Addr>,
    #[serde(default = "default_bgp_port")]
    pub port: u16,
}

impl Default for BgpConfig {
    fn default() -> Self {
        Self {
            router_id: None,
            port: BGP_DEFAULT_PORT,
        }
    }
}

/// A daemon running on a router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Daemon {
    Zebra,
    Ospf(OspfConfig),
    Ospf6(OspfConfig),
    Ripng(RipngConfig),
    Bgp(BgpConfig),
    Static,
    Iptables,
    Ip6tables,
}

impl Daemon {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Zebra => "zebra",
            Self::Ospf(_) => "ospfd",
            Self::Ospf6(_) => "ospf6d",
            Self::Ripng(_) => "ripngd",
            Self::Bgp(_) => "bgpd",
            Self::Static => "staticd",
            Self::Iptables => "iptables",
            Self::Ip6tables => "ip6tables",
        }
    }

    /// Start-up priority, lower values first
    pub fn priority(&self) -> u8 {
        match self {
            Self::Zebra => 0,
            Self::Ospf(_) => 10,
            Self::Ospf6(_) => 11,
            Self::Ripng(_) => 12,
            Self::Bgp(_) => 13,
            Self::Static => 14,
            Self::Iptables => 20,
            Self::Ip6tables => 21,
        }
    }

    /// The user-set router-id, if this daemon carries one
    pub fn router_id(&self) -> Option<Ipv4Addr> {
        match self {
            Self::Ospf(config) | Self::Ospf6(config) => config.router_id,
            Self::Ripng(config) => config.router_id,
            Self::Bgp(config) => config.router_id,
            _ => None,
        }
    }

    /// Whether the daemon needs zebra to install its routes
    pub fn needs_zebra(&self) -> bool {
        matches!(
            self,
            Self::Ospf(_) | Self::Ospf6(_) | Self::Ripng(_) | Self::Bgp(_) | Self::Static
        )
    }
}

/// Daemons sorted by start-up priority
pub fn by_priority(daemons: &[Daemon]) -> Vec<&Daemon> {
    let mut sorted: Vec<&Daemon> = daemons.iter().collect();
    sorted.sort_by_key(|d| d.priority());
    sorted
}

/// Add zebra when a daemon depends on it and drop duplicate daemons
pub fn with_dependencies(daemons: Vec<Daemon>) -> Vec<Daemon> {
    let mut resolved: Vec<Daemon> = Vec::with_capacity(daemons.len() + 1);
    if daemons.iter().any(Daemon::needs_zebra) {
        resolved.push(Daemon::Zebra);
    }
    for daemon in daemons {
        if !resolved.iter().any(|d| d.name() == daemon.name()) {
            resolved.push(daemon);
        }
    }
    resolved
}
