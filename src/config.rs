//! Cluster settings.
//!
//! Settings can come from a flat property map (`cluster.enabled=true`, ...),
//! from the process environment (`CLUSTER_ENABLED=true`, ...) or be built in
//! code through [`ClusterSettings::builder`].

use crate::error::{ClusterError, ClusterResult};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

pub const PROP_ENABLED: &str = "cluster.enabled";
pub const PROP_NAME: &str = "cluster.name";
pub const PROP_PORT: &str = "cluster.port";
pub const PROP_INTERFACES: &str = "cluster.interfaces";
pub const PROP_MEMBERS: &str = "cluster.members";

pub const DEFAULT_CLUSTER_NAME: &str = "appstate";
pub const DEFAULT_PORT: u16 = 9003;

/// Configuration consumed by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterSettings {
    /// Gate for the whole subsystem. Starting a coordinator while this is
    /// `false` is a configuration error.
    pub enabled: bool,

    /// Membership group name. Nodes with different names never see each other.
    pub name: String,

    /// UDP port of the membership transport. The internal RPC port is this
    /// port + 1000.
    pub port: u16,

    /// Interfaces (IP addresses) the transport may bind to. Empty means the
    /// default interface.
    pub interfaces: Vec<String>,

    /// Static seed members, `host[:port]`.
    pub members: Vec<String>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            name: DEFAULT_CLUSTER_NAME.to_string(),
            port: DEFAULT_PORT,
            interfaces: Vec::new(),
            members: Vec::new(),
        }
    }
}

impl ClusterSettings {
    pub fn builder() -> ClusterSettingsBuilder {
        ClusterSettingsBuilder::default()
    }

    /// Reads settings from a property map. Missing keys keep their defaults.
    pub fn from_properties(props: &HashMap<String, String>) -> ClusterResult<Self> {
        let mut settings = Self::default();

        if let Some(raw) = props.get(PROP_ENABLED) {
            settings.enabled = parse_bool(PROP_ENABLED, raw)?;
        }
        if let Some(raw) = props.get(PROP_NAME) {
            settings.name = raw.trim().to_string();
        }
        if let Some(raw) = props.get(PROP_PORT) {
            settings.port = raw.trim().parse().map_err(|_| {
                ClusterError::Config(format!("{} is not a valid port: '{}'", PROP_PORT, raw))
            })?;
        }
        if let Some(raw) = props.get(PROP_INTERFACES) {
            settings.interfaces = split_list(raw);
        }
        if let Some(raw) = props.get(PROP_MEMBERS) {
            settings.members = split_list(raw);
        }

        Ok(settings)
    }

    /// Reads settings from `CLUSTER_*` environment variables.
    pub fn from_env() -> ClusterResult<Self> {
        let props: HashMap<String, String> = [
            (PROP_ENABLED, "CLUSTER_ENABLED"),
            (PROP_NAME, "CLUSTER_NAME"),
            (PROP_PORT, "CLUSTER_PORT"),
            (PROP_INTERFACES, "CLUSTER_INTERFACES"),
            (PROP_MEMBERS, "CLUSTER_MEMBERS"),
        ]
        .into_iter()
        .filter_map(|(prop, var)| std::env::var(var).ok().map(|v| (prop.to_string(), v)))
        .collect();

        Self::from_properties(&props)
    }

    pub fn validate(&self) -> ClusterResult<()> {
        if self.name.trim().is_empty() {
            return Err(ClusterError::Config(format!("{} must not be empty", PROP_NAME)));
        }

        if self.port == 0 {
            return Err(ClusterError::Config(format!("{} must be > 0", PROP_PORT)));
        }

        if self.port > u16::MAX - 1000 {
            return Err(ClusterError::Config(format!(
                "{} ({}) leaves no room for the RPC port (port + 1000)",
                PROP_PORT, self.port
            )));
        }

        for interface in &self.interfaces {
            if interface.parse::<IpAddr>().is_err() {
                return Err(ClusterError::Config(format!(
                    "Interface {} is not a valid IP address",
                    interface
                )));
            }
        }

        self.seed_targets()?;

        Ok(())
    }

    /// First allowed interface, if any.
    pub fn bind_interface(&self) -> Option<IpAddr> {
        self.interfaces.iter().find_map(|i| i.parse().ok())
    }

    /// Seed members as `host:port` strings ready for name resolution.
    /// Members without an explicit port get the cluster port.
    pub fn seed_targets(&self) -> ClusterResult<Vec<String>> {
        self.members
            .iter()
            .map(|member| seed_target(member, self.port))
            .collect()
    }
}

fn seed_target(member: &str, default_port: u16) -> ClusterResult<String> {
    let member = member.trim();
    if member.is_empty() {
        return Err(ClusterError::Config(format!(
            "{} contains an empty entry",
            PROP_MEMBERS
        )));
    }

    if let Ok(addr) = member.parse::<SocketAddr>() {
        return Ok(addr.to_string());
    }
    if let Ok(ip) = member.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port).to_string());
    }

    match member.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| {
                ClusterError::Config(format!("Member {} has an invalid port", member))
            })?;
            if host.is_empty() {
                return Err(ClusterError::Config(format!(
                    "Member {} has no host",
                    member
                )));
            }
            Ok(format!("{}:{}", host, port))
        }
        None => Ok(format!("{}:{}", member, default_port)),
    }
}

fn parse_bool(key: &str, raw: &str) -> ClusterResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" | "" => Ok(false),
        other => Err(ClusterError::Config(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder for [`ClusterSettings`].
#[derive(Debug, Default)]
pub struct ClusterSettingsBuilder {
    settings: ClusterSettings,
}

impl ClusterSettingsBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.settings.enabled = enabled;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.settings.name = name.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.settings.port = port;
        self
    }

    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.settings.interfaces.push(interface.into());
        self
    }

    /// Add a seed member (`host[:port]`).
    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.settings.members.push(member.into());
        self
    }

    pub fn build(self) -> ClusterResult<ClusterSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
