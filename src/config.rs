use crate::error::Error;
use resolv_conf::ScopedIp;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::rr::RecordType;

pub type SharedConfig = Arc<Config>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);
/// Upper bound accepted for the per-trial timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_TRIALS: u32 = 3;
pub const DEFAULT_EDNS_BUFFER_SIZE: u16 = 4096;
pub const DEFAULT_NS_PORT: u16 = 53;
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Transport used to talk to the zone's name servers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
}

/// Address families whose records are looked up for each name server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Families {
    #[default]
    Both,
    V4Only,
    V6Only,
}

impl Families {
    /// Record types to ask the local resolvers for, A before AAAA.
    #[must_use]
    pub fn record_types(self) -> &'static [RecordType] {
        match self {
            Families::Both => &[RecordType::A, RecordType::AAAA],
            Families::V4Only => &[RecordType::A],
            Families::V6Only => &[RecordType::AAAA],
        }
    }
}

/// Validated run configuration. Built once at startup and never mutated afterwards; every task
/// gets a [`SharedConfig`] clone.
#[derive(Debug, Clone)]
pub struct Config {
    pub families: Families,
    pub quiet: bool,
    pub edns: bool,
    pub dnssec_ok: bool,
    pub nsid: bool,
    pub protocol: Protocol,
    pub recursion_desired: bool,
    pub require_authoritative: bool,
    pub show_timings: bool,
    pub timeout: Duration,
    pub max_trials: u32,
    pub edns_buffer_size: u16,
    pub ns_port: u16,
    pub nameservers: Vec<String>,
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            families: Families::Both,
            quiet: false,
            edns: true,
            dnssec_ok: true,
            nsid: false,
            protocol: Protocol::Udp,
            recursion_desired: false,
            require_authoritative: true,
            show_timings: false,
            timeout: DEFAULT_TIMEOUT,
            max_trials: DEFAULT_MAX_TRIALS,
            edns_buffer_size: DEFAULT_EDNS_BUFFER_SIZE,
            ns_port: DEFAULT_NS_PORT,
            nameservers: Vec::new(),
            json: false,
        }
    }
}

/// The local resolvers used for NS, A, AAAA and PTR lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub servers: Vec<IpAddr>,
    pub port: u16,
}

impl ResolverConfig {
    #[must_use]
    pub fn new(servers: Vec<IpAddr>, port: u16) -> Self {
        ResolverConfig { servers, port }
    }

    /// Read the `nameserver` lines of a `resolv.conf` style file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read, [`Error::ResolvConf`] if it can't be
    /// parsed and [`Error::NoLocalResolvers`] if it names no server.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let path = p.as_ref();
        let raw = std::fs::read(path)?;
        let servers = Self::parse(&raw)?;
        if servers.is_empty() {
            return Err(Error::NoLocalResolvers(path.display().to_string()));
        }
        Ok(ResolverConfig::new(servers, DEFAULT_NS_PORT))
    }

    fn parse(raw: &[u8]) -> Result<Vec<IpAddr>, Error> {
        let conf = resolv_conf::Config::parse(raw)?;
        let servers = conf
            .nameservers
            .into_iter()
            .map(|server| match server {
                ScopedIp::V4(ip) => IpAddr::V4(ip),
                // The scope of link-local servers ("fe80::1%eth0") is dropped.
                ScopedIp::V6(ip, _) => IpAddr::V6(ip),
            })
            .collect();
        Ok(servers)
    }

    /// Socket addresses of the configured servers, in configuration order.
    pub fn socket_addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.servers
            .iter()
            .map(move |ip| SocketAddr::new(*ip, self.port))
    }
}
