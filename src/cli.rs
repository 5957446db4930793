//! Command line parsing.

use crate::config::{
    Config, Families, Protocol, DEFAULT_EDNS_BUFFER_SIZE, DEFAULT_MAX_TRIALS, DEFAULT_NS_PORT,
    DEFAULT_RESOLV_CONF, MAX_TIMEOUT,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "soacrab", version)]
#[command(about = "Check that every name server of a zone answers with the same SOA serial.")]
#[allow(clippy::struct_excessive_bools)]
pub struct Args {
    /// Use only IPv4
    #[arg(short = '4', long = "ipv4-only", conflicts_with = "ipv6_only")]
    pub ipv4_only: bool,

    /// Use only IPv6
    #[arg(short = '6', long = "ipv6-only")]
    pub ipv6_only: bool,

    /// Debugging
    #[arg(short, long, conflicts_with = "quiet")]
    pub debug: bool,

    /// Quiet mode, display only errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable EDNS
    #[arg(short = 'r', long = "no-edns")]
    pub no_edns: bool,

    /// Request the name server identifier (NSID, requires EDNS)
    #[arg(long, conflicts_with = "no_edns")]
    pub nsid: bool,

    /// EDNS buffer size
    #[arg(short = 'b', long = "bufsize", default_value_t = DEFAULT_EDNS_BUFFER_SIZE)]
    pub edns_buffer_size: u16,

    /// Use TCP
    #[arg(long)]
    pub tcp: bool,

    /// Disable DNSSEC (DO bit)
    #[arg(short = 's', long = "no-dnssec")]
    pub no_dnssec: bool,

    /// Set recursion desired on SOA queries
    #[arg(short = 'e', long)]
    pub recursion: bool,

    /// Do not require an authoritative answer
    #[arg(short = 'a', long = "no-auth")]
    pub no_authoritative: bool,

    /// Display the response time of servers
    #[arg(short = 'i', long = "times")]
    pub times: bool,

    /// Timeout in seconds (for one trial)
    #[arg(short = 't', long, default_value = "1.5", value_parser = parse_timeout)]
    pub timeout: Duration,

    /// Number of trials before giving in
    #[arg(
        short = 'n',
        long = "trials",
        default_value_t = DEFAULT_MAX_TRIALS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_trials: u32,

    /// Name servers to query (space-separated names or addresses) instead of the zone's NS
    #[arg(long = "ns", value_delimiter = ' ')]
    pub nameservers: Vec<String>,

    /// Port the name servers are queried on
    #[arg(short = 'p', long, default_value_t = DEFAULT_NS_PORT)]
    pub port: u16,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Resolver configuration used for NS, address and reverse lookups
    #[arg(long = "resolv-conf", default_value = DEFAULT_RESOLV_CONF)]
    pub resolv_conf: PathBuf,

    /// The zone to check
    pub zone: String,
}

impl Args {
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The immutable run configuration described by these arguments.
    #[must_use]
    pub fn to_config(&self) -> Config {
        let families = match (self.ipv4_only, self.ipv6_only) {
            (true, _) => Families::V4Only,
            (_, true) => Families::V6Only,
            _ => Families::Both,
        };
        Config {
            families,
            quiet: self.quiet,
            edns: !self.no_edns,
            dnssec_ok: !self.no_dnssec,
            nsid: self.nsid,
            protocol: if self.tcp {
                Protocol::Tcp
            } else {
                Protocol::Udp
            },
            recursion_desired: self.recursion,
            require_authoritative: !self.no_authoritative,
            show_timings: self.times,
            timeout: self.timeout,
            max_trials: self.max_trials,
            edns_buffer_size: self.edns_buffer_size,
            ns_port: self.port,
            nameservers: self
                .nameservers
                .iter()
                .filter(|ns| !ns.is_empty())
                .cloned()
                .collect(),
            json: self.json,
        }
    }
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("\"{s}\" is not a number"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be positive, not {s}"));
    }
    let timeout = Duration::try_from_secs_f64(secs).map_err(|err| format!("{s}: {err}"))?;
    if timeout > MAX_TIMEOUT {
        return Err(format!(
            "timeout must not exceed {} seconds, not {s}",
            MAX_TIMEOUT.as_secs()
        ));
    }
    Ok(timeout)
}
