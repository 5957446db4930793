//! soacrab
//!
//! Checks the health of a DNS zone: asks every name server of the zone, on every one of its
//! addresses, for the zone's [SOA] record and reports the serial number each one serves.
//!
//! Name servers are the zone's NS records (or an explicit list), resolved to IPv4 and IPv6
//! addresses through the local resolvers. Each address is then queried directly, without
//! recursion, and must answer authoritatively. Lookups and probes all run concurrently; see
//! [`coordinator`].
//!
//! [SOA]: https://www.rfc-editor.org/rfc/rfc1035#section-3.3.13
//!
#![warn(clippy::pedantic)]

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dns;
pub mod error;
pub mod report;

pub use config::{Config, ResolverConfig, SharedConfig};
pub use coordinator::ZoneChecker;
pub use report::{NameServerReport, ReportOptions, ZoneReport};
