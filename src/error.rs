//! Error types.

use crate::dns::rcode_name;
use std::net::SocketAddr;
use std::time::Duration;
use trust_dns_proto::error::ProtoError;
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::RecordType;

/// Error enumerates the possible soacrab error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when no reply arrived from `server` before the read timeout.
    #[error("timeout after {timeout:?} waiting for {server}")]
    Timeout { server: SocketAddr, timeout: Duration },

    /// Returned when talking to `server` failed for a reason other than a timeout, e.g. a
    /// refused connection.
    #[error("{server}: {source}")]
    Exchange {
        server: SocketAddr,
        source: std::io::Error,
    },

    /// Returned when a server replied, but with a non-success status code.
    #[error("{}", rcode_name(*.0))]
    ResponseCode(ResponseCode),

    /// Returned by local lookups when the resolver configuration lists no server at all.
    #[error("No name server to answer the question")]
    NoResolver,

    /// Returned when `resolv.conf` can't be parsed.
    #[error("invalid resolver configuration: {0}")]
    ResolvConf(#[from] resolv_conf::ParseError),

    /// Returned when `resolv.conf` has no `nameserver` line.
    #[error("no name server configured in {0}")]
    NoLocalResolvers(String),

    /// Returned when the zone's NS lookup through the local resolvers failed.
    #[error("Cannot retrieve the list of name servers for {zone}: {source}")]
    NameServerLookup { zone: String, source: Box<Error> },

    /// Returned when the zone's NS lookup answered NXDOMAIN.
    #[error("No such domain {0}")]
    NoSuchDomain(String),

    /// Returned when the reverse lookup of a name server given as an IP address has no PTR
    /// record.
    #[error("no PTR record")]
    NoPointerRecord,

    /// Returned when the queried zone turns out to be an alias (a CNAME answered the SOA
    /// question). This is a usage error: the argument is not a zone apex.
    #[error("Apparently not a zone but an alias: {zone} is an alias for {target}")]
    NotAZone { zone: String, target: String },

    /// Returned when an SOA answer contains a record type that should never appear there.
    #[error("Internal error when processing the answer for {zone}, unexpected record type {record_type}")]
    UnexpectedRecord {
        zone: String,
        record_type: RecordType,
    },

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when the JSON report can't be serialized.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when a DNS message can't be encoded or decoded, or a name is invalid.
    #[error("DNS error: {0}")]
    DNSError(#[from] ProtoError),
}

impl Error {
    /// True for a transport timeout, the only failure that makes the address resolver move on
    /// to the next local resolver.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// True for errors that must end the whole run instead of being reported per name server.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::NotAZone { .. } | Error::UnexpectedRecord { .. }
        )
    }
}
