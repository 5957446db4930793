//! DNS plumbing: one-shot exchanges, local lookups and authoritative SOA probes.
//!
//! # Transport
//!
//! [`transport`] performs exactly one question/answer exchange with one server over UDP or TCP,
//! bounded by the configured read timeout. It never retries; retry policy lives in the callers.
//!
//! # Local lookups
//!
//! [`resolver`] asks the local resolvers (normally those of `/etc/resolv.conf`) for the zone's
//! NS records, the name servers' A/AAAA records, and PTR records for name servers given as IP
//! addresses.
//!
//! # SOA probes
//!
//! [`prober`] queries one address of one name server directly for the zone's SOA record, with
//! recursion off by default, and classifies the reply:
//!
//! ```text
//! ❯ soacrab example.com
//! a.iana-servers.net.
//!         199.43.135.53: OK: 2024010100
//!         2001:500:8f::53: OK: 2024010100
//! b.iana-servers.net.
//!         199.43.133.53: ERROR: REFUSED
//! ```

pub mod prober;
pub mod resolver;
pub mod transport;

pub use prober::{SoaProbeOutcome, SoaProber};
pub use resolver::{AddressQueryOutcome, LocalResolver};
pub use transport::{DynExchange, Exchange, NetworkExchange, Reply};

use std::net::IpAddr;
use std::str::FromStr;
use trust_dns_proto::error::ProtoError;
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::rdata::SOA;
use trust_dns_proto::rr::{Name, RData, Record, RecordType};

/// The record shapes soacrab knows how to handle in an answer section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRecord<'a> {
    Address(IpAddr),
    Soa(&'a SOA),
    Signature,
    NameServer(&'a Name),
    Alias(&'a Name),
    Pointer(&'a Name),
    Other(RecordType),
}

impl<'a> AnswerRecord<'a> {
    #[must_use]
    pub fn classify(record: &'a Record) -> Self {
        // RRSIG is matched on the type because its RDATA is opaque without DNSSEC support.
        match (record.record_type(), record.data()) {
            (RecordType::RRSIG, _) => AnswerRecord::Signature,
            (_, Some(RData::A(ip))) => AnswerRecord::Address(IpAddr::V4(*ip)),
            (_, Some(RData::AAAA(ip))) => AnswerRecord::Address(IpAddr::V6(*ip)),
            (_, Some(RData::SOA(soa))) => AnswerRecord::Soa(soa),
            (_, Some(RData::NS(name))) => AnswerRecord::NameServer(name),
            (_, Some(RData::CNAME(name))) => AnswerRecord::Alias(name),
            (_, Some(RData::PTR(name))) => AnswerRecord::Pointer(name),
            (record_type, _) => AnswerRecord::Other(record_type),
        }
    }
}

/// The mnemonic of a response code, as printed by dig and friends.
#[must_use]
pub fn rcode_name(code: ResponseCode) -> String {
    let name = match code {
        ResponseCode::NoError => "NOERROR",
        ResponseCode::FormErr => "FORMERR",
        ResponseCode::ServFail => "SERVFAIL",
        ResponseCode::NXDomain => "NXDOMAIN",
        ResponseCode::NotImp => "NOTIMP",
        ResponseCode::Refused => "REFUSED",
        ResponseCode::YXDomain => "YXDOMAIN",
        ResponseCode::YXRRSet => "YXRRSET",
        ResponseCode::NXRRSet => "NXRRSET",
        ResponseCode::NotAuth => "NOTAUTH",
        ResponseCode::NotZone => "NOTZONE",
        other => return format!("RCODE{}", u16::from(other)),
    };
    name.to_string()
}

/// Parse `name` and mark it fully qualified.
///
/// # Errors
///
/// Returns the [`ProtoError`] of an invalid domain name.
pub fn fqdn(name: &str) -> Result<Name, ProtoError> {
    let mut name = Name::from_str(name)?;
    name.set_fqdn(true);
    Ok(name)
}
