//! Direct SOA queries to one address of one name server.

use crate::config::SharedConfig;
use crate::dns::transport::DynExchange;
use crate::dns::{rcode_name, AnswerRecord};
use crate::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use trust_dns_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_proto::rr::rdata::opt::{EdnsCode, EdnsOption};
use trust_dns_proto::rr::{Name, RecordType};

/// Displayed instead of an NSID that isn't valid hex.
pub const NSID_DECODING_ERROR: &str = "ERROR IN DECODING";

/// What one address said about the zone's SOA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoaProbeOutcome {
    pub name: Name,
    pub address: IpAddr,
    pub serial: u32,
    pub retrieved: bool,
    pub message: String,
    pub rtt: Duration,
    /// Hex encoded NSID payload, when one was requested and returned.
    pub nsid: Option<String>,
}

/// Sends SOA questions straight to name server addresses, bypassing the local resolvers.
pub struct SoaProber {
    config: SharedConfig,
    exchange: DynExchange,
}

impl SoaProber {
    #[must_use]
    pub fn new(config: SharedConfig, exchange: DynExchange) -> Self {
        SoaProber { config, exchange }
    }

    fn message(&self, zone: &Name) -> Message {
        let mut message = Message::new();
        message
            .set_id(rand::random())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(self.config.recursion_desired)
            .add_query(Query::query(zone.clone(), RecordType::SOA));
        if self.config.edns {
            let mut edns = Edns::new();
            edns.set_max_payload(self.config.edns_buffer_size);
            edns.set_dnssec_ok(self.config.dnssec_ok);
            if self.config.nsid {
                edns.options_mut()
                    .insert(EdnsOption::Unknown(u16::from(EdnsCode::NSID), Vec::new()));
            }
            message.set_edns(edns);
        }
        message
    }

    /// Ask `address` (a name server for `zone` known as `name`) for the zone's SOA record.
    ///
    /// Only transport failures are retried; any reply ends the probe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAZone`] when the zone is an alias and [`Error::UnexpectedRecord`]
    /// for answers that can't be part of an SOA reply. Both mean the run can't go on.
    pub async fn probe(
        &self,
        zone: &Name,
        name: &Name,
        address: IpAddr,
    ) -> Result<SoaProbeOutcome, Error> {
        let query = self.message(zone);
        let server = SocketAddr::new(address, self.config.ns_port);
        let mut outcome = SoaProbeOutcome {
            name: name.clone(),
            address,
            serial: 0,
            retrieved: false,
            message: "UNKNOWN".to_string(),
            rtt: Duration::ZERO,
            nsid: None,
        };

        tracing::debug!("querying SOA of {zone} from {server}");
        for trial in 1..=self.config.max_trials {
            match self
                .exchange
                .exchange(&query, server, self.config.protocol)
                .await
            {
                Err(err) => {
                    tracing::debug!("{name} ({server}), trial {trial}: {err}");
                    outcome.rtt = Duration::ZERO;
                    outcome.message = err.to_string();
                }
                Ok(reply) => {
                    outcome.rtt = reply.rtt;
                    self.classify(zone, &reply.message, &mut outcome)?;
                    break;
                }
            }
        }
        Ok(outcome)
    }

    fn classify(
        &self,
        zone: &Name,
        reply: &Message,
        outcome: &mut SoaProbeOutcome,
    ) -> Result<(), Error> {
        if self.config.nsid {
            outcome.nsid = nsid_token(reply);
        }

        if reply.response_code() != ResponseCode::NoError {
            outcome.message = rcode_name(reply.response_code());
            return Ok(());
        }
        // A recursive server asked with RD=0 typically answers this way.
        if reply.answers().is_empty() {
            outcome.message = "0 answer".to_string();
            return Ok(());
        }

        let mut got_soa = false;
        for record in reply.answers() {
            match AnswerRecord::classify(record) {
                AnswerRecord::Soa(soa) => {
                    if !self.config.require_authoritative || reply.authoritative() {
                        outcome.retrieved = true;
                        outcome.serial = soa.serial();
                        outcome.message = "OK".to_string();
                    } else {
                        outcome.message = "Not authoritative".to_string();
                    }
                    got_soa = true;
                }
                AnswerRecord::Signature => {}
                AnswerRecord::Alias(target) => {
                    return Err(Error::NotAZone {
                        zone: zone.to_string(),
                        target: target.to_string(),
                    });
                }
                _ => {
                    return Err(Error::UnexpectedRecord {
                        zone: zone.to_string(),
                        record_type: record.record_type(),
                    });
                }
            }
        }
        if !got_soa {
            outcome.message = "No SOA record in reply".to_string();
        }
        Ok(())
    }
}

fn nsid_token(reply: &Message) -> Option<String> {
    let edns = reply.extensions().as_ref()?;
    match edns.option(EdnsCode::NSID)? {
        EdnsOption::Unknown(_, payload) => Some(hex::encode(payload)),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Decode a hex NSID token for display.
///
/// Never fails: a token that isn't valid hex is shown as [`NSID_DECODING_ERROR`].
#[must_use]
pub fn decode_nsid(token: &str) -> String {
    match hex::decode(token) {
        Ok(raw) => String::from_utf8_lossy(&raw).into_owned(),
        Err(_) => NSID_DECODING_ERROR.to_string(),
    }
}
