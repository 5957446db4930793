//! Lookups through the local resolvers.

use crate::config::{Protocol, ResolverConfig};
use crate::dns::transport::DynExchange;
use crate::error::Error;
use std::time::Duration;
use trust_dns_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_proto::rr::{Name, RecordType};

/// Result of one local lookup.
///
/// A reply with a non-success status is carried as [`Error::ResponseCode`], so `answer` is only
/// `Ok` for NOERROR replies (which may still hold zero records).
#[derive(Debug)]
pub struct AddressQueryOutcome {
    pub name: Name,
    pub query_type: RecordType,
    pub answer: Result<Message, Error>,
    pub rtt: Duration,
}

/// Asks the configured local resolvers, in order, with recursion desired.
pub struct LocalResolver {
    resolvers: ResolverConfig,
    exchange: DynExchange,
    max_trials: u32,
    edns_buffer_size: u16,
}

impl LocalResolver {
    #[must_use]
    pub fn new(
        resolvers: ResolverConfig,
        exchange: DynExchange,
        max_trials: u32,
        edns_buffer_size: u16,
    ) -> Self {
        LocalResolver {
            resolvers,
            exchange,
            max_trials,
            edns_buffer_size,
        }
    }

    fn message(&self, name: &Name, query_type: RecordType) -> Message {
        let mut message = Message::new();
        message
            .set_id(rand::random())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(name.clone(), query_type));
        // EDNS is always sent to the local resolvers: large NS and AAAA answers would
        // otherwise be truncated.
        let mut edns = Edns::new();
        edns.set_max_payload(self.edns_buffer_size);
        message.set_edns(edns);
        message
    }

    /// Look up `name`/`query_type`.
    ///
    /// Each trial walks the resolver list in order. A timeout moves on to the next resolver;
    /// any other transport failure ends the lookup at once. The first reply ends the lookup
    /// too, whatever its status: a NOERROR reply without records is accepted as is.
    pub async fn query(&self, name: &Name, query_type: RecordType) -> AddressQueryOutcome {
        let query = self.message(name, query_type);
        let mut outcome = AddressQueryOutcome {
            name: name.clone(),
            query_type,
            answer: Err(Error::NoResolver),
            rtt: Duration::ZERO,
        };

        'trials: for trial in 1..=self.max_trials {
            for server in self.resolvers.socket_addrs() {
                tracing::debug!("asking {server} for {name} {query_type} (trial {trial})");
                match self.exchange.exchange(&query, server, Protocol::Udp).await {
                    Err(err) if err.is_timeout() => {
                        tracing::debug!("{err}, trying the next resolver");
                        outcome.answer = Err(err);
                    }
                    Err(err) => {
                        tracing::debug!("giving up on {name} {query_type}: {err}");
                        outcome.answer = Err(err);
                        break 'trials;
                    }
                    Ok(reply) => {
                        outcome.rtt = reply.rtt;
                        outcome.answer = match reply.message.response_code() {
                            ResponseCode::NoError => Ok(reply.message),
                            code => Err(Error::ResponseCode(code)),
                        };
                        break 'trials;
                    }
                }
            }
        }
        tracing::debug!("end of local lookup {name} {query_type}");
        outcome
    }
}
