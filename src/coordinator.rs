//! Concurrent fan-out of address lookups and SOA probes.
//!
//! For every name server one lookup task is spawned per enabled address family. Each address
//! found is probed by its own task as soon as the lookup that found it returns, so probing
//! starts before every lookup is done. All tasks report through one of two channels; the
//! collecting loop is the only writer of the [`ZoneReport`] and stops once it received exactly
//! as many replies as it spawned tasks.

use crate::config::{ResolverConfig, SharedConfig};
use crate::dns::prober::{SoaProbeOutcome, SoaProber};
use crate::dns::resolver::{AddressQueryOutcome, LocalResolver};
use crate::dns::transport::DynExchange;
use crate::dns::{fqdn, AnswerRecord};
use crate::error::Error;
use crate::report::{NameServerReport, ZoneReport};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use trust_dns_proto::op::ResponseCode;
use trust_dns_proto::rr::{Name, RecordType};

type ProbeSender = mpsc::UnboundedSender<Result<SoaProbeOutcome, Error>>;

/// What the address lookups found for one name server.
#[derive(Debug, Default)]
struct Discovery {
    addresses: Vec<IpAddr>,
    ipv4_error: Option<String>,
    ipv6_error: Option<String>,
}

impl Discovery {
    fn global_error(&self) -> Option<String> {
        let errors: Vec<&str> = [&self.ipv4_error, &self.ipv6_error]
            .into_iter()
            .filter_map(Option::as_deref)
            .collect();
        if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        }
    }
}

/// Checks one zone: finds its name servers, their addresses, and what each address says.
pub struct ZoneChecker {
    config: SharedConfig,
    resolver: Arc<LocalResolver>,
    prober: Arc<SoaProber>,
}

impl ZoneChecker {
    #[must_use]
    pub fn new(config: SharedConfig, resolvers: ResolverConfig, exchange: DynExchange) -> Self {
        let resolver = LocalResolver::new(
            resolvers,
            exchange.clone(),
            config.max_trials,
            config.edns_buffer_size,
        );
        let prober = SoaProber::new(config.clone(), exchange);
        ZoneChecker {
            config,
            resolver: Arc::new(resolver),
            prober: Arc::new(prober),
        }
    }

    /// The name servers to check: the explicit list of the configuration if there is one,
    /// the zone's NS records otherwise.
    ///
    /// Explicit addresses without a reverse name are skipped, with a line on `diagnostics`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchDomain`] or [`Error::NameServerLookup`] when the NS lookup
    /// fails, [`Error::DNSError`] for an explicit name that isn't a domain name and
    /// [`Error::IO`] if `diagnostics` can't be written.
    pub async fn name_servers(
        &self,
        zone: &Name,
        diagnostics: &mut impl Write,
    ) -> Result<Vec<Name>, Error> {
        if self.config.nameservers.is_empty() {
            self.zone_name_servers(zone).await
        } else {
            self.explicit_name_servers(diagnostics).await
        }
    }

    async fn zone_name_servers(&self, zone: &Name) -> Result<Vec<Name>, Error> {
        let outcome = self.resolver.query(zone, RecordType::NS).await;
        let message = match outcome.answer {
            Ok(message) => message,
            Err(Error::ResponseCode(ResponseCode::NXDomain)) => {
                return Err(Error::NoSuchDomain(zone.to_string()))
            }
            Err(err) => {
                return Err(Error::NameServerLookup {
                    zone: zone.to_string(),
                    source: Box::new(err),
                })
            }
        };
        let names = message
            .answers()
            .iter()
            .filter_map(|record| match AnswerRecord::classify(record) {
                AnswerRecord::NameServer(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        Ok(names)
    }

    async fn explicit_name_servers(
        &self,
        diagnostics: &mut impl Write,
    ) -> Result<Vec<Name>, Error> {
        let mut names = Vec::with_capacity(self.config.nameservers.len());
        for server in &self.config.nameservers {
            match server.parse::<IpAddr>() {
                Ok(ip) => match self.reverse(ip).await {
                    Ok(name) => {
                        tracing::debug!("{ip} is {name}");
                        names.push(name);
                    }
                    Err(err) => writeln!(diagnostics, "No reverse for {ip}: {err}")?,
                },
                Err(_) => names.push(fqdn(server)?),
            }
        }
        Ok(names)
    }

    async fn reverse(&self, ip: IpAddr) -> Result<Name, Error> {
        let outcome = self.resolver.query(&Name::from(ip), RecordType::PTR).await;
        let message = outcome.answer?;
        message
            .answers()
            .iter()
            .find_map(|record| match AnswerRecord::classify(record) {
                AnswerRecord::Pointer(name) => Some(name.clone()),
                _ => None,
            })
            .ok_or(Error::NoPointerRecord)
    }

    /// Look up the addresses of every name server and probe each address for `zone`'s SOA.
    ///
    /// Failures of single lookups or probes are recorded in the report. Every name server
    /// shows up in the report, including those without any address.
    ///
    /// # Errors
    ///
    /// Returns the first fatal probe error ([`Error::NotAZone`], [`Error::UnexpectedRecord`]).
    /// Tasks still running at that point are abandoned.
    pub async fn check(&self, zone: &Name, name_servers: &[Name]) -> Result<ZoneReport, Error> {
        let mut seen = HashSet::new();
        let targets: Vec<&Name> = name_servers
            .iter()
            .filter(|name| seen.insert(*name))
            .collect();
        let record_types = self.config.families.record_types();

        let (address_tx, mut address_rx) = mpsc::unbounded_channel::<AddressQueryOutcome>();
        let (probe_tx, mut probe_rx) = mpsc::unbounded_channel();

        let mut discovered: HashMap<Name, Discovery> = HashMap::with_capacity(targets.len());
        for name in &targets {
            discovered.insert((*name).clone(), Discovery::default());
            for &record_type in record_types {
                let resolver = Arc::clone(&self.resolver);
                let name = (*name).clone();
                let tx = address_tx.clone();
                tokio::spawn(async move {
                    let outcome = resolver.query(&name, record_type).await;
                    // Only fails once the run was abandoned.
                    let _ = tx.send(outcome);
                });
            }
        }

        let mut report = ZoneReport::new(zone.to_string(), targets.len());
        let mut pending_lookups = targets.len() * record_types.len();
        let mut pending_probes = 0usize;
        while pending_lookups > 0 || pending_probes > 0 {
            tokio::select! {
                Some(outcome) = address_rx.recv(), if pending_lookups > 0 => {
                    pending_lookups -= 1;
                    let spawned = self.record_lookup(zone, outcome, &mut discovered, &probe_tx, &mut report);
                    pending_probes += spawned;
                    report.addresses += spawned;
                }
                Some(probe) = probe_rx.recv(), if pending_probes > 0 => {
                    pending_probes -= 1;
                    let outcome = probe?;
                    tracing::debug!(
                        "got {} for {} ({}), {pending_probes} probes left",
                        outcome.message, outcome.name, outcome.address
                    );
                    report.record_probe(outcome);
                }
            }
        }

        for (name, discovery) in discovered {
            let global_error = discovery.global_error();
            let key = name.to_string();
            if discovery.addresses.is_empty() {
                report.success = false;
                let mut server = NameServerReport::new(key.clone());
                server.global_error =
                    Some(global_error.unwrap_or_else(|| "No IP address found".to_string()));
                report.servers.insert(key, server);
            } else if let Some(global_error) = global_error {
                report
                    .servers
                    .entry(key.clone())
                    .or_insert_with(|| NameServerReport::new(key))
                    .global_error = Some(global_error);
            }
        }
        Ok(report)
    }

    /// Fold one address lookup, spawning a probe per address found. Returns how many probes
    /// were spawned.
    fn record_lookup(
        &self,
        zone: &Name,
        outcome: AddressQueryOutcome,
        discovered: &mut HashMap<Name, Discovery>,
        probe_tx: &ProbeSender,
        report: &mut ZoneReport,
    ) -> usize {
        let discovery = discovered.entry(outcome.name.clone()).or_default();
        let message = match outcome.answer {
            Ok(message) => message,
            Err(err) => {
                let (family, slot) = if outcome.query_type == RecordType::A {
                    ("IPv4", &mut discovery.ipv4_error)
                } else {
                    ("IPv6", &mut discovery.ipv6_error)
                };
                tracing::debug!("no {family} address for {}: {err}", outcome.name);
                *slot = Some(format!("Cannot get the {family} address: {err}"));
                report.success = false;
                return 0;
            }
        };

        let mut spawned = 0;
        for record in message.answers() {
            if let AnswerRecord::Address(address) = AnswerRecord::classify(record) {
                discovery.addresses.push(address);
                self.spawn_probe(zone, &outcome.name, address, probe_tx);
                spawned += 1;
            }
        }
        spawned
    }

    fn spawn_probe(&self, zone: &Name, name: &Name, address: IpAddr, probe_tx: &ProbeSender) {
        let prober = Arc::clone(&self.prober);
        let zone = zone.clone();
        let name = name.clone();
        let tx = probe_tx.clone();
        tokio::spawn(async move {
            let outcome = prober.probe(&zone, &name, address).await;
            let _ = tx.send(outcome);
        });
    }
}
