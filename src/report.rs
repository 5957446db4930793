//! Aggregated results and their presentation.

use crate::config::Families;
use crate::dns::prober::{decode_nsid, SoaProbeOutcome};
use crate::error::Error;
use serde::Serialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::net::IpAddr;
use std::time::Duration;

/// One SOA probe of one address, as kept in a [`NameServerReport`].
#[serde_as]
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub address: IpAddr,
    pub success: bool,
    pub message: String,
    pub serial: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "rtt_ms")]
    pub rtt: Duration,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nsid: String,
}

impl ProbeResult {
    /// Fold a probe outcome. The NSID token, if any, is decoded for display here.
    #[must_use]
    pub fn from_outcome(outcome: SoaProbeOutcome) -> Self {
        let nsid = outcome
            .nsid
            .as_deref()
            .map(decode_nsid)
            .unwrap_or_default();
        ProbeResult {
            address: outcome.address,
            success: outcome.retrieved,
            message: outcome.message,
            serial: if outcome.retrieved { outcome.serial } else { 0 },
            rtt: outcome.rtt,
            nsid,
        }
    }
}

/// Everything learned about one name server, probes in arrival order.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NameServerReport {
    pub name: String,
    pub probes: Vec<ProbeResult>,
    /// Set when an address lookup for this name server failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_error: Option<String>,
}

impl NameServerReport {
    #[must_use]
    pub fn new(name: String) -> Self {
        NameServerReport {
            name,
            ..NameServerReport::default()
        }
    }

    /// True when every address lookup succeeded, at least one address was found and every
    /// address answered.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.global_error.is_none()
            && !self.probes.is_empty()
            && self.probes.iter().all(|p| p.success)
    }
}

/// The whole zone: one [`NameServerReport`] per name server, keyed by its name.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneReport {
    pub zone: String,
    /// How many name servers were checked.
    pub name_servers: usize,
    /// How many addresses were probed, over all name servers.
    pub addresses: usize,
    pub success: bool,
    pub servers: BTreeMap<String, NameServerReport>,
}

/// Presentation switches, taken from the run [`Config`][crate::config::Config].
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ReportOptions {
    pub quiet: bool,
    pub show_timings: bool,
    pub nsid: bool,
    pub json: bool,
    /// Only used to hint at a retry when no address was found.
    pub families: Families,
}

impl ZoneReport {
    #[must_use]
    pub fn new(zone: String, name_servers: usize) -> Self {
        ZoneReport {
            zone,
            name_servers,
            addresses: 0,
            success: true,
            servers: BTreeMap::new(),
        }
    }

    /// Append one probe outcome to its name server's report, creating the report if needed.
    pub fn record_probe(&mut self, outcome: SoaProbeOutcome) {
        let name = outcome.name.to_string();
        let probe = ProbeResult::from_outcome(outcome);
        if !probe.success {
            self.success = false;
        }
        self.servers
            .entry(name.clone())
            .or_insert_with(|| NameServerReport::new(name))
            .probes
            .push(probe);
    }

    /// The distinct serials of all successful probes.
    #[must_use]
    pub fn serials(&self) -> BTreeSet<u32> {
        self.servers
            .values()
            .flat_map(|server| server.probes.iter())
            .filter(|probe| probe.success)
            .map(|probe| probe.serial)
            .collect()
    }

    /// Print the outcome of the run: why nothing could be checked when no name server or no
    /// address was found, the JSON or text report otherwise.
    ///
    /// Returns the run's overall success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] or [`Error::InvalidJSON`] if writing fails.
    pub fn summarize(
        &self,
        out: &mut impl Write,
        err: &mut impl Write,
        options: ReportOptions,
    ) -> Result<bool, Error> {
        if self.name_servers == 0 {
            writeln!(
                err,
                "No NS records for \"{}\". It is probably a domain but not a zone",
                self.zone
            )?;
            return Ok(false);
        }
        if self.addresses == 0 {
            writeln!(out, "No IP addresses for name servers of {}", self.zone)?;
            match options.families {
                Families::V4Only => writeln!(out, "May be retry without -4?")?,
                Families::V6Only => writeln!(out, "May be retry without -6?")?,
                Families::Both => {}
            }
            return Ok(false);
        }
        if options.json {
            return self.render_json(out);
        }
        self.render(out, err, options)
    }

    /// Print the report, name servers sorted by name. Successful lines go to `out` unless
    /// quiet; failures always do, and global errors go to `err`.
    ///
    /// Returns the run's overall success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if writing fails.
    pub fn render(
        &self,
        out: &mut impl Write,
        err: &mut impl Write,
        options: ReportOptions,
    ) -> Result<bool, Error> {
        let mut success = self.success;
        for (name, server) in &self.servers {
            let server_ok = server.is_ok();
            if !options.quiet || !server_ok {
                writeln!(out, "{name}")?;
            }
            for probe in &server.probes {
                if options.quiet && probe.success {
                    continue;
                }
                let (code, mut msg) = if probe.success {
                    ("OK", probe.serial.to_string())
                } else {
                    ("ERROR", probe.message.clone())
                };
                if options.show_timings && !probe.rtt.is_zero() {
                    msg.push_str(&format!(" ({} ms)", probe.rtt.as_millis()));
                }
                if options.nsid && !probe.nsid.is_empty() {
                    msg.push_str(&format!(" (NSID {})", probe.nsid));
                }
                writeln!(out, "\t{}: {code}: {msg}", probe.address)?;
            }
            if let Some(global_error) = &server.global_error {
                writeln!(err, "\t{global_error}")?;
            }
            if server.probes.is_empty() {
                success = false;
            }
        }

        let serials = self.serials();
        if success && serials.len() > 1 {
            let listed: Vec<String> = serials.iter().map(ToString::to_string).collect();
            writeln!(err, "Serials differ: {}", listed.join(", "))?;
        }
        Ok(success)
    }

    /// Print the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if serialization or writing fails.
    pub fn render_json(&self, out: &mut impl Write) -> Result<bool, Error> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(self.success && self.servers.values().all(|s| !s.probes.is_empty()))
    }
}
