//! A tiny configurable DNS server, playing both the local resolver and the zone's name servers.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_proto::rr::rdata::SOA;
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::{LowerName, Name, RData, Record, RecordType};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use trust_dns_server::ServerFuture;

pub const SERIAL: u32 = 2_024_010_100;

fn lower(name: &str) -> LowerName {
    LowerName::from(Name::from_str(name).unwrap())
}

/// What the mock server knows and how it misbehaves.
#[derive(Clone, Debug)]
pub struct Fixture {
    zone: LowerName,
    serial: u32,
    authoritative: bool,
    soa_rcode: ResponseCode,
    alias: Option<Name>,
    addrs: HashMap<LowerName, Vec<IpAddr>>,
    ns_records: HashMap<LowerName, Vec<LowerName>>,
}

impl Fixture {
    pub fn new(zone: &str) -> Self {
        Fixture {
            zone: lower(zone),
            serial: SERIAL,
            authoritative: true,
            soa_rcode: ResponseCode::NoError,
            alias: None,
            addrs: HashMap::new(),
            ns_records: HashMap::new(),
        }
    }

    /// Delegate the zone to `ns`, reachable on `addrs`.
    pub fn name_server(mut self, ns: &str, addrs: &[&str]) -> Self {
        self.ns_records
            .entry(self.zone.clone())
            .or_default()
            .push(lower(ns));
        self.addrs.insert(
            lower(ns),
            addrs.iter().map(|a| a.parse().unwrap()).collect(),
        );
        self
    }

    pub fn soa_rcode(mut self, rcode: ResponseCode) -> Self {
        self.soa_rcode = rcode;
        self
    }

    pub fn not_authoritative(mut self) -> Self {
        self.authoritative = false;
        self
    }

    /// Answer SOA questions with a CNAME to `target`.
    pub fn alias(mut self, target: &str) -> Self {
        self.alias = Some(Name::from_str(target).unwrap());
        self
    }
}

#[derive(Clone)]
pub struct Handler {
    fixture: Arc<Fixture>,
}

impl Handler {
    fn new(fixture: Fixture) -> Self {
        Handler {
            fixture: Arc::new(fixture),
        }
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> std::io::Result<ResponseInfo> {
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.send_error(request, response, ResponseCode::NotImp).await;
        }

        match request.query().query_type() {
            RecordType::SOA => self.handle_request_soa(request, response).await,
            RecordType::A => self.handle_request_addr(request, response, false).await,
            RecordType::AAAA => self.handle_request_addr(request, response, true).await,
            RecordType::NS => self.handle_request_ns(request, response).await,
            _ => self.send_error(request, response, ResponseCode::NotImp).await,
        }
    }

    async fn handle_request_soa<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> std::io::Result<ResponseInfo> {
        let query_name = request.query().name();
        if *query_name != self.fixture.zone {
            return self
                .send_error(request, response_handle, ResponseCode::NXDomain)
                .await;
        }
        if self.fixture.soa_rcode != ResponseCode::NoError {
            return self
                .send_error(request, response_handle, self.fixture.soa_rcode)
                .await;
        }

        let rdata = match &self.fixture.alias {
            Some(target) => RData::CNAME(target.clone()),
            None => RData::SOA(SOA::new(
                Name::from_str("ns1.example.test.").unwrap(),
                Name::from_str("hostmaster.example.test.").unwrap(),
                self.fixture.serial,
                86_400,
                7_200,
                3_600_000,
                172_800,
            )),
        };
        self.send_resp(request, response_handle, vec![rdata]).await
    }

    async fn handle_request_addr<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
        v6: bool,
    ) -> std::io::Result<ResponseInfo> {
        let fqdn = request.query().name();
        match self.fixture.addrs.get(fqdn) {
            None => {
                self.send_error(request, response_handle, ResponseCode::NXDomain)
                    .await
            }
            Some(addrs) => {
                let rdata = addrs
                    .iter()
                    .filter_map(|ip| match (ip, v6) {
                        (IpAddr::V4(v4), false) => Some(RData::A(*v4)),
                        (IpAddr::V6(ip6), true) => Some(RData::AAAA(*ip6)),
                        _ => None,
                    })
                    .collect();
                self.send_resp(request, response_handle, rdata).await
            }
        }
    }

    async fn handle_request_ns<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> std::io::Result<ResponseInfo> {
        let fqdn = request.query().name();
        match self.fixture.ns_records.get(fqdn) {
            None => {
                self.send_error(request, response_handle, ResponseCode::NXDomain)
                    .await
            }
            Some(names) => {
                let rdata = names.iter().map(|n| RData::NS(n.into())).collect();
                self.send_resp(request, response_handle, rdata).await
            }
        }
    }

    async fn send_resp<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        rdata: Vec<RData>,
    ) -> std::io::Result<ResponseInfo> {
        let records: Vec<Record> = rdata
            .iter()
            .map(|rd| Record::from_rdata(request.query().name().into(), 300, rd.clone()))
            .collect();
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(self.fixture.authoritative);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, records.iter(), &[], &[], &[]);
        response_handle.send_response(response).await
    }

    async fn send_error<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        rcode: ResponseCode,
    ) -> std::io::Result<ResponseInfo> {
        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(self.fixture.authoritative);
        header.set_response_code(rcode);
        let response = builder.build_no_records(header);
        response_handle.send_response(response).await
    }
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(error) => {
                eprintln!("error in mock RequestHandler: {error:?}");
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}

/// Serve `fixture` over UDP and TCP on `addr` (port 0 picks a free port). Returns the bound
/// address.
pub async fn serve(addr: &str, fixture: Fixture) -> SocketAddr {
    let udp = UdpSocket::bind(addr).await.unwrap();
    let local = udp.local_addr().unwrap();
    let tcp = TcpListener::bind(local).await.unwrap();
    let mut server = ServerFuture::new(Handler::new(fixture));
    server.register_socket(udp);
    server.register_listener(tcp, Duration::from_secs(5));
    tokio::spawn(server.block_until_done());
    local
}
