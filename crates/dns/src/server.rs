//! UDP/TCP DNS listener. Wire encode/decode goes through `hickory-proto`;
//! the socket loops and lifecycle are hand-rolled rather than built on
//! `hickory-server`'s request-handler trait, so the exact shape of the
//! listener stays under our control (the supervisor's idempotent
//! start/stop convention, in particular).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hickory_proto::op::{Header, Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, SRV};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use konsul_catalog::ServiceCatalog;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

use crate::name::{self, QueryKind};

pub struct DnsServer {
    catalog: Arc<ServiceCatalog>,
    domain: String,
    record_ttl: u32,
    running: Arc<AtomicBool>,
}

impl DnsServer {
    pub fn new(catalog: Arc<ServiceCatalog>, domain: impl Into<String>, record_ttl: u32) -> Self {
        Self {
            catalog,
            domain: domain.into(),
            record_ttl,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind both the UDP and TCP sockets and start serving. Idempotent:
    /// calling this while already running is a no-op. Either transport
    /// failing to bind aborts the whole start — a DNS resolver reachable
    /// over only one of the two isn't the resolver the spec describes.
    pub async fn start(&self, bind: SocketAddr) -> std::io::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let udp_socket = match UdpSocket::bind(bind).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let tcp_listener = match TcpListener::bind(bind).await {
            Ok(l) => l,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        tracing::info!(%bind, "DNS resolver listening (UDP+TCP)");

        let catalog = Arc::clone(&self.catalog);
        let domain = self.domain.clone();
        let ttl = self.record_ttl;
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while running.load(Ordering::SeqCst) {
                let (len, peer) = match udp_socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "DNS socket recv failed");
                        continue;
                    }
                };
                let response = handle_query(&buf[..len], &catalog, &domain, ttl).await;
                if let Some(bytes) = response {
                    if let Err(e) = udp_socket.send_to(&bytes, peer).await {
                        tracing::warn!(error = %e, %peer, "DNS socket send failed");
                    }
                }
            }
        });

        let catalog = Arc::clone(&self.catalog);
        let domain = self.domain.clone();
        let ttl = self.record_ttl;
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                let (stream, peer) = match tcp_listener.accept().await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "DNS TCP accept failed");
                        continue;
                    }
                };
                let catalog = Arc::clone(&catalog);
                let domain = domain.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_tcp_connection(stream, &catalog, &domain, ttl).await {
                        tracing::debug!(error = %e, %peer, "DNS TCP connection closed");
                    }
                });
            }
        });

        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// DNS-over-TCP framing: each message is prefixed with a 2-byte big-endian
/// length (RFC 1035 §4.2.2). A connection may carry several queries in
/// sequence; it ends when the peer closes it or sends a malformed length.
async fn serve_tcp_connection(
    mut stream: tokio::net::TcpStream,
    catalog: &ServiceCatalog,
    domain: &str,
    ttl: u32,
) -> std::io::Result<()> {
    loop {
        let mut len_buf = [0u8; 2];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
        let len = u16::from_be_bytes(len_buf) as usize;

        let mut msg_buf = vec![0u8; len];
        stream.read_exact(&mut msg_buf).await?;

        let Some(response) = handle_query(&msg_buf, catalog, domain, ttl).await else {
            return Ok(());
        };

        let response_len = (response.len() as u16).to_be_bytes();
        stream.write_all(&response_len).await?;
        stream.write_all(&response).await?;
    }
}

async fn handle_query(
    raw: &[u8],
    catalog: &ServiceCatalog,
    domain: &str,
    ttl: u32,
) -> Option<Vec<u8>> {
    let request = Message::from_bytes(raw).ok()?;
    let query = request.queries().first()?.clone();
    let query_name = query.name().to_utf8();

    let mut response = Message::new();
    let mut header = Header::response_from_request(request.header());
    header.set_message_type(MessageType::Response);

    let Some(kind) = name::parse(&query_name, domain) else {
        header.set_response_code(ResponseCode::NXDomain);
        response.set_header(header);
        return response.to_bytes().ok();
    };

    let (records, additional) = match kind {
        QueryKind::ServiceA(service) | QueryKind::NodeA(service) => {
            if query.query_type() != RecordType::A && query.query_type() != RecordType::ANY {
                header.set_response_code(ResponseCode::NXDomain);
                response.set_header(header);
                return response.to_bytes().ok();
            }
            (a_records(catalog, &service, &query_name, ttl).await, Vec::new())
        }
        QueryKind::Srv(service) => {
            if query.query_type() != RecordType::SRV && query.query_type() != RecordType::ANY {
                header.set_response_code(ResponseCode::NXDomain);
                response.set_header(header);
                return response.to_bytes().ok();
            }
            srv_records(catalog, &service, &query_name, domain, ttl).await
        }
    };

    if records.is_empty() {
        header.set_response_code(ResponseCode::NXDomain);
    } else {
        header.set_response_code(ResponseCode::NoError);
        header.set_answer_count(records.len() as u16);
        header.set_additional_count(additional.len() as u16);
    }
    header.set_op_code(OpCode::Query);
    response.set_header(header);
    response.add_query(query);
    for record in records {
        response.add_answer(record);
    }
    for record in additional {
        response.add_additional(record);
    }
    response.to_bytes().ok()
}

async fn a_records(
    catalog: &ServiceCatalog,
    service: &str,
    query_name: &str,
    ttl: u32,
) -> Vec<Record> {
    let Ok(Some(svc)) = catalog.get(service).await else {
        return Vec::new();
    };
    let Ok(addr) = svc.address.parse::<std::net::Ipv4Addr>() else {
        return Vec::new();
    };
    let Ok(name) = Name::from_utf8(query_name) else {
        return Vec::new();
    };
    vec![Record::from_rdata(name, ttl, RData::A(A(addr)))]
}

/// Builds the SRV answers plus one A record per target in the additional
/// section, so a resolver never needs a second round-trip to reach the
/// hosts a SRV answer names.
async fn srv_records(
    catalog: &ServiceCatalog,
    service: &str,
    query_name: &str,
    domain: &str,
    ttl: u32,
) -> (Vec<Record>, Vec<Record>) {
    let Ok(all) = catalog.list().await else {
        return (Vec::new(), Vec::new());
    };
    let matching: Vec<_> = all.into_iter().filter(|s| s.name == service).collect();
    if matching.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let Ok(query_name) = Name::from_utf8(query_name) else {
        return (Vec::new(), Vec::new());
    };

    let weights = name::compute_weights(matching.len());
    let mut answers = Vec::new();
    let mut additional = Vec::new();
    for (svc, weight) in matching.into_iter().zip(weights) {
        let Ok(target) = Name::from_utf8(format!("{}.node.{domain}.", svc.name)) else {
            continue;
        };
        answers.push(Record::from_rdata(
            query_name.clone(),
            ttl,
            RData::SRV(SRV::new(1, weight, svc.port, target.clone())),
        ));
        if let Ok(addr) = svc.address.parse::<std::net::Ipv4Addr>() {
            additional.push(Record::from_rdata(target, ttl, RData::A(A(addr))));
        }
    }
    (answers, additional)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::Query;
    use konsul_domain::model::Service;
    use konsul_storage::MemoryEngine;

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::new(Arc::new(MemoryEngine::new()), 30)
    }

    fn query_message(name: &str, qtype: RecordType) -> Vec<u8> {
        let mut msg = Message::new();
        msg.set_id(42);
        msg.set_message_type(MessageType::Query);
        msg.set_op_code(OpCode::Query);
        msg.add_query(Query::query(Name::from_utf8(name).unwrap(), qtype));
        msg.to_bytes().unwrap()
    }

    #[tokio::test]
    async fn unsupported_query_shape_returns_nxdomain() {
        let cat = catalog();
        let raw = query_message("web.consul.", RecordType::A);
        let response = handle_query(&raw, &cat, "consul", 5).await.unwrap();
        let msg = Message::from_bytes(&response).unwrap();
        assert_eq!(msg.response_code(), ResponseCode::NXDomain);
    }

    #[tokio::test]
    async fn a_query_for_registered_service_resolves() {
        let cat = catalog();
        cat.register(Service {
            name: "web".into(),
            address: "10.0.0.5".into(),
            port: 80,
        })
        .await
        .unwrap();

        let raw = query_message("web.service.consul.", RecordType::A);
        let response = handle_query(&raw, &cat, "consul", 5).await.unwrap();
        let msg = Message::from_bytes(&response).unwrap();
        assert_eq!(msg.response_code(), ResponseCode::NoError);
        assert_eq!(msg.answers().len(), 1);
    }

    #[tokio::test]
    async fn a_query_for_unknown_service_is_nxdomain() {
        let cat = catalog();
        let raw = query_message("ghost.service.consul.", RecordType::A);
        let response = handle_query(&raw, &cat, "consul", 5).await.unwrap();
        let msg = Message::from_bytes(&response).unwrap();
        assert_eq!(msg.response_code(), ResponseCode::NXDomain);
    }

    #[tokio::test]
    async fn srv_query_resolves_with_priority_one_and_additional_a_records() {
        let cat = catalog();
        for i in 1..=3 {
            cat.register(Service {
                name: "api".into(),
                address: format!("10.0.0.{i}"),
                port: 8080,
            })
            .await
            .unwrap();
        }

        let raw = query_message("_api._tcp.service.consul.", RecordType::SRV);
        let response = handle_query(&raw, &cat, "consul", 5).await.unwrap();
        let msg = Message::from_bytes(&response).unwrap();
        assert_eq!(msg.response_code(), ResponseCode::NoError);

        // The catalog keys service records by name — registering "api"
        // three times overwrites the same entry, so only one SRV answer
        // and one additional A record survive, both over the latest
        // registration.
        assert_eq!(msg.answers().len(), 1);
        assert_eq!(msg.additionals().len(), 1);
        let RData::SRV(srv) = msg.answers()[0].data() else {
            panic!("expected SRV rdata");
        };
        assert_eq!(srv.priority(), 1);
        assert_eq!(srv.port(), 8080);
    }

    #[tokio::test]
    async fn srv_query_for_unknown_service_is_nxdomain() {
        let cat = catalog();
        let raw = query_message("_ghost._tcp.service.consul.", RecordType::SRV);
        let response = handle_query(&raw, &cat, "consul", 5).await.unwrap();
        let msg = Message::from_bytes(&response).unwrap();
        assert_eq!(msg.response_code(), ResponseCode::NXDomain);
    }
}
