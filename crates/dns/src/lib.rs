//! Consul-style DNS resolver: SRV/A lookups over the service catalog.

mod name;
mod server;

pub use name::{compute_weights, parse, QueryKind};
pub use server::DnsServer;
