//! UDP transport for the resolver.
//!
//! The client-facing socket receives queries and sends answers; a separate
//! upstream socket carries the resolver's own queries to name servers.

pub mod udp;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Port name servers listen on.
pub const DNS_PORT: u16 = 53;
