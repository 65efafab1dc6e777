//! regiondns - An iterative DNS resolver that tags answers with cloud regions.
//!
//! The library exposes the codec, resolver and transport for the binary,
//! benchmarks and tests.

pub mod dns;
pub mod region;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod transport;
