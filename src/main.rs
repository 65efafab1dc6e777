use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use regiondns::region::TagFormat;
use regiondns::resolver::ResolverConfig;
use regiondns::server::{self, ServerConfig};
use regiondns::transport::DNS_PORT;
use regiondns::transport::udp::MAX_UPSTREAM_TIMEOUT;

const MAX_TIMEOUT_MS: u64 = MAX_UPSTREAM_TIMEOUT.as_millis() as u64;
const MAX_STATS_INTERVAL_S: u64 = 86_400;

#[derive(Parser)]
#[command(name = "regiondns")]
#[command(about = "Iterative DNS resolver with cloud region tagging", long_about = None)]
struct Args {
    /// Root name server to start every resolution from
    #[arg(short, long)]
    root: Ipv4Addr,

    /// CSV file of CIDR,Region lines
    #[arg(short, long, value_name = "FILE")]
    ec2: PathBuf,

    /// Local port to listen on
    #[arg(short, long, default_value = "8053")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port upstream name servers listen on
    #[arg(long, default_value_t = DNS_PORT)]
    upstream_port: u16,

    /// Upstream response timeout in milliseconds (at most 600000)
    #[arg(long, default_value = "2000", value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_MS))]
    timeout_ms: u64,

    /// Content of the region text record
    #[arg(long, value_enum, default_value_t = TagFormat::RegionAndAddress)]
    tag_format: TagFormat,

    /// Maximum CNAME / name server lookup nesting per query
    #[arg(long, default_value = "8")]
    max_chain_depth: usize,

    /// Maximum referrals followed per resolution
    #[arg(long, default_value = "16")]
    max_referrals: usize,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(0..=MAX_STATS_INTERVAL_S))]
    stats_interval: u64,

    /// Enable verbose logging (per-query results and referral hops)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "regiondns=debug" } else { "regiondns=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.bind, args.port),
        root: args.root,
        upstream_port: args.upstream_port,
        upstream_timeout: Duration::from_millis(args.timeout_ms),
        region_file: args.ec2,
        tag_format: args.tag_format,
        resolver: ResolverConfig {
            max_referrals: args.max_referrals,
            max_chain_depth: args.max_chain_depth,
        },
        stats_interval: (args.stats_interval > 0).then(|| Duration::from_secs(args.stats_interval)),
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let local = tokio::task::LocalSet::new();
    local
        .block_on(&rt, server::run(config))
        .context("resolver service failed")
}
