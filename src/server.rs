//! Resolver service orchestration.
//!
//! Binds the sockets, loads the region table and answers client queries one
//! at a time: each datagram is resolved completely, including every upstream
//! round trip, before the next one is read.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dns::{Message, Question, RecordType, ResponseCode};
use crate::region::{RegionTable, TagFormat, annotate_answers};
use crate::resolver::{Exchange, ResolveError, Resolver, ResolverConfig};
use crate::stats::Stats;
use crate::transport::MAX_DNS_PACKET_SIZE;
use crate::transport::udp::{UdpTransport, UdpUpstream};

/// Configuration for the resolver service.
pub struct ServerConfig {
    /// Local address to answer clients on (e.g., 0.0.0.0:8053)
    pub bind_addr: SocketAddr,
    /// Root name server every resolution starts from
    pub root: Ipv4Addr,
    /// Port upstream name servers listen on
    pub upstream_port: u16,
    /// How long to wait for each upstream response
    pub upstream_timeout: Duration,
    /// CSV of `CIDR,Region` lines
    pub region_file: PathBuf,
    pub tag_format: TagFormat,
    pub resolver: ResolverConfig,
    /// Log counters at this interval, if set
    pub stats_interval: Option<Duration>,
}

/// Turns client datagrams into replies.
pub struct Dispatcher<E> {
    resolver: Resolver<E>,
    regions: Rc<RegionTable>,
    tag_format: TagFormat,
    stats: Rc<Stats>,
}

impl<E: Exchange> Dispatcher<E> {
    pub fn new(resolver: Resolver<E>, regions: Rc<RegionTable>, tag_format: TagFormat) -> Self {
        Self {
            resolver,
            regions,
            tag_format,
            stats: Rc::new(Stats::new()),
        }
    }

    pub fn stats(&self) -> Rc<Stats> {
        self.stats.clone()
    }

    /// Process one client datagram.
    ///
    /// Malformed datagrams, responses, non-standard opcodes and unsupported
    /// question types get no reply. Each supported question yields one reply;
    /// a failed resolution yields SERVFAIL.
    pub async fn dispatch(&self, datagram: &[u8]) -> Vec<Message> {
        let request = match Message::decode(datagram) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "dropping malformed query");
                self.stats.record_dropped();
                return Vec::new();
            }
        };
        if !request.is_standard_query() {
            debug!(id = request.header.id, opcode = ?request.header.opcode, "dropping non-query message");
            self.stats.record_dropped();
            return Vec::new();
        }

        let mut replies = Vec::with_capacity(request.questions.len());
        for question in &request.questions {
            if !is_supported(question.qtype) {
                debug!(name = %question.name, qtype = %question.qtype, "ignoring unsupported query type");
                self.stats.record_dropped();
                continue;
            }

            let start = Instant::now();
            match self.answer(&request, question).await {
                Ok((reply, tags)) => {
                    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                    debug!(
                        name = %question.name,
                        qtype = %question.qtype,
                        rcode = ?reply.header.rcode,
                        answers = reply.answers.len(),
                        tags,
                        total_ms = elapsed_ms,
                        "resolved"
                    );
                    self.stats.record_answered(elapsed_ms, tags);
                    replies.push(reply);
                }
                Err(e) => {
                    warn!(name = %question.name, qtype = %question.qtype, error = %e, "resolution failed");
                    self.stats
                        .record_failed(start.elapsed().as_secs_f64() * 1000.0);
                    replies.push(Message::error_reply(&request, ResponseCode::ServerFailure));
                }
            }
        }

        replies
    }

    async fn answer(
        &self,
        request: &Message,
        question: &Question,
    ) -> Result<(Message, usize), ResolveError> {
        let recursion_desired = request.header.recursion_desired;
        let mut reply = self.resolver.resolve(question, recursion_desired).await?;

        let tags = if recursion_desired && question.qtype.is_address() {
            annotate_answers(&self.regions, self.tag_format, &mut reply.answers)
        } else {
            0
        };

        reply.header.id = request.header.id;
        reply.questions = request.questions.clone();
        Ok((reply, tags))
    }
}

fn is_supported(qtype: RecordType) -> bool {
    matches!(
        qtype,
        RecordType::A | RecordType::Aaaa | RecordType::Cname | RecordType::Ns
    )
}

/// Answer client datagrams until the task is dropped.
///
/// Socket errors are logged and the loop keeps serving.
pub async fn serve<E: Exchange>(transport: &UdpTransport, dispatcher: &Dispatcher<E>) -> io::Result<()> {
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, client) = match transport.receive(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "UDP recv error");
                continue;
            }
        };

        for reply in dispatcher.dispatch(&buf[..len]).await {
            let bytes = match reply.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(%client, error = %e, "cannot encode reply");
                    continue;
                }
            };
            if let Err(e) = transport.send(&bytes, client).await {
                warn!(%client, error = %e, "UDP send error");
            }
        }
    }
}

/// Run the resolver service with the given configuration.
///
/// Fails only if the region file cannot be read or a socket cannot be
/// bound; afterwards it runs indefinitely. Must run inside a `LocalSet`.
pub async fn run(config: ServerConfig) -> io::Result<()> {
    let (regions, rejected) = RegionTable::load(&config.region_file)?;
    for err in &rejected {
        warn!(
            file = %config.region_file.display(),
            line = err.line,
            reason = %err.reason,
            "skipping malformed region entry"
        );
    }
    info!(entries = regions.len(), skipped = rejected.len(), "region table loaded");

    let transport = UdpTransport::bind(config.bind_addr).await?;
    let upstream = UdpUpstream::bind(config.upstream_port, config.upstream_timeout).await?;
    let resolver = Resolver::new(upstream, config.root, config.resolver);
    let dispatcher = Dispatcher::new(resolver, Rc::new(regions), config.tag_format);

    info!(
        listen = %transport.local_addr()?,
        root = %config.root,
        timeout_ms = config.upstream_timeout.as_millis() as u64,
        "resolver listening"
    );

    if let Some(interval) = config.stats_interval {
        spawn_stats_reporter(dispatcher.stats(), interval);
    }

    serve(&transport, &dispatcher).await
}

fn spawn_stats_reporter(stats: Rc<Stats>, every: Duration) {
    tokio::task::spawn_local(async move {
        let started = Instant::now();
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let snapshot = stats.snapshot_and_reset();
            info!(
                uptime_s = started.elapsed().as_secs(),
                requests = snapshot.requests,
                answered = snapshot.answered,
                failed = snapshot.failed,
                dropped = snapshot.dropped,
                tagged = snapshot.tagged,
                avg_response_ms = snapshot.avg_response_ms,
                "stats"
            );
        }
    });
}
