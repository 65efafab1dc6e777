//! Iterative DNS resolution.
//!
//! Starting from the root server, the resolver follows NS referrals until a
//! server answers, then chases CNAMEs for address questions:
//!
//! 1. Query the root with a fresh id
//! 2. Answers present: accept them, chasing unresolved CNAME targets
//! 3. No answers but NS authority: query the delegated servers (glue first)
//! 4. Error rcode or nothing left to follow: stop with what we have
//!
//! Transports implement [`Exchange`], the resolver only decides where to send
//! the next query.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::dns::{Message, Name, Question, RecordType, ResourceRecord, ResponseCode, WireError};

/// Errors that abort a resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("malformed upstream response: {0}")]
    Format(#[from] WireError),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("no response from {server} before the deadline")]
    Timeout { server: SocketAddr },
}

/// One request/response round trip with an upstream name server.
pub trait Exchange {
    fn exchange(
        &self,
        query: &Message,
        server: Ipv4Addr,
    ) -> impl Future<Output = Result<Message, ResolveError>>;
}

/// Limits on how far a single client query may wander.
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    /// Referral hops followed by one resolution before giving up.
    pub max_referrals: usize,
    /// Nesting depth for CNAME chasing and name server address lookups.
    pub max_chain_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_referrals: 16,
            max_chain_depth: 8,
        }
    }
}

/// State of one `resolve` call.
struct Resolution {
    question: Question,
    server: Ipv4Addr,
    answers: Vec<ResourceRecord>,
    authorities: Vec<ResourceRecord>,
    additionals: Vec<ResourceRecord>,
}

impl Resolution {
    fn new(question: Question, server: Ipv4Addr) -> Self {
        Self {
            question,
            server,
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    /// Take the authority and additional sections of a referral.
    fn observe(&mut self, response: &Message) {
        self.authorities = response.authorities.clone();
        self.additionals = response.additionals.clone();
    }

    /// Build the final message on top of the last upstream response.
    fn finish(self, mut last: Message) -> Message {
        last.questions = vec![self.question];
        last.answers = self.answers;
        last.authorities = self.authorities;
        last.additionals = self.additionals;
        last
    }
}

/// Names already chased for one client query, and the current nesting depth.
///
/// Name server lookups are remembered with their outcome. A lookup still in
/// progress is recorded as `None`, so a referral naming it again gets nothing.
#[derive(Debug, Default)]
struct ChainTrail {
    visited: FxHashSet<String>,
    name_servers: FxHashMap<String, Option<Ipv4Addr>>,
    depth: usize,
}

impl ChainTrail {
    fn new(origin: &Name) -> Self {
        let mut trail = Self::default();
        trail.visit(origin);
        trail
    }

    /// Returns false if `name` was seen before.
    fn visit(&mut self, name: &Name) -> bool {
        self.visited.insert(name.to_key())
    }
}

/// Iterative resolver rooted at a single name server.
pub struct Resolver<E> {
    upstream: E,
    root: Ipv4Addr,
    config: ResolverConfig,
}

impl<E: Exchange> Resolver<E> {
    pub fn new(upstream: E, root: Ipv4Addr, config: ResolverConfig) -> Self {
        Self {
            upstream,
            root,
            config,
        }
    }

    pub fn root(&self) -> Ipv4Addr {
        self.root
    }

    /// Resolve `question` starting at the root server.
    ///
    /// With `recursion_desired` unset the root's first response is returned
    /// as is. Otherwise referrals are followed and, for A/AAAA questions,
    /// CNAME targets are resolved and appended to the answers.
    pub async fn resolve(
        &self,
        question: &Question,
        recursion_desired: bool,
    ) -> Result<Message, ResolveError> {
        let mut trail = ChainTrail::new(&question.name);
        self.resolve_nested(question.clone(), recursion_desired, &mut trail)
            .await
    }

    fn resolve_nested<'a>(
        &'a self,
        question: Question,
        recursion_desired: bool,
        trail: &'a mut ChainTrail,
    ) -> LocalBoxFuture<'a, Result<Message, ResolveError>> {
        async move {
            let query = Message::query(rand::random(), question.clone(), recursion_desired);
            let mut state = Resolution::new(question, self.root);

            let mut response = self.upstream.exchange(&query, state.server).await?;
            trace!(server = %state.server, rcode = ?response.header.rcode, "root response");
            if !recursion_desired {
                return Ok(response);
            }

            let mut referrals = 0;
            loop {
                if response.header.rcode != ResponseCode::NoError {
                    debug!(name = %state.question.name, rcode = ?response.header.rcode, "resolution ended with error");
                    break;
                }
                if !response.answers.is_empty() {
                    self.accept_answers(&mut state, &response, recursion_desired, trail)
                        .await?;
                    break;
                }
                if response.authorities.is_empty() {
                    debug!(name = %state.question.name, "referral chain exhausted");
                    break;
                }
                state.observe(&response);
                if referrals == self.config.max_referrals {
                    warn!(name = %state.question.name, referrals, "too many referrals");
                    break;
                }
                referrals += 1;

                match self.follow_referral(&query, &response, trail).await? {
                    Some((server, next)) => {
                        state.server = server;
                        response = next;
                    }
                    None => {
                        debug!(name = %state.question.name, "referral has no reachable name server");
                        break;
                    }
                }
            }

            Ok(state.finish(response))
        }
        .boxed_local()
    }

    /// Query the servers named by a referral.
    ///
    /// Every NS record with a usable address produces a query and each
    /// response replaces the previous one, so the last NS in authority order
    /// decides the next hop.
    async fn follow_referral(
        &self,
        query: &Message,
        referral: &Message,
        trail: &mut ChainTrail,
    ) -> Result<Option<(Ipv4Addr, Message)>, ResolveError> {
        let mut next = None;

        for target in referral.authorities.iter().filter_map(ResourceRecord::ns_target) {
            let glue: Vec<Ipv4Addr> = referral
                .additionals
                .iter()
                .filter(|record| record.name.eq_ignore_case(target))
                .filter_map(ResourceRecord::ipv4)
                .collect();

            if glue.is_empty() {
                let Some(server) = self.name_server_address(target, trail).await? else {
                    continue;
                };
                debug!(ns = %target, %server, "following referral");
                next = Some((server, self.upstream.exchange(query, server).await?));
            } else {
                for server in glue {
                    debug!(ns = %target, %server, "following referral via glue");
                    next = Some((server, self.upstream.exchange(query, server).await?));
                }
            }
        }

        Ok(next)
    }

    /// Resolve a name server without glue as an A question from the root.
    ///
    /// Each name is looked up at most once per client query.
    async fn name_server_address(
        &self,
        target: &Name,
        trail: &mut ChainTrail,
    ) -> Result<Option<Ipv4Addr>, ResolveError> {
        let key = target.to_key();
        if let Some(known) = trail.name_servers.get(&key) {
            if known.is_none() {
                warn!(ns = %target, "name server lookup already in progress or failed");
            }
            return Ok(*known);
        }
        if trail.depth >= self.config.max_chain_depth {
            warn!(ns = %target, depth = trail.depth, "name server lookup too deep");
            return Ok(None);
        }

        trail.name_servers.insert(key.clone(), None);
        trail.depth += 1;
        let resolved = self
            .resolve_nested(Question::new(target.clone(), RecordType::A), true, trail)
            .await;
        trail.depth -= 1;

        let address = resolved?.answers.iter().find_map(ResourceRecord::ipv4);
        trail.name_servers.insert(key, address);
        Ok(address)
    }

    /// Take an answer set, resolving CNAME targets it does not already cover.
    ///
    /// Each chained resolution appends its answers and replaces the
    /// authority and additional sections.
    async fn accept_answers(
        &self,
        state: &mut Resolution,
        response: &Message,
        recursion_desired: bool,
        trail: &mut ChainTrail,
    ) -> Result<(), ResolveError> {
        let chase = state.question.qtype.is_address();

        for record in &response.answers {
            state.answers.push(record.clone());

            let Some(target) = record.cname_target().filter(|_| chase) else {
                continue;
            };
            if response
                .answers
                .iter()
                .any(|other| other.name.eq_ignore_case(target))
            {
                continue;
            }
            if trail.depth >= self.config.max_chain_depth {
                warn!(alias = %record.name, %target, "CNAME chain too long, returning partial answer");
                continue;
            }
            if !trail.visit(target) {
                warn!(alias = %record.name, %target, "CNAME loop, returning partial answer");
                continue;
            }

            debug!(alias = %record.name, %target, "chasing CNAME");
            trail.depth += 1;
            let chained = self
                .resolve_nested(
                    Question::new(target.clone(), state.question.qtype),
                    recursion_desired,
                    trail,
                )
                .await;
            trail.depth -= 1;
            let chained = chained?;

            state.answers.extend(chained.answers);
            state.authorities = chained.authorities;
            state.additionals = chained.additionals;
        }

        Ok(())
    }
}
