//! Iterative resolution starting from a root server
//!
//! Each client question is resolved by repeatedly querying upstream servers:
//! referrals (NS records in the authority section with a matching A record
//! in the additional section) move the query to the next server, and a CNAME
//! answer restarts the lookup for the alias target from the root. The final
//! reply carries the client's original question and id, the CNAME chain
//! ahead of the answers, and a TXT record naming the zone of every A answer
//! the zone table knows about.

use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::{debug, trace};
use rand::{thread_rng, Rng};
use thiserror::Error;

use crate::dns_parser::{
    self, Builder, Class, Header, Opcode, Packet, Question, RRData, ResourceRecord, ResponseCode,
    Type,
};
use crate::upstream::Upstream;
use crate::zones::ZoneTable;
use crate::DNS_PORT;

/// TTL of the zone TXT records added to A answers
pub const ZONE_TXT_TTL: u32 = 3600;
pub const DEFAULT_MAX_REFERRALS: usize = 32;
pub const DEFAULT_MAX_CNAME_CHAIN: usize = 8;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed DNS message: {0}")]
    Format(#[from] dns_parser::Error),
    #[error("upstream exchange failed: {0}")]
    Network(#[from] io::Error),
    #[error("request has no question")]
    MissingQuestion,
    #[error("gave up after {0} referrals")]
    TooManyReferrals(usize),
    #[error("CNAME chain is longer than {0} records")]
    CNameChainTooLong(usize),
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Server every lookup (and every CNAME restart) begins with
    pub root: SocketAddr,
    /// Port used for servers found through referrals; see
    /// [`ResolverConfig::with_upstream_port`] to move the root as well
    pub upstream_port: u16,
    pub max_referrals: usize,
    pub max_cname_chain: usize,
}

impl ResolverConfig {
    pub fn new(root: IpAddr) -> ResolverConfig {
        ResolverConfig {
            root: SocketAddr::new(root, DNS_PORT),
            upstream_port: DNS_PORT,
            max_referrals: DEFAULT_MAX_REFERRALS,
            max_cname_chain: DEFAULT_MAX_CNAME_CHAIN,
        }
    }

    /// Sends every upstream query, the root's included, to `port`
    pub fn with_upstream_port(mut self, port: u16) -> ResolverConfig {
        self.root.set_port(port);
        self.upstream_port = port;
        self
    }
}

pub struct Resolver<U> {
    upstream: U,
    zones: ZoneTable,
    config: ResolverConfig,
}

/// What to do after an upstream reply was examined
enum Next {
    Referral(SocketAddr),
    CName(Question<'static>),
    Done(Packet<'static>),
}

/// Everything remembered while resolving one client question
struct ResolutionState {
    id: u16,
    recursion_desired: bool,
    questions: Vec<Question<'static>>,
    question: Question<'static>,
    cnames: Vec<ResourceRecord<'static>>,
    last_nameservers: Vec<ResourceRecord<'static>>,
    last_additional: Vec<ResourceRecord<'static>>,
    referrals: usize,
}

impl ResolutionState {
    fn new(request: &Packet) -> Result<ResolutionState, Error> {
        let question = request
            .questions
            .first()
            .ok_or(Error::MissingQuestion)?
            .clone()
            .into_owned();
        Ok(ResolutionState {
            id: request.header.id,
            recursion_desired: request.header.recursion_desired,
            questions: request
                .questions
                .iter()
                .cloned()
                .map(Question::into_owned)
                .collect(),
            question: question,
            cnames: Vec::new(),
            last_nameservers: Vec::new(),
            last_additional: Vec::new(),
            referrals: 0,
        })
    }

    /// Keeps the sections a later empty reply falls back to
    fn remember(&mut self, response: &Packet<'static>) {
        if response.nameservers.iter().any(|rr| is_useful(rr.typ())) {
            self.last_nameservers = response.nameservers.clone();
        }
        if !response.additional.is_empty() {
            self.last_additional = response.additional.clone();
        }
    }

    fn reply(
        &mut self,
        answers: Vec<ResourceRecord<'static>>,
        mut nameservers: Vec<ResourceRecord<'static>>,
        mut additional: Vec<ResourceRecord<'static>>,
    ) -> Packet<'static> {
        let mut chain = mem::take(&mut self.cnames);
        chain.extend(answers);
        if nameservers.is_empty() {
            nameservers = mem::take(&mut self.last_nameservers);
        }
        if additional.is_empty() {
            additional = mem::take(&mut self.last_additional);
        }
        Packet {
            header: Header {
                id: self.id,
                query: false,
                opcode: Opcode::StandardQuery,
                authoritative: false,
                truncated: false,
                recursion_desired: self.recursion_desired,
                recursion_available: true,
                authenticated_data: false,
                checking_disabled: false,
                response_code: ResponseCode::NoError,
                questions: 0,
                answers: 0,
                nameservers: 0,
                additional: 0,
            },
            questions: mem::take(&mut self.questions),
            answers: chain,
            nameservers: nameservers,
            additional: additional,
        }
    }
}

fn is_useful(typ: Type) -> bool {
    matches!(typ, Type::A | Type::AAAA | Type::NS | Type::CNAME)
}

fn useful_records(records: Vec<ResourceRecord<'static>>) -> Vec<ResourceRecord<'static>> {
    records
        .into_iter()
        .filter(|rr| is_useful(rr.typ()))
        .collect()
}

/// Address of the first delegated name server that has glue
fn referral_target(response: &Packet) -> Option<Ipv4Addr> {
    response
        .nameservers
        .iter()
        .filter_map(|rr| match rr.data {
            RRData::NS(ref ns) => Some(ns),
            _ => None,
        })
        .find_map(|ns| {
            response.additional.iter().find_map(|rr| match rr.data {
                RRData::A(ip) if rr.name == *ns => Some(ip),
                _ => None,
            })
        })
}

fn new_query(question: &Question) -> Result<Vec<u8>, Error> {
    let id = thread_rng().gen::<u16>();
    Ok(Builder::new_query(id, true).add_question(question)?.build())
}

impl<U: Upstream> Resolver<U> {
    pub fn new(upstream: U, zones: ZoneTable, config: ResolverConfig) -> Resolver<U> {
        Resolver {
            upstream: upstream,
            zones: zones,
            config: config,
        }
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    /// Resolves the first question of `request` iteratively
    pub async fn resolve(&mut self, request: &Packet<'_>) -> Result<Packet<'static>, Error> {
        let mut state = ResolutionState::new(request)?;
        let mut query = new_query(&state.question)?;
        let mut server = self.config.root;

        loop {
            let bytes = self.upstream.exchange(&query, server).await?;
            let response = Packet::parse(&bytes)?.into_owned();
            trace!(
                "{} answers, {} authority, {} additional from {}",
                response.answers.len(),
                response.nameservers.len(),
                response.additional.len(),
                server
            );

            match self.next_step(&mut state, response) {
                Next::Referral(next) => {
                    state.referrals += 1;
                    if state.referrals > self.config.max_referrals {
                        return Err(Error::TooManyReferrals(self.config.max_referrals));
                    }
                    debug!("referred from {} to {}", server, next);
                    server = next;
                }
                Next::CName(question) => {
                    if state.cnames.len() > self.config.max_cname_chain {
                        return Err(Error::CNameChainTooLong(self.config.max_cname_chain));
                    }
                    debug!("following CNAME to {}", question.qname);
                    query = new_query(&question)?;
                    server = self.config.root;
                }
                Next::Done(reply) => {
                    debug!(
                        "resolved {} {} with {} answers",
                        state.question.qtype,
                        state.question.qname,
                        reply.answers.len()
                    );
                    return Ok(reply);
                }
            }
        }
    }

    /// Sends the client's packet to the root server once and returns the
    /// reply as is
    pub async fn forward(&mut self, raw: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.upstream.exchange(raw, self.config.root).await?)
    }

    fn next_step(&self, state: &mut ResolutionState, response: Packet<'static>) -> Next {
        state.remember(&response);

        if response.answers.is_empty() {
            if let Some(ip) = referral_target(&response) {
                return Next::Referral(SocketAddr::new(ip.into(), self.config.upstream_port));
            }
            debug!("no referral to follow for {}", state.question.qname);
            return Next::Done(state.reply(
                response.answers,
                useful_records(response.nameservers),
                useful_records(response.additional),
            ));
        }

        if let RRData::CNAME(ref target) = response.answers[0].data {
            let question = Question {
                qname: target.clone(),
                qtype: state.question.qtype,
                qclass: state.question.qclass,
            };
            state.cnames.push(response.answers[0].clone());
            return Next::CName(question);
        }

        let mut answers = response.answers;
        if state.question.qtype == Type::A {
            let zone_records = self.zone_records(&answers);
            answers.extend(zone_records);
        }
        Next::Done(state.reply(answers, response.nameservers, response.additional))
    }

    fn zone_records(&self, answers: &[ResourceRecord<'static>]) -> Vec<ResourceRecord<'static>> {
        answers
            .iter()
            .filter_map(|rr| match rr.data {
                RRData::A(ip) => self.zones.lookup(IpAddr::V4(ip)).map(|zone| ResourceRecord {
                    name: rr.name.clone(),
                    cls: Class::IN,
                    ttl: ZONE_TXT_TTL,
                    data: RRData::txt(&format!("{}-{}", zone, ip)),
                }),
                _ => None,
            })
            .collect()
    }
}
