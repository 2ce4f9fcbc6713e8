//! Outbound requests.
//!
//! Every operation the client can issue is one variant here, and
//! [`Request::encode`] is the only place request headers are written.

use bytes::Bytes;

use super::params::{
    put_bool, put_expiry, CreateDotChainParams, CreateDotParams, CreateEntityParams, ListParams,
    PublishParams, QueryParams, SubscribeParams,
};
use crate::error::{Bw2Error, Result};
use crate::protocol::{po, Command, Frame, PayloadObject, RoutingObject};

#[derive(Debug)]
pub(crate) enum Request<'a> {
    CreateEntity(&'a CreateEntityParams),
    CreateDot(&'a CreateDotParams),
    CreateDotChain(&'a CreateDotChainParams),
    Publish {
        params: &'a PublishParams,
        auto_chain: bool,
    },
    Subscribe {
        params: &'a SubscribeParams,
        auto_chain: bool,
    },
    Query {
        params: &'a QueryParams,
        auto_chain: bool,
    },
    List {
        params: &'a ListParams,
        auto_chain: bool,
    },
    BuildChain {
        uri: &'a str,
        permissions: &'a str,
        to: &'a str,
    },
    SetEntity(Bytes),
}

impl Request<'_> {
    pub fn command(&self) -> Command {
        match self {
            Request::CreateEntity(_) => Command::MakeEntity,
            Request::CreateDot(_) => Command::MakeDot,
            Request::CreateDotChain(_) => Command::MakeChain,
            Request::Publish { params, .. } if params.persist => Command::Persist,
            Request::Publish { .. } => Command::Publish,
            Request::Subscribe { .. } => Command::Subscribe,
            Request::Query { .. } => Command::Query,
            Request::List { .. } => Command::List,
            Request::BuildChain { .. } => Command::BuildChain,
            Request::SetEntity(_) => Command::SetEntity,
        }
    }

    /// Refuse requests this client cannot express, before any I/O.
    pub fn check(&self) -> Result<()> {
        if let Request::CreateDot(params) = self {
            if params.is_permission {
                return Err(Bw2Error::Unsupported("permission DOTs"));
            }
        }
        Ok(())
    }

    /// Build the request frame under `seqno`.
    pub fn encode(&self, seqno: u32) -> Result<Frame> {
        self.check()?;
        let mut frame = Frame::new(self.command(), seqno);

        match self {
            Request::CreateEntity(p) => {
                put_expiry(&mut frame, p.expiry.as_ref(), p.expiry_delta);
                frame.add_header("contact", p.contact.as_str());
                frame.add_header("comment", p.comment.as_str());
                for revoker in &p.revokers {
                    frame.add_header("revoker", revoker.as_str());
                }
                if p.omit_creation_date {
                    frame.add_header("omitcreationdate", "true");
                }
            }
            Request::CreateDot(p) => {
                put_expiry(&mut frame, p.expiry.as_ref(), p.expiry_delta);
                frame.add_header("contact", p.contact.as_str());
                frame.add_header("comment", p.comment.as_str());
                for revoker in &p.revokers {
                    frame.add_header("revoker", revoker.as_str());
                }
                if p.omit_creation_date {
                    frame.add_header("omitcreationdate", "true");
                }
                frame.add_header("ttl", p.ttl.to_string());
                frame.add_header("to", p.to.as_str());
                put_bool(&mut frame, "ispermission", p.is_permission);
                frame.add_header("uri", p.uri.as_str());
                frame.add_header("accesspermissions", p.access_permissions.as_str());
            }
            Request::CreateDotChain(p) => {
                put_bool(&mut frame, "ispermission", p.is_permission);
                put_bool(&mut frame, "unelaborate", p.unelaborate);
                for dot in &p.dots {
                    frame.add_header("dot", dot.as_str());
                }
            }
            Request::Publish { params: p, auto_chain } => {
                put_access(
                    &mut frame,
                    *auto_chain,
                    &p.uri,
                    p.primary_access_chain.as_deref(),
                    &p.routing_objects,
                );
                put_expiry(&mut frame, p.expiry.as_ref(), p.expiry_delta);
                for po in &p.payload_objects {
                    frame.add_payload_object(po.clone());
                }
                frame.add_header("elaborate_pac", p.elaborate_pac.as_header());
                put_bool(&mut frame, "doverify", !p.do_not_verify);
                put_bool(&mut frame, "persist", p.persist);
            }
            Request::Subscribe { params: p, auto_chain } | Request::Query { params: p, auto_chain } => {
                put_access(
                    &mut frame,
                    *auto_chain,
                    &p.uri,
                    p.primary_access_chain.as_deref(),
                    &p.routing_objects,
                );
                put_expiry(&mut frame, p.expiry.as_ref(), p.expiry_delta);
                frame.add_header("elaborate_pac", p.elaborate_pac.as_header());
                if !p.leave_packed {
                    frame.add_header("unpack", "true");
                }
                put_bool(&mut frame, "doverify", !p.do_not_verify);
            }
            Request::List { params: p, auto_chain } => {
                put_access(
                    &mut frame,
                    *auto_chain,
                    &p.uri,
                    p.primary_access_chain.as_deref(),
                    &p.routing_objects,
                );
                put_expiry(&mut frame, p.expiry.as_ref(), p.expiry_delta);
                frame.add_header("elaborate_pac", p.elaborate_pac.as_header());
                put_bool(&mut frame, "doverify", !p.do_not_verify);
            }
            Request::BuildChain { uri, permissions, to } => {
                frame.add_header("uri", *uri);
                frame.add_header("to", *to);
                frame.add_header("accesspermissions", *permissions);
            }
            Request::SetEntity(key) => {
                frame.add_payload_object(PayloadObject::new(po::ENTITY_KEY, key.clone()));
            }
        }
        Ok(frame)
    }
}

/// Headers shared by every request that addresses a resource.
fn put_access(
    frame: &mut Frame,
    auto_chain: bool,
    uri: &str,
    primary_access_chain: Option<&str>,
    routing_objects: &[RoutingObject],
) {
    if auto_chain {
        frame.add_header("autochain", "true");
    }
    frame.add_header("uri", uri);
    if let Some(pac) = primary_access_chain.filter(|pac| !pac.is_empty()) {
        frame.add_header("primary_access_chain", pac);
    }
    for ro in routing_objects {
        frame.add_routing_object(ro.clone());
    }
}
