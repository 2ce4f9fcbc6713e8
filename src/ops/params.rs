//! Per-operation parameters.
//!
//! Every struct implements `Default`, so callers set only what they need:
//!
//! ```
//! use bw2_client::ops::{ElaborateLevel, PublishParams};
//! use bw2_client::protocol::PayloadObject;
//!
//! let params = PublishParams {
//!     uri: "scratch.ns/demo/status".into(),
//!     auto_chain: true,
//!     payload_objects: vec![PayloadObject::text("online")],
//!     elaborate_pac: ElaborateLevel::Partial,
//!     ..Default::default()
//! };
//! assert!(!params.persist);
//! ```

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::protocol::{Frame, PayloadObject, RoutingObject};

/// How much of the primary access chain the router should elaborate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElaborateLevel {
    /// Let the client pick; sent as `full`.
    #[default]
    Default,
    Full,
    Partial,
    None,
}

impl ElaborateLevel {
    pub fn as_header(self) -> &'static str {
        match self {
            ElaborateLevel::Default | ElaborateLevel::Full => "full",
            ElaborateLevel::Partial => "partial",
            ElaborateLevel::None => "none",
        }
    }
}

/// Parameters for [`Client::create_entity`](crate::Client::create_entity).
#[derive(Debug, Clone, Default)]
pub struct CreateEntityParams {
    pub expiry: Option<DateTime<Utc>>,
    pub expiry_delta: Option<Duration>,
    pub contact: String,
    pub comment: String,
    pub revokers: Vec<String>,
    pub omit_creation_date: bool,
}

/// Parameters for [`Client::create_dot`](crate::Client::create_dot).
#[derive(Debug, Clone, Default)]
pub struct CreateDotParams {
    pub expiry: Option<DateTime<Utc>>,
    pub expiry_delta: Option<Duration>,
    pub contact: String,
    pub comment: String,
    pub revokers: Vec<String>,
    pub omit_creation_date: bool,
    pub ttl: u8,
    /// Verifying key (or alias) of the grantee.
    pub to: String,
    /// Permission DOTs cannot be created by this client.
    pub is_permission: bool,
    pub uri: String,
    pub access_permissions: String,
}

/// Parameters for [`Client::create_dot_chain`](crate::Client::create_dot_chain).
#[derive(Debug, Clone, Default)]
pub struct CreateDotChainParams {
    /// DOT hashes in chain order.
    pub dots: Vec<String>,
    pub is_permission: bool,
    pub unelaborate: bool,
}

/// Parameters for [`Client::publish`](crate::Client::publish).
#[derive(Debug, Clone, Default)]
pub struct PublishParams {
    pub uri: String,
    pub primary_access_chain: Option<String>,
    /// Ask the router to find a chain; subject to the client-wide override.
    pub auto_chain: bool,
    pub routing_objects: Vec<RoutingObject>,
    pub payload_objects: Vec<PayloadObject>,
    pub expiry: Option<DateTime<Utc>>,
    pub expiry_delta: Option<Duration>,
    pub elaborate_pac: ElaborateLevel,
    pub do_not_verify: bool,
    /// Persist the message on the router (sent as `pers` instead of `publ`).
    pub persist: bool,
}

/// Parameters for [`Client::subscribe`](crate::Client::subscribe) and
/// [`Client::query`](crate::Client::query).
#[derive(Debug, Clone, Default)]
pub struct SubscribeParams {
    pub uri: String,
    pub primary_access_chain: Option<String>,
    pub auto_chain: bool,
    pub routing_objects: Vec<RoutingObject>,
    pub expiry: Option<DateTime<Utc>>,
    pub expiry_delta: Option<Duration>,
    pub elaborate_pac: ElaborateLevel,
    pub do_not_verify: bool,
    /// Deliver payload objects as raw blobs instead of unpacked.
    pub leave_packed: bool,
}

/// Queries take exactly the subscription parameters.
pub type QueryParams = SubscribeParams;

/// Parameters for [`Client::list`](crate::Client::list).
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub uri: String,
    pub primary_access_chain: Option<String>,
    pub auto_chain: bool,
    pub routing_objects: Vec<RoutingObject>,
    pub expiry: Option<DateTime<Utc>>,
    pub expiry_delta: Option<Duration>,
    pub elaborate_pac: ElaborateLevel,
    pub do_not_verify: bool,
}

pub(crate) fn put_expiry(frame: &mut Frame, expiry: Option<&DateTime<Utc>>, delta: Option<Duration>) {
    if let Some(at) = expiry {
        frame.add_header("expiry", at.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    if let Some(delta) = delta {
        frame.add_header("expirydelta", format_duration(delta));
    }
}

pub(crate) fn put_bool(frame: &mut Frame, key: &str, value: bool) {
    frame.add_header(key, if value { "true" } else { "false" });
}

/// Render a duration the way the router parses it: `1h2m3.5s`, `250ms`,
/// `1.5µs`, `0s`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", fraction(nanos, 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", fraction(nanos, 1_000_000, 6));
    }

    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    let sub = u128::from(seconds) * 1_000_000_000 + u128::from(d.subsec_nanos());
    let _ = write!(out, "{}s", fraction(sub, 1_000_000_000, 9));
    out
}

/// `value / unit` with trailing zeros of the fraction trimmed.
fn fraction(value: u128, unit: u128, digits: usize) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", rem, width = digits);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
