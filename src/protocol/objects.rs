//! Payload objects and routing objects carried by frames.
//!
//! Payload objects are schema-tagged opaque blobs. The schema number is a
//! 32-bit value usually written in dotted form (`2.0.0.0`), where a prefix
//! length selects a class (`2.0.0.0/8` is the MsgPack class).
//!
//! Routing objects are typed protocol objects (DOTs, chains, entities). The
//! client never interprets their cryptographic content; it only classifies
//! them by number.

use bytes::Bytes;

use crate::error::{Bw2Error, Result};

/// Well-known payload object numbers and classes.
pub mod po {
    /// Text class, `64.0.0.0/4`: human readable, must be UTF-8.
    pub const TEXT: u32 = 0x4000_0000;
    pub const TEXT_MASK: u8 = 4;
    /// MsgPack class, `2.0.0.0/8`.
    pub const MSGPACK: u32 = 0x0200_0000;
    pub const MSGPACK_MASK: u8 = 8;
    /// JSON class, `65.0.0.0/8`.
    pub const JSON: u32 = 0x4100_0000;
    pub const JSON_MASK: u8 = 8;
    /// Entity key file, `1.0.1.2`, submitted by set-entity.
    pub const ENTITY_KEY: u32 = 0x0100_0102;
}

/// Convert a dotted schema number (`a.b.c.d`) into its 32-bit value.
pub fn po_num_from_dot_form(dot_form: &str) -> Result<u32> {
    let mut value: u32 = 0;
    let mut count = 0;
    for part in dot_form.split('.') {
        let octet: u8 = part
            .parse()
            .map_err(|_| Bw2Error::Protocol(format!("Invalid dot form {:?}", dot_form)))?;
        value = (value << 8) | u32::from(octet);
        count += 1;
    }
    if count != 4 {
        return Err(Bw2Error::Protocol(format!("Invalid dot form {:?}", dot_form)));
    }
    Ok(value)
}

/// Render a 32-bit schema number in dotted form.
pub fn po_num_to_dot_form(po_num: u32) -> String {
    let [a, b, c, d] = po_num.to_be_bytes();
    format!("{}.{}.{}.{}", a, b, c, d)
}

/// A schema-tagged payload blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadObject {
    pub po_num: u32,
    pub content: Bytes,
}

impl PayloadObject {
    pub fn new(po_num: u32, content: impl Into<Bytes>) -> Self {
        Self {
            po_num,
            content: content.into(),
        }
    }

    /// Create a payload object from a dotted schema number.
    ///
    /// # Example
    ///
    /// ```
    /// use bw2_client::protocol::PayloadObject;
    ///
    /// let po = PayloadObject::from_dot_form("64.0.1.0", "hi").unwrap();
    /// assert_eq!(po.po_num, 0x4000_0100);
    /// assert_eq!(po.dot_form(), "64.0.1.0");
    /// ```
    pub fn from_dot_form(dot_form: &str, content: impl Into<Bytes>) -> Result<Self> {
        Ok(Self::new(po_num_from_dot_form(dot_form)?, content))
    }

    /// Plain UTF-8 text in the generic text schema.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(po::TEXT, Bytes::from(text.into()))
    }

    pub fn dot_form(&self) -> String {
        po_num_to_dot_form(self.po_num)
    }

    /// Whether this object's schema falls under `class/mask`.
    pub fn is_in_class(&self, class: u32, mask: u8) -> bool {
        if mask == 0 {
            return true;
        }
        let shift = 32 - u32::from(mask.min(32));
        (self.po_num >> shift) == (class >> shift)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Routing object numbers used by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingObjectKind {
    OriginVk,
    AccessChain,
    AccessChainHash,
    PermissionChain,
    PermissionChainHash,
    AccessDot,
    PermissionDot,
    Entity,
    EntityWithKey,
    Expiry,
    Revocation,
    Unknown(u8),
}

impl RoutingObjectKind {
    pub fn from_num(ro_num: u8) -> Self {
        match ro_num {
            0x00 => RoutingObjectKind::OriginVk,
            0x01 => RoutingObjectKind::AccessChain,
            0x02 => RoutingObjectKind::AccessChainHash,
            0x11 => RoutingObjectKind::PermissionChain,
            0x12 => RoutingObjectKind::PermissionChainHash,
            0x20 => RoutingObjectKind::AccessDot,
            0x21 => RoutingObjectKind::PermissionDot,
            0x30 => RoutingObjectKind::Entity,
            0x32 => RoutingObjectKind::EntityWithKey,
            0x40 => RoutingObjectKind::Expiry,
            0x50 => RoutingObjectKind::Revocation,
            other => RoutingObjectKind::Unknown(other),
        }
    }

    pub fn num(self) -> u8 {
        match self {
            RoutingObjectKind::OriginVk => 0x00,
            RoutingObjectKind::AccessChain => 0x01,
            RoutingObjectKind::AccessChainHash => 0x02,
            RoutingObjectKind::PermissionChain => 0x11,
            RoutingObjectKind::PermissionChainHash => 0x12,
            RoutingObjectKind::AccessDot => 0x20,
            RoutingObjectKind::PermissionDot => 0x21,
            RoutingObjectKind::Entity => 0x30,
            RoutingObjectKind::EntityWithKey => 0x32,
            RoutingObjectKind::Expiry => 0x40,
            RoutingObjectKind::Revocation => 0x50,
            RoutingObjectKind::Unknown(n) => n,
        }
    }

    pub fn is_dot(self) -> bool {
        matches!(
            self,
            RoutingObjectKind::AccessDot | RoutingObjectKind::PermissionDot
        )
    }

    pub fn is_chain(self) -> bool {
        matches!(
            self,
            RoutingObjectKind::AccessChain | RoutingObjectKind::PermissionChain
        )
    }
}

/// A typed protocol object carried alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingObject {
    pub ro_num: u8,
    pub content: Bytes,
}

impl RoutingObject {
    pub fn new(ro_num: u8, content: impl Into<Bytes>) -> Self {
        Self {
            ro_num,
            content: content.into(),
        }
    }

    pub fn kind(&self) -> RoutingObjectKind {
        RoutingObjectKind::from_num(self.ro_num)
    }
}

/// A delegation-of-trust object returned by DOT creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dot(RoutingObject);

impl Dot {
    pub fn is_permission(&self) -> bool {
        self.0.kind() == RoutingObjectKind::PermissionDot
    }

    pub fn content(&self) -> &Bytes {
        &self.0.content
    }

    /// Back to a routing object, e.g. to attach it to a publish.
    pub fn into_routing_object(self) -> RoutingObject {
        self.0
    }
}

impl TryFrom<RoutingObject> for Dot {
    type Error = Bw2Error;

    fn try_from(ro: RoutingObject) -> Result<Self> {
        if !ro.kind().is_dot() {
            return Err(Bw2Error::MalformedResponse(format!(
                "expected a DOT, got routing object {:#04x}",
                ro.ro_num
            )));
        }
        Ok(Dot(ro))
    }
}

/// A composed DOT chain returned by chain creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotChain(RoutingObject);

impl DotChain {
    pub fn is_permission(&self) -> bool {
        self.0.kind() == RoutingObjectKind::PermissionChain
    }

    pub fn content(&self) -> &Bytes {
        &self.0.content
    }

    pub fn into_routing_object(self) -> RoutingObject {
        self.0
    }
}

impl TryFrom<RoutingObject> for DotChain {
    type Error = Bw2Error;

    fn try_from(ro: RoutingObject) -> Result<Self> {
        if !ro.kind().is_chain() {
            return Err(Bw2Error::MalformedResponse(format!(
                "expected a DOT chain, got routing object {:#04x}",
                ro.ro_num
            )));
        }
        Ok(DotChain(ro))
    }
}
