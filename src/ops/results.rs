//! Typed results projected from reply frames.

use crate::codec::validate_payload_object;
use crate::error::Bw2Error;
use crate::mux::ResponseStream;
use crate::protocol::{Frame, PayloadObject, RoutingObject};

/// A message delivered by a subscription or query.
#[derive(Debug)]
pub struct SimpleMessage {
    pub from: String,
    pub uri: String,
    pub routing_objects: Vec<RoutingObject>,
    pub payload_objects: Vec<PayloadObject>,
    /// Payload objects whose content did not match their schema class.
    /// The objects themselves are still present in `payload_objects`.
    pub payload_errors: Vec<PayloadObjectError>,
}

/// A payload object that failed validation.
#[derive(Debug)]
pub struct PayloadObjectError {
    /// Position in [`SimpleMessage::payload_objects`].
    pub index: usize,
    pub error: Bw2Error,
}

impl SimpleMessage {
    pub fn from_frame(frame: Frame) -> Self {
        let from = frame.first_header("from").unwrap_or_default().to_string();
        let uri = frame.first_header("uri").unwrap_or_default().to_string();
        let routing_objects = frame.routing_objects().to_vec();
        let payload_objects = frame.into_payload_objects();

        let payload_errors = payload_objects
            .iter()
            .enumerate()
            .filter_map(|(index, po)| {
                validate_payload_object(po)
                    .err()
                    .map(|error| PayloadObjectError { index, error })
            })
            .collect();

        SimpleMessage {
            from,
            uri,
            routing_objects,
            payload_objects,
            payload_errors,
        }
    }

    /// First payload object in `class/mask`, e.g. the first MsgPack object.
    pub fn payload_object_in(&self, class: u32, mask: u8) -> Option<&PayloadObject> {
        self.payload_objects
            .iter()
            .find(|po| po.is_in_class(class, mask))
    }
}

/// A chain the router found or built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleChain {
    pub hash: String,
    pub permissions: String,
    pub to: String,
    pub uri: String,
}

impl SimpleChain {
    pub fn from_frame(frame: Frame) -> Self {
        let header = |key: &str| frame.first_header(key).unwrap_or_default().to_string();
        SimpleChain {
            hash: header("hash"),
            permissions: header("permissions"),
            to: header("to"),
            uri: header("uri"),
        }
    }
}

pub(crate) fn child_name(frame: Frame) -> String {
    frame.first_header("child").unwrap_or_default().to_string()
}

/// Messages from a subscription or query.
pub type MessageStream = ResponseStream<SimpleMessage>;
/// Chains from a build-chain request.
pub type ChainStream = ResponseStream<SimpleChain>;
/// Child names from a list request.
pub type ListStream = ResponseStream<String>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MsgPackCodec;
    use crate::protocol::{po, Command};

    #[test]
    fn test_message_projection() {
        let mut frame = Frame::new(Command::Result, 3);
        frame.add_header("from", "alice");
        frame.add_header("uri", "a/b/c");
        frame.add_routing_object(RoutingObject::new(0x01, &b"chain"[..]));
        frame.add_payload_object(PayloadObject::text("hello"));
        frame.add_payload_object(MsgPackCodec::payload_object(&42u32).unwrap());

        let msg = SimpleMessage::from_frame(frame);
        assert_eq!(msg.from, "alice");
        assert_eq!(msg.uri, "a/b/c");
        assert_eq!(msg.routing_objects.len(), 1);
        assert_eq!(msg.payload_objects.len(), 2);
        assert!(msg.payload_errors.is_empty());
        assert!(msg.payload_object_in(po::MSGPACK, po::MSGPACK_MASK).is_some());
    }

    #[test]
    fn test_bad_payload_is_reported_not_fatal() {
        let mut frame = Frame::new(Command::Result, 3);
        frame.add_payload_object(PayloadObject::text("fine"));
        frame.add_payload_object(PayloadObject::new(po::MSGPACK, &b"\xc1"[..]));

        let msg = SimpleMessage::from_frame(frame);
        assert_eq!(msg.payload_objects.len(), 2);
        assert_eq!(msg.payload_errors.len(), 1);
        assert_eq!(msg.payload_errors[0].index, 1);
    }

    #[test]
    fn test_chain_projection() {
        let mut frame = Frame::new(Command::Result, 1);
        frame.add_header("hash", "h");
        frame.add_header("permissions", "PC");
        frame.add_header("to", "bob");
        frame.add_header("uri", "a/*");

        let chain = SimpleChain::from_frame(frame);
        assert_eq!(
            chain,
            SimpleChain {
                hash: "h".into(),
                permissions: "PC".into(),
                to: "bob".into(),
                uri: "a/*".into(),
            }
        );
    }

    #[test]
    fn test_child_name() {
        let mut frame = Frame::new(Command::Result, 1);
        frame.add_header("child", "a/b/sensor0");
        assert_eq!(child_name(frame), "a/b/sensor0");
        assert_eq!(child_name(Frame::new(Command::Result, 1)), "");
    }
}
