//! Inbound reply classification.
//!
//! The first frame of every exchange is turned into a [`Reply`] before any
//! operation looks at it, so "the router refused" and "the router answered"
//! are decided in one place.

use crate::error::{Bw2Error, Result};
use crate::protocol::{Command, Frame, STATUS_OKAY};

#[derive(Debug)]
pub(crate) enum Reply {
    /// A status response reporting `okay`.
    Okay(Frame),
    /// The router refused; carries its reason.
    Refused(String),
    /// A result frame with data.
    Result(Frame),
}

impl Reply {
    pub fn classify(frame: Frame) -> Self {
        // A bare `resp` with no status is the router's error shape
        let refused = match frame.status() {
            Some(status) => status != STATUS_OKAY,
            None => frame.command == Command::Response,
        };
        if refused {
            return Reply::Refused(refusal_reason(&frame));
        }
        match frame.command {
            Command::Response => Reply::Okay(frame),
            _ => Reply::Result(frame),
        }
    }

    /// For operations that answer with a result frame.
    pub fn into_result(self) -> Result<Frame> {
        match self {
            Reply::Result(frame) => Ok(frame),
            Reply::Refused(reason) => Err(Bw2Error::Router(reason)),
            Reply::Okay(_) => Err(Bw2Error::MalformedResponse(
                "expected a result, got a bare status".to_string(),
            )),
        }
    }

    /// For operations that answer with `status=okay`.
    pub fn into_ack(self) -> Result<Frame> {
        match self {
            Reply::Okay(frame) => Ok(frame),
            Reply::Result(frame) if frame.is_okay() => Ok(frame),
            Reply::Result(_) => Err(Bw2Error::MalformedResponse(
                "missing status".to_string(),
            )),
            Reply::Refused(reason) => Err(Bw2Error::Router(reason)),
        }
    }
}

fn refusal_reason(frame: &Frame) -> String {
    if let Some(reason) = frame.reason() {
        return reason.to_string();
    }
    match frame.status() {
        Some(status) => format!("router returned status {}", status),
        None => "router returned an error".to_string(),
    }
}
