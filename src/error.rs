//! Error types for bw2-client.

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum Bw2Error {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The router address could not be parsed.
    #[error("Invalid router address: {0}")]
    InvalidAddress(String),

    /// The router did not greet us within the handshake window.
    #[error("Timeout on router hello")]
    HandshakeTimeout,

    /// The first frame from the router was not a valid hello.
    #[error("Bad router: {0}")]
    BadHandshake(String),

    /// Malformed bytes on the wire (undecodable frame).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The router refused the request. Displays the router's reason verbatim.
    #[error("{0}")]
    Router(String),

    /// The response did not have the shape the operation expects.
    #[error("bad response: {0}")]
    MalformedResponse(String),

    /// The transaction closed before any frame arrived.
    #[error("reply channel closed")]
    ChannelClosed,

    /// The connection to the router is gone.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The transaction's buffer filled up and it was closed so the rest of
    /// the connection keeps moving.
    #[error("transaction {0} closed: reader fell behind")]
    Overflow(u32),

    /// The requested combination is not supported by this client.
    #[error("Not supported: {0}")]
    Unsupported(&'static str),

    /// A fixed-length identifier decoded to the wrong number of bytes.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Identifier text is not valid URL-safe base64.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A streaming operation finished without producing any result.
    #[error("No result")]
    NoResult,
}

/// Result type alias using Bw2Error.
pub type Result<T> = std::result::Result<T, Bw2Error>;
