//! Client builder and connection lifecycle.
//!
//! The [`ClientBuilder`] collects a [`ClientConfig`]; connecting then:
//! 1. Resolves the router address and dials it
//! 2. Reads the router's hello within the handshake timeout
//! 3. Spawns the writer task and the inbound dispatcher
//!
//! The resulting [`Client`] is a cheap handle; clones share one connection.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use bw2_client::Client;
//!
//! # async fn run() -> bw2_client::Result<()> {
//! let client = Client::builder()
//!     .address("127.0.0.1:28589")
//!     .handshake_timeout(Duration::from_secs(2))
//!     .connect()
//!     .await?;
//!
//! println!("router version {}", client.remote_version());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use crate::control::{read_hello, DEFAULT_HANDSHAKE_TIMEOUT};
use crate::error::Result;
use crate::mux::{spawn_dispatcher, SequenceRegistry, Transaction, DEFAULT_RESPONSE_CAPACITY};
use crate::protocol::{Frame, FrameBuffer, DEFAULT_MAX_BODY_SIZE};
use crate::transport::{dial, resolve_address};
use crate::writer::{spawn_writer_task, WriterHandle};

/// Default buffer of the caller-facing channel of streaming operations.
pub const DEFAULT_STREAM_CAPACITY: usize = 10;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host[:port]`; empty means the local router.
    pub address: String,
    pub handshake_timeout: Duration,
    /// Per-transaction inbound buffer.
    pub response_capacity: usize,
    /// Buffer between a streaming transaction and its caller.
    pub stream_capacity: usize,
    /// Largest header, routing object or payload object body accepted.
    pub max_frame_size: usize,
    /// Initial auto-chain override, see [`Client::override_auto_chain`].
    pub auto_chain: Option<bool>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            response_capacity: DEFAULT_RESPONSE_CAPACITY,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            max_frame_size: DEFAULT_MAX_BODY_SIZE,
            auto_chain: None,
        }
    }
}

/// Builder for configuring and connecting a client.
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router address. Missing port defaults to 28589, empty to the local router.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// How long to wait for the router's hello.
    ///
    /// Default: 5 seconds
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Default: 3
    pub fn response_capacity(mut self, capacity: usize) -> Self {
        self.config.response_capacity = capacity;
        self
    }

    /// Default: 10
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.config.stream_capacity = capacity;
        self
    }

    /// Default: 1 GiB
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Force the auto-chain flag on every request from the start.
    pub fn auto_chain(mut self, value: bool) -> Self {
        self.config.auto_chain = Some(value);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dial the router and complete the handshake.
    pub async fn connect(self) -> Result<Client> {
        let address = resolve_address(&self.config.address)?;
        let stream = dial(&address).await?;
        let (reader, writer) = stream.into_split();
        Client::start(reader, writer, self.config).await
    }

    /// Complete the handshake over an already-open stream.
    pub async fn connect_stream<S>(self, stream: S) -> Result<Client>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Client::start(reader, writer, self.config).await
    }
}

const AUTO_CHAIN_UNSET: u8 = 0;
const AUTO_CHAIN_OFF: u8 = 1;
const AUTO_CHAIN_ON: u8 = 2;

/// Client-wide auto-chain override, read once per request.
#[derive(Debug)]
struct AutoChainOverride(AtomicU8);

impl AutoChainOverride {
    fn new(value: Option<bool>) -> Self {
        let this = Self(AtomicU8::new(AUTO_CHAIN_UNSET));
        this.set(value);
        this
    }

    fn get(&self) -> Option<bool> {
        match self.0.load(Ordering::Acquire) {
            AUTO_CHAIN_OFF => Some(false),
            AUTO_CHAIN_ON => Some(true),
            _ => None,
        }
    }

    fn set(&self, value: Option<bool>) {
        let raw = match value {
            None => AUTO_CHAIN_UNSET,
            Some(false) => AUTO_CHAIN_OFF,
            Some(true) => AUTO_CHAIN_ON,
        };
        self.0.store(raw, Ordering::Release);
    }
}

/// A connection to a router.
///
/// Cloning is cheap; every clone multiplexes over the same socket. The
/// connection closes when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    remote_version: String,
    registry: Arc<SequenceRegistry>,
    writer: WriterHandle,
    auto_chain: AutoChainOverride,
    dispatcher: JoinHandle<()>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.dispatcher.abort();
        self.registry.close("client dropped");
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect to `address` with default settings.
    pub async fn connect(address: &str) -> Result<Self> {
        ClientBuilder::new().address(address).connect().await
    }

    async fn start<R, W>(mut reader: R, writer: W, config: ClientConfig) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        // On any handshake error both halves drop here, closing the socket.
        let mut buffer = FrameBuffer::with_max_body(config.max_frame_size);
        let remote_version = read_hello(&mut reader, &mut buffer, config.handshake_timeout).await?;
        tracing::info!("Connected to router version {}", remote_version);

        let registry = Arc::new(SequenceRegistry::new(config.response_capacity));

        let (writer, writer_task) = spawn_writer_task(writer);
        let supervised = registry.clone();
        tokio::spawn(async move {
            match writer_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => supervised.fail(format!("write failed: {}", e)),
                Err(e) => supervised.fail(format!("writer task failed: {}", e)),
            }
        });

        let dispatcher = spawn_dispatcher(reader, buffer, registry.clone());

        Ok(Client {
            inner: Arc::new(ClientInner {
                auto_chain: AutoChainOverride::new(config.auto_chain),
                config,
                remote_version,
                registry,
                writer,
                dispatcher,
            }),
        })
    }

    /// Protocol version the router announced in its hello.
    pub fn remote_version(&self) -> &str {
        &self.inner.remote_version
    }

    /// Allocate a sequence number for a hand-built request.
    pub fn next_seqno(&self) -> u32 {
        self.inner.registry.allocate()
    }

    /// Force the auto-chain flag on every subsequent request, whatever the
    /// caller's parameters say.
    pub fn override_auto_chain(&self, value: bool) {
        self.inner.auto_chain.set(Some(value));
    }

    pub fn clear_auto_chain_override(&self) {
        self.inner.auto_chain.set(None);
    }

    pub fn auto_chain_override(&self) -> Option<bool> {
        self.inner.auto_chain.get()
    }

    /// False once the connection has failed; new requests are refused.
    pub fn is_connected(&self) -> bool {
        self.inner.registry.is_alive()
    }

    /// Why the connection failed, if it has.
    pub fn failure(&self) -> Option<String> {
        self.inner.registry.failure()
    }

    /// Inbound frames discarded because no transaction owned their sequence number.
    pub fn dropped_frames(&self) -> u64 {
        self.inner.registry.dropped_frames()
    }

    /// Number of transactions currently registered.
    pub fn open_transactions(&self) -> usize {
        self.inner.registry.open_count()
    }

    /// Fail the connection locally: open transactions end with
    /// `ConnectionLost` and new requests are refused.
    pub fn close(&self) {
        self.inner.registry.close("closed by client");
        self.inner.dispatcher.abort();
    }

    /// Send a hand-built frame and stream back every reply under its
    /// sequence number until the router marks the exchange finished.
    ///
    /// `request.seqno` should come from [`next_seqno`](Self::next_seqno).
    pub async fn transact(&self, request: &Frame, capacity: usize) -> Result<Transaction> {
        Transaction::open(
            self.inner.registry.clone(),
            &self.inner.writer,
            request,
            capacity,
        )
        .await
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn effective_auto_chain(&self, requested: bool) -> bool {
        self.inner.auto_chain.get().unwrap_or(requested)
    }
}
