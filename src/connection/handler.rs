//! Per-Connection State Machine
//!
//! Each accepted socket is driven by one handler task that cycles between
//! two phases:
//!
//! ```text
//! ┌──────────────────┐  complete frame   ┌──────────────────┐
//! │  reading request │ ────────────────> │ writing response │
//! │  (fill buffer)   │ <──────────────── │  (flush reply)   │
//! └──────────────────┘   fully flushed   └──────────────────┘
//!          │
//!          │ EOF / I/O error / protocol violation
//!          ▼
//!     terminated
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream: one read may deliver half a frame or several frames
//! at once. Incoming bytes accumulate in a `BytesMut`; after every fill
//! the buffer is scanned for as many complete frames as are present
//! (pipelining), and `split_to` leaves any partial next-frame bytes at
//! the front for the next round. A frame header that declares more than
//! the maximum message size is a protocol violation and terminates the
//! connection before anything is dispatched.
//!
//! ## Ordering
//!
//! Replies are flushed in full before the next frame from the same
//! connection is dispatched, so pipelined requests are answered strictly
//! in arrival order. Nothing is shared between handler tasks except the
//! storage dict behind the command handler.

use crate::commands::CommandHandler;
use crate::protocol::{parse_request, ParseError, Reply, HEADER_LEN, MAX_MESSAGE_SIZE};
use bytes::{Buf, Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Hard cap on buffered-but-unprocessed bytes. Complete frames are
/// drained before every fill, so crossing this means a bookkeeping bug
/// rather than a busy client.
const MAX_BUFFER_SIZE: usize = 16 * (HEADER_LEN + MAX_MESSAGE_SIZE);

/// Initial read buffer capacity.
const INITIAL_BUFFER_SIZE: usize = HEADER_LEN + MAX_MESSAGE_SIZE;

/// Statistics for connection handling.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests served
    pub requests_served: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_served(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that terminate a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request payload; closed without a reply
    #[error("bad request: {0}")]
    BadRequest(#[from] ParseError),

    /// Frame header declared a length above the message limit
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Peer closed the connection between requests
    #[error("client disconnected")]
    ClientDisconnected,

    /// Peer closed the connection mid-frame
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Buffered unprocessed bytes exceeded the invariant cap
    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// Handles a single client connection.
///
/// Owns the socket, the read buffer, and the frame bookkeeping for one
/// connected client; nothing else holds a reference to it.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Accumulates incoming bytes until complete frames can be extracted
    read_buf: BytesMut,

    /// The command handler (shared storage behind it)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            read_buf: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "client disconnected"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "closing connection"),
        }

        self.stats.connection_closed();
        result
    }

    /// The fill-dispatch-flush loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Serve every complete frame already buffered before asking
            // the socket for more (a client may pipeline several
            // requests into one segment).
            while let Some(payload) = self.try_extract_frame()? {
                // A parse failure is a protocol violation: the error
                // propagates and the connection closes with no reply.
                let args = parse_request(&payload)?;
                let reply = self.command_handler.execute(&args);
                self.stats.request_served();
                self.send_reply(&reply).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to extract one complete frame payload from the buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(payload))` — a full frame was present; its bytes are
    ///   consumed and any following bytes stay at the buffer front
    /// - `Ok(None)` — header or payload still incomplete
    /// - `Err(FrameTooLarge)` — the declared length breaks the protocol
    fn try_extract_frame(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        if self.read_buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let header: [u8; HEADER_LEN] = self.read_buf[..HEADER_LEN]
            .try_into()
            .expect("buffer holds at least HEADER_LEN bytes");
        let declared = u32::from_le_bytes(header) as usize;

        if declared > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::FrameTooLarge {
                size: declared,
                max: MAX_MESSAGE_SIZE,
            });
        }

        if self.read_buf.len() < HEADER_LEN + declared {
            trace!(
                client = %self.addr,
                buffered = self.read_buf.len(),
                declared = declared,
                "incomplete frame, need more data"
            );
            return Ok(None);
        }

        let mut frame = self.read_buf.split_to(HEADER_LEN + declared);
        frame.advance(HEADER_LEN);
        Ok(Some(frame.freeze()))
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.read_buf.len() >= MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        if self.read_buf.capacity() - self.read_buf.len() < HEADER_LEN + MAX_MESSAGE_SIZE {
            self.read_buf.reserve(HEADER_LEN + MAX_MESSAGE_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.read_buf).await?;

        if n == 0 {
            // Zero-length read is peer EOF. With buffered bytes it cut a
            // frame short; with an empty buffer it is a clean close.
            return if self.read_buf.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "read data");

        Ok(())
    }

    /// Frames and fully flushes one reply.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        // An oversized reply is replaced before any of its payload is
        // copied toward the socket; the substitution itself is not
        // connection-fatal.
        let substitute;
        let reply = if reply.encoded_len() > MAX_MESSAGE_SIZE {
            warn!(
                client = %self.addr,
                size = reply.encoded_len(),
                "reply exceeds message limit, substituting error"
            );
            substitute = Reply::response_too_large();
            &substitute
        } else {
            reply
        };

        let body = reply.encode();
        let mut framed = Vec::with_capacity(HEADER_LEN + body.len());
        framed.extend_from_slice(&(body.len() as u32).to_le_bytes());
        framed.extend_from_slice(&body);

        self.stream.write_all(&framed).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(framed.len());
        trace!(client = %self.addr, bytes = framed.len(), "sent reply");
        Ok(())
    }
}

/// Handles a client connection to completion.
///
/// Convenience wrapper used by the accept loop: constructs the handler,
/// runs it, and downgrades routine disconnects to quiet logs.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "connection ended with error");
            }
        }
    }
}
