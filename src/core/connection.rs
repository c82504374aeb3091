use std::fmt;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

use crate::core::builder::ConnectionBuilder;
use crate::core::command::{Cmd, IntoArg};
use crate::core::pubsub::Subscriptions;
use crate::proto::codec::{ParseStatus, ReplyParser};
use crate::proto::reply::Reply;
use crate::Result;

const READ_CHUNK_SIZE: usize = 4096;
const NOT_CONNECTED: &str = "not connected";
const CANCELLED: &str = "previous command was cancelled before its reply arrived";
const SUBSCRIBED_MODE: &str = "only (P)(UN)SUBSCRIBE is allowed in subscribed mode";

/// A single connection to a RESP server.
///
/// Commands are written in full and answered in order, one reply per
/// command. Every method takes `&mut self`, so a connection is driven by
/// one task at a time; wrap it in a mutex to share it.
///
/// Transport failures never panic and never surface as `Err`: they are
/// reported as [`Reply::IOError`] and leave the connection disconnected.
/// There is no automatic reconnection.
///
/// Dropping a `send` future cancels the command. Since its reply may still
/// be on the wire, the next command then drops the transport and returns an
/// `IOError` instead of reading a reply that belongs to someone else.
pub struct Connection<S = TcpStream> {
    host: String,
    port: u16,
    connect_timeout: Duration,
    max_bulk_len: usize,
    stream: Option<S>,
    read_buf: BytesMut,
    /// Parser of the reply being read, kept across cancelled reads.
    parser: Option<ReplyParser>,
    /// Set while a request is written but its replies are not all read.
    in_flight: bool,
    subscriptions: Subscriptions,
}

impl Connection<TcpStream> {
    /// Creates an unconnected connection for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// the address cannot be parsed.
    pub fn new(address: &str) -> Result<Self> {
        ConnectionBuilder::new().address(address).build()
    }

    pub(crate) fn unconnected(
        host: String,
        port: u16,
        connect_timeout: Duration,
        max_bulk_len: usize,
    ) -> Self {
        Self {
            host,
            port,
            connect_timeout,
            max_bulk_len,
            stream: None,
            read_buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            parser: None,
            in_flight: false,
            subscriptions: Subscriptions::new(),
        }
    }

    /// Opens the TCP connection, replacing any previous one.
    ///
    /// Subscriptions belong to the old transport and are forgotten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the server cannot be
    /// reached within the connect timeout.
    #[instrument(skip(self), fields(host = %self.host, port = self.port), level = "debug")]
    pub async fn connect(&mut self) -> Result<()> {
        self.close().await;
        self.subscriptions = Subscriptions::new();

        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;

        self.stream = Some(stream);
        debug!("connected");
        Ok(())
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already established stream.
    pub fn from_stream(stream: S) -> Self {
        Self {
            host: String::new(),
            port: 0,
            connect_timeout: Duration::ZERO,
            max_bulk_len: ReplyParser::DEFAULT_MAX_BULK_LEN,
            stream: Some(stream),
            read_buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            parser: None,
            in_flight: false,
            subscriptions: Subscriptions::new(),
        }
    }

    /// Returns the configured host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the configured connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns true while a transport is open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns true once at least one subscription has been registered.
    pub fn in_subscribed_mode(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Returns the registered subscriptions.
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Closes the transport. Calling it again is a no-op.
    ///
    /// A task blocked in [`listen`](Connection::listen) on another handle to
    /// the same socket observes the close as an `IOError`.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "shutdown failed");
            }
            debug!("connection closed");
        }
        self.reset();
    }

    /// Sends a command and waits for its reply.
    ///
    /// An empty command returns [`Reply::Nil`] without any I/O. While in
    /// subscribed mode the receive loop owns the reply stream:
    /// (P)(UN)SUBSCRIBE commands are only written and return `Nil`, and any
    /// other command returns a `ProtocolError` without being written.
    #[instrument(skip(self), level = "debug")]
    pub async fn send(&mut self, cmd: Cmd) -> Reply {
        if cmd.is_empty() {
            return Reply::Nil;
        }
        let write_only = self.in_subscribed_mode();
        if write_only && !cmd.is_pubsub() {
            return Reply::ProtocolError(SUBSCRIBED_MODE.to_string());
        }

        if let Err(e) = self.begin_exchange() {
            return Reply::IOError(e.to_string());
        }
        let reply = match self.write_all(&cmd.to_bytes()).await {
            Err(e) => Reply::IOError(e.to_string()),
            Ok(()) if write_only => Reply::Nil,
            Ok(()) => self.read_reply().await,
        };
        self.end_exchange();
        reply
    }

    /// Sends a command given as a full argument vector.
    ///
    /// ```no_run
    /// # async fn run(conn: &mut resply::Connection) {
    /// let reply = conn.command(["SET", "greeting", "hello"]).await;
    /// assert!(reply.is_ok());
    /// # }
    /// ```
    pub async fn command<I>(&mut self, argv: I) -> Reply
    where
        I: IntoIterator,
        I::Item: IntoArg,
    {
        self.send(Cmd::from_args(argv)).await
    }

    pub(crate) fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    /// Marks the start of a request.
    ///
    /// If the previous request never finished, its future was dropped and
    /// the stream no longer lines up with the next reply: the transport is
    /// dropped and an error returned. Pair with [`end_exchange`](Self::end_exchange).
    pub(crate) fn begin_exchange(&mut self) -> io::Result<()> {
        if self.in_flight {
            warn!("previous command was cancelled, dropping connection");
            self.stream = None;
            self.reset();
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, CANCELLED));
        }
        if self.stream.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, NOT_CONNECTED));
        }
        self.in_flight = true;
        Ok(())
    }

    /// Marks the end of the request started by [`begin_exchange`](Self::begin_exchange).
    pub(crate) fn end_exchange(&mut self) {
        self.in_flight = false;
    }

    fn reset(&mut self) {
        self.read_buf.clear();
        self.parser = None;
        self.in_flight = false;
    }

    /// Writes `data` in full, dropping the transport on failure.
    pub(crate) async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, NOT_CONNECTED))?;

        let written = match stream.write_all(data).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(error = %e, "write failed");
            self.stream = None;
            return Err(e);
        }
        Ok(())
    }

    /// Reads exactly one reply.
    ///
    /// Bytes following the reply stay buffered for the next call. A read
    /// that is cancelled midway resumes where it stopped on the next call.
    /// After a protocol violation the buffer is discarded, since the stream
    /// can no longer be framed.
    pub(crate) async fn read_reply(&mut self) -> Reply {
        let max_bulk_len = self.max_bulk_len;
        loop {
            let parser = self
                .parser
                .get_or_insert_with(|| ReplyParser::with_max_bulk_len(max_bulk_len));
            if parser.feed(&mut self.read_buf) == ParseStatus::Complete {
                break;
            }
            let Some(stream) = self.stream.as_mut() else {
                return Reply::IOError(NOT_CONNECTED.to_string());
            };
            self.read_buf.reserve(READ_CHUNK_SIZE);
            match stream.read_buf(&mut self.read_buf).await {
                Ok(0) => {
                    debug!("connection closed by peer");
                    self.stream = None;
                    return Reply::IOError("connection closed".to_string());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "read failed");
                    self.stream = None;
                    return Reply::IOError(e.to_string());
                }
            }
        }

        let Some(parser) = self.parser.take() else {
            return Reply::Nil;
        };
        if parser.is_violation() {
            warn!(
                discarded = self.read_buf.len(),
                "protocol violation, dropping buffered input"
            );
            self.read_buf.clear();
        }
        parser.into_reply().unwrap_or(Reply::Nil)
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.stream.is_some())
            .field("buffered", &self.read_buf.len())
            .field("in_flight", &self.in_flight)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}
