use std::time::Duration;

use crate::core::connection::Connection;
use crate::proto::codec::ReplyParser;
use crate::{Error, Result};

/// Host used when an address does not name one.
pub const DEFAULT_HOST: &str = "localhost";

/// Port used when an address does not name one.
pub const DEFAULT_PORT: u16 = 6379;

/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Builder for configuring and creating a [`Connection`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use resply::ConnectionBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = ConnectionBuilder::new()
///     .address("127.0.0.1:6379")
///     .connect_timeout(Duration::from_secs(1))
///     .connect()
///     .await?;
/// println!("{}", conn.send(resply::command::ping()).await);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConnectionBuilder {
    address: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    connect_timeout: Option<Duration>,
    max_bulk_len: Option<usize>,
}

impl ConnectionBuilder {
    /// Creates a new [`ConnectionBuilder`] instance.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server address.
    ///
    /// # Arguments
    ///
    /// * `address` - `host`, `host:port` or `redis://host:port`
    #[inline]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the server host, overriding the host part of the address.
    #[inline]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the server port, overriding the port part of the address.
    #[inline]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the connection timeout.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Maximum time to wait for connection establishment
    #[inline]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the largest bulk string or array length accepted in replies.
    #[inline]
    pub fn max_bulk_len(mut self, len: usize) -> Self {
        self.max_bulk_len = Some(len);
        self
    }

    /// Builds an unconnected [`Connection`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the address cannot be parsed.
    pub fn build(self) -> Result<Connection> {
        let (host, port) = match self.address.as_deref() {
            Some(address) => parse_address(address)?,
            None => (DEFAULT_HOST.to_string(), DEFAULT_PORT),
        };
        let host = self.host.unwrap_or(host);
        let port = self.port.unwrap_or(port);

        Ok(Connection::unconnected(
            host,
            port,
            self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            self.max_bulk_len
                .unwrap_or(ReplyParser::DEFAULT_MAX_BULK_LEN),
        ))
    }

    /// Builds the [`Connection`] and connects it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the address cannot be parsed.
    /// Returns [`Error::Io`] if connection fails or times out.
    pub async fn connect(self) -> Result<Connection> {
        let mut connection = self.build()?;
        connection.connect().await?;
        Ok(connection)
    }
}

/// Splits an address into host and port.
///
/// Accepts `host`, `host:port`, `[v6]:port` and `redis://host:port`; a
/// missing host or port falls back to `localhost:6379`.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16)> {
    if address.contains("://") {
        let parsed_url =
            url::Url::parse(address).map_err(|_| Error::invalid_argument("invalid address format"))?;
        if parsed_url.scheme() != "redis" {
            return Err(Error::invalid_argument(
                "invalid scheme, expected redis://",
            ));
        }
        let host = parsed_url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .filter(|host| !host.is_empty())
            .unwrap_or(DEFAULT_HOST);
        return Ok((host.to_string(), parsed_url.port().unwrap_or(DEFAULT_PORT)));
    }

    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') || host.ends_with(']') => (host, Some(port)),
        _ => (address, None),
    };

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() { DEFAULT_HOST } else { host };

    let port = match port {
        None | Some("") => DEFAULT_PORT,
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| Error::invalid_argument(format!("invalid port `{}`", port)))?,
    };

    Ok((host.to_string(), port))
}
