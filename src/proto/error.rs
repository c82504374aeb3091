use std::io;

use thiserror::Error;

/// Result type alias for resply operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the `Result`-based parts of the API.
///
/// Command execution itself never returns this type: transport and
/// protocol failures during an exchange are reported in-band as
/// [`Reply::IOError`](crate::Reply::IOError) and
/// [`Reply::ProtocolError`](crate::Reply::ProtocolError). Use
/// [`Reply::into_result`](crate::Reply::into_result) to lift a reply into
/// this type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The reply stream violated the protocol.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server returned an error.
    #[error("server error: {message}")]
    Server {
        /// Error message from server.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of invalid argument.
        message: String,
    },
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }
}
