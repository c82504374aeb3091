use std::fmt;
use std::io;

use bytes::Bytes;

use crate::proto::error::{Error, Result};

/// A reply received from a RESP server.
///
/// Exactly one variant is active at a time:
/// - String: simple (`+OK`) and bulk (`$3\r\nfoo`) strings, binary safe
/// - Integer: numeric replies (`:42`)
/// - Array: ordered, possibly nested replies (`*2\r\n...`)
/// - ProtocolError: an error reported by the server or detected by the parser
/// - IOError: the transport failed during this exchange
/// - Nil: explicit absence (`$-1`, `*-1`), distinct from empty string/array
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Simple or bulk string.
    String(Bytes),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Array of replies, possibly empty.
    Array(Vec<Reply>),
    /// Server-reported or parse-time protocol error.
    ProtocolError(String),
    /// Transport failure.
    IOError(String),
    /// Absence of a value.
    Nil,
}

impl Reply {
    /// Returns the raw bytes of a string reply.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a string reply as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Returns the value of an integer reply.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the elements of an array reply.
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Consumes the reply and returns the elements of an array reply.
    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true if this reply is Nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Returns true for both protocol and transport errors.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::ProtocolError(_) | Reply::IOError(_))
    }

    /// Returns true if this is the status reply `OK`.
    pub fn is_ok(&self) -> bool {
        self.as_bytes() == Some(&b"OK"[..])
    }

    /// Converts error replies into [`Error`] so callers can use `?`.
    ///
    /// `ProtocolError` becomes [`Error::Server`] and `IOError` becomes
    /// [`Error::Io`]; every other reply is returned unchanged. A reply does
    /// not record whether the parser or the server produced the error; use
    /// [`ReplyParser::finish`](crate::ReplyParser::finish) to tell them apart.
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Reply::ProtocolError(message) => Err(Error::Server { message }),
            Reply::IOError(message) => Err(Error::Io {
                source: io::Error::new(io::ErrorKind::Other, message),
            }),
            other => Ok(other),
        }
    }
}

impl From<i64> for Reply {
    fn from(value: i64) -> Self {
        Reply::Integer(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::String(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<Vec<Reply>> for Reply {
    fn from(items: Vec<Reply>) -> Self {
        Reply::Array(items)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::String(s) => write!(f, "\"{}\"", String::from_utf8_lossy(s)),
            Reply::Integer(i) => write!(f, "{}", i),
            Reply::Nil => f.write_str("(nil)"),
            Reply::ProtocolError(message) | Reply::IOError(message) => {
                write!(f, "(error) {}", message)
            }
            Reply::Array(items) if items.is_empty() => f.write_str("(empty array)"),
            Reply::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str("\n")?;
                    }
                    let prefix = format!("{}) ", index + 1);
                    // Nested arrays span several lines; align them under the element.
                    for (n, line) in item.to_string().split('\n').enumerate() {
                        if n == 0 {
                            write!(f, "{}{}", prefix, line)?;
                        } else {
                            write!(f, "\n{:width$}{}", "", line, width = prefix.len())?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_scalars() {
        assert_eq!(Reply::from("PONG").to_string(), "\"PONG\"");
        assert_eq!(Reply::Integer(-7).to_string(), "-7");
        assert_eq!(Reply::Nil.to_string(), "(nil)");
        assert_eq!(
            Reply::ProtocolError("ERR unknown command".to_string()).to_string(),
            "(error) ERR unknown command"
        );
        assert_eq!(
            Reply::IOError("connection closed".to_string()).to_string(),
            "(error) connection closed"
        );
    }

    #[test]
    fn test_render_array() {
        let reply = Reply::Array(vec![Reply::from("1"), Reply::from("2")]);
        assert_eq!(reply.to_string(), "1) \"1\"\n2) \"2\"");
    }

    #[test]
    fn test_render_mixed_array() {
        let reply = Reply::Array(vec![Reply::from("a"), Reply::Nil, Reply::Integer(3)]);
        assert_eq!(reply.to_string(), "1) \"a\"\n2) (nil)\n3) 3");
    }

    #[test]
    fn test_render_nested_array() {
        let reply = Reply::Array(vec![
            Reply::Array(vec![Reply::from("a"), Reply::from("b")]),
            Reply::Integer(1),
        ]);
        assert_eq!(reply.to_string(), "1) 1) \"a\"\n   2) \"b\"\n2) 1");
    }

    #[test]
    fn test_render_empty_array() {
        assert_eq!(Reply::Array(vec![]).to_string(), "(empty array)");
    }

    #[test]
    fn test_render_empty_string_is_not_nil() {
        assert_eq!(Reply::String(Bytes::new()).to_string(), "\"\"");
    }

    #[test]
    fn test_accessors() {
        let reply = Reply::from("OK");
        assert!(reply.is_ok());
        assert_eq!(reply.as_str(), Some("OK"));
        assert_eq!(reply.as_integer(), None);

        assert_eq!(Reply::Integer(5).as_integer(), Some(5));
        assert!(Reply::Nil.is_nil());
        assert!(Reply::IOError("x".into()).is_error());
        assert!(!Reply::from("ERR").is_error());

        let array = Reply::Array(vec![Reply::Integer(1)]);
        assert_eq!(array.as_array(), Some(&[Reply::Integer(1)][..]));
        assert_eq!(array.into_array(), Some(vec![Reply::Integer(1)]));
    }

    #[test]
    fn test_into_result() {
        assert!(matches!(
            Reply::ProtocolError("WRONGTYPE".into()).into_result(),
            Err(Error::Server { message }) if message == "WRONGTYPE"
        ));
        assert!(matches!(
            Reply::ProtocolError("Parsing error: from a server".into()).into_result(),
            Err(Error::Server { message }) if message == "Parsing error: from a server"
        ));
        assert!(matches!(
            Reply::IOError("broken pipe".into()).into_result(),
            Err(Error::Io { .. })
        ));
        assert_eq!(Reply::Nil.into_result().unwrap(), Reply::Nil);
    }
}
