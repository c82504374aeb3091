use bytes::{Buf, BytesMut};

use crate::proto::error::{Error, Result};
use crate::proto::reply::Reply;

/// Upper bound for buffer preallocation driven by a declared length.
const MAX_PREALLOC: usize = 64 * 1024;

const PARSE_ERROR: &str = "Parsing error.";

/// Outcome of a single [`ReplyParser::feed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The reply is incomplete; feed more bytes.
    NeedMoreData,
    /// The reply is complete; read it with [`ReplyParser::result`].
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NeedType,
    NeedSize,
    NeedData,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Simple,
    Error,
    Integer,
    Bulk,
    Array,
}

/// An array whose elements are still being parsed.
#[derive(Debug)]
struct ArrayFrame {
    remaining: usize,
    items: Vec<Reply>,
}

/// A resumable parser for a single RESP reply.
///
/// The parser is a state machine that can be fed arbitrarily sized chunks,
/// down to one byte at a time. It only consumes the bytes that belong to
/// its reply: anything after the end of the reply stays in the buffer for
/// the next parser, which is what makes pipelining over one stream work.
///
/// Arrays may be nested to any depth; every open array is tracked as a
/// frame on an explicit stack.
///
/// # Example
///
/// ```
/// use resply::proto::codec::{ParseStatus, ReplyParser};
/// use resply::Reply;
///
/// let mut parser = ReplyParser::new();
/// let mut chunk: &[u8] = b"*2\r\n$3\r\nfoo\r\n$3";
/// assert_eq!(parser.feed(&mut chunk), ParseStatus::NeedMoreData);
/// let mut chunk: &[u8] = b"\r\nbar\r\n";
/// assert_eq!(parser.feed(&mut chunk), ParseStatus::Complete);
/// assert_eq!(
///     parser.result(),
///     Some(&Reply::Array(vec![Reply::from("foo"), Reply::from("bar")]))
/// );
/// ```
#[derive(Debug)]
pub struct ReplyParser {
    state: State,
    kind: Kind,
    /// Bytes of the line or bulk payload currently being read.
    line: BytesMut,
    /// Bytes still owed for a bulk payload (CRLF included); `None` reads until EOL.
    remaining_bytes: Option<usize>,
    stack: Vec<ArrayFrame>,
    result: Option<Reply>,
    violation: bool,
    max_bulk_len: usize,
}

impl ReplyParser {
    /// Default limit for declared lengths: 512 MB.
    pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

    /// Creates a parser for one reply.
    pub fn new() -> Self {
        Self::with_max_bulk_len(Self::DEFAULT_MAX_BULK_LEN)
    }

    /// Creates a parser with a custom limit for bulk string lengths,
    /// array lengths and unterminated lines.
    ///
    /// # Arguments
    ///
    /// * `max_bulk_len` - Largest declared length accepted from the server
    pub fn with_max_bulk_len(max_bulk_len: usize) -> Self {
        Self {
            state: State::NeedType,
            kind: Kind::Simple,
            line: BytesMut::new(),
            remaining_bytes: None,
            stack: Vec::new(),
            result: None,
            violation: false,
            max_bulk_len,
        }
    }

    /// Consumes bytes from the front of `buf` and advances the state machine.
    ///
    /// Returns [`ParseStatus::Complete`] once the reply is finished; bytes
    /// past the end of the reply are left in `buf`. Once complete, further
    /// calls consume nothing.
    pub fn feed<B: Buf>(&mut self, buf: &mut B) -> ParseStatus {
        loop {
            match self.state {
                State::Finished => return ParseStatus::Complete,
                State::NeedType => {
                    if !buf.has_remaining() {
                        return ParseStatus::NeedMoreData;
                    }
                    let byte = buf.get_u8();
                    self.parse_type(byte);
                }
                State::NeedSize => match self.read_line(buf) {
                    Some(line) => self.parse_size(&line),
                    None => return self.status(),
                },
                State::NeedData => match self.remaining_bytes {
                    None => match self.read_line(buf) {
                        Some(line) => self.parse_line(line),
                        None => return self.status(),
                    },
                    Some(owed) => match self.read_bulk(buf, owed) {
                        Some(payload) => self.parse_bulk(payload),
                        None => return self.status(),
                    },
                },
            }
        }
    }

    /// Returns true once the reply has been fully parsed.
    pub fn is_complete(&self) -> bool {
        self.state == State::Finished
    }

    /// Returns true if parsing stopped on malformed input.
    ///
    /// The result is then a [`Reply::ProtocolError`] describing the
    /// violation, and the stream the bytes came from is out of sync.
    pub fn is_violation(&self) -> bool {
        self.violation
    }

    /// Returns the finished reply, or `None` while more data is needed.
    pub fn result(&self) -> Option<&Reply> {
        self.result.as_ref()
    }

    /// Consumes the parser and returns the finished reply.
    pub fn into_reply(self) -> Option<Reply> {
        self.result
    }

    /// Consumes the parser, separating malformed input from replies.
    ///
    /// A server-reported error is still returned as
    /// `Ok(Reply::ProtocolError(..))`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the input violated the protocol or the
    /// reply is not complete yet.
    pub fn finish(self) -> Result<Reply> {
        match self.result {
            Some(Reply::ProtocolError(message)) if self.violation => {
                Err(Error::Protocol { message })
            }
            Some(reply) => Ok(reply),
            None => Err(Error::Protocol {
                message: "incomplete reply".to_string(),
            }),
        }
    }

    fn status(&self) -> ParseStatus {
        if self.state == State::Finished {
            ParseStatus::Complete
        } else {
            ParseStatus::NeedMoreData
        }
    }

    fn parse_type(&mut self, byte: u8) {
        let (kind, state) = match byte {
            b'+' => (Kind::Simple, State::NeedData),
            b'-' => (Kind::Error, State::NeedData),
            b':' => (Kind::Integer, State::NeedData),
            b'$' => (Kind::Bulk, State::NeedSize),
            b'*' => (Kind::Array, State::NeedSize),
            _ => return self.fail(PARSE_ERROR),
        };
        self.kind = kind;
        self.state = state;
        self.remaining_bytes = None;
    }

    fn parse_size(&mut self, line: &[u8]) {
        let size = match parse_i64(line) {
            Some(size) => size,
            None => return self.fail("Parsing error: invalid length."),
        };

        if size == -1 {
            return self.complete(Reply::Nil);
        }
        let len = match usize::try_from(size) {
            Ok(len) if len <= self.max_bulk_len => len,
            _ => return self.fail("Parsing error: invalid length."),
        };

        match self.kind {
            Kind::Array if len == 0 => self.complete(Reply::Array(Vec::new())),
            Kind::Array => {
                self.stack.push(ArrayFrame {
                    remaining: len,
                    items: Vec::with_capacity(len.min(MAX_PREALLOC)),
                });
                self.state = State::NeedType;
            }
            _ => {
                self.line.reserve((len + 2).min(MAX_PREALLOC));
                self.remaining_bytes = Some(len + 2);
                self.state = State::NeedData;
            }
        }
    }

    fn parse_line(&mut self, line: BytesMut) {
        match self.kind {
            Kind::Simple => self.complete(Reply::String(line.freeze())),
            Kind::Error => {
                self.complete(Reply::ProtocolError(String::from_utf8_lossy(&line).into_owned()))
            }
            Kind::Integer => match parse_i64(&line) {
                Some(value) => self.complete(Reply::Integer(value)),
                None => self.fail("Parsing error: invalid integer."),
            },
            Kind::Bulk | Kind::Array => self.fail(PARSE_ERROR),
        }
    }

    fn parse_bulk(&mut self, mut payload: BytesMut) {
        if !payload.ends_with(b"\r\n") {
            return self.fail("Parsing error: bulk string not terminated by CRLF.");
        }
        payload.truncate(payload.len() - 2);
        self.complete(Reply::String(payload.freeze()));
    }

    /// Reads up to and including the next `\n`, returning the line without
    /// its terminator. Partial lines are kept across calls.
    fn read_line<B: Buf>(&mut self, buf: &mut B) -> Option<BytesMut> {
        while buf.has_remaining() {
            let chunk = buf.chunk();
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.line.extend_from_slice(&chunk[..pos]);
                    buf.advance(pos + 1);
                    if self.line.last() == Some(&b'\r') {
                        self.line.truncate(self.line.len() - 1);
                    }
                    return Some(self.line.split());
                }
                None => {
                    let n = chunk.len();
                    self.line.extend_from_slice(chunk);
                    buf.advance(n);
                    if self.line.len() > self.max_bulk_len {
                        self.fail("Parsing error: line too long.");
                        return None;
                    }
                }
            }
        }
        None
    }

    /// Reads up to `owed` payload bytes, returning the whole payload once
    /// nothing is owed any more.
    fn read_bulk<B: Buf>(&mut self, buf: &mut B, mut owed: usize) -> Option<BytesMut> {
        while owed > 0 && buf.has_remaining() {
            let chunk = buf.chunk();
            let take = owed.min(chunk.len());
            self.line.extend_from_slice(&chunk[..take]);
            buf.advance(take);
            owed -= take;
        }
        self.remaining_bytes = Some(owed);
        if owed > 0 {
            None
        } else {
            Some(self.line.split())
        }
    }

    /// Stores a finished value in the innermost open array, closing every
    /// array that becomes full, or as the result when no array is open.
    fn complete(&mut self, value: Reply) {
        let mut value = value;
        loop {
            match self.stack.last_mut() {
                Some(frame) => {
                    frame.items.push(value);
                    frame.remaining -= 1;
                    if frame.remaining > 0 {
                        self.state = State::NeedType;
                        return;
                    }
                    let items = std::mem::take(&mut frame.items);
                    self.stack.pop();
                    value = Reply::Array(items);
                }
                None => {
                    self.result = Some(value);
                    self.state = State::Finished;
                    return;
                }
            }
        }
    }

    fn fail(&mut self, message: &str) {
        self.result = Some(Reply::ProtocolError(message.to_string()));
        self.violation = true;
        self.stack.clear();
        self.line.clear();
        self.state = State::Finished;
    }
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse::<i64>().ok()
}
