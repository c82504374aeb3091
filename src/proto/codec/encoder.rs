use bytes::{BufMut, Bytes, BytesMut};

/// Serializes one command into its RESP wire form.
///
/// The command is encoded as an array of bulk strings:
/// `*<argc>\r\n` followed by `$<len>\r\n<bytes>\r\n` per argument.
/// An empty argument list encodes to nothing.
///
/// # Example
///
/// ```
/// use resply::proto::codec::serialize;
///
/// let data = serialize(&["GET", "key"]);
/// assert_eq!(&data[..], b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
/// ```
pub fn serialize<A: AsRef<[u8]>>(args: &[A]) -> Bytes {
    let mut encoder = Encoder::new();
    encoder.encode(args);
    encoder.take().freeze()
}

/// An encoder that accumulates serialized commands in one buffer.
///
/// Each call to [`encode`](Encoder::encode) appends a command; the whole
/// batch can then be written with a single transport write.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
    commands: usize,
}

impl Encoder {
    /// Creates a new encoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            commands: 0,
        }
    }

    /// Appends one command to the buffer.
    ///
    /// # Arguments
    ///
    /// * `args` - Command name followed by its arguments; ignored when empty
    pub fn encode<A: AsRef<[u8]>>(&mut self, args: &[A]) {
        if args.is_empty() {
            return;
        }
        self.buf.put_u8(b'*');
        self.buf.extend_from_slice(args.len().to_string().as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        for arg in args {
            let arg = arg.as_ref();
            self.buf.put_u8(b'$');
            self.buf.extend_from_slice(arg.len().to_string().as_bytes());
            self.buf.extend_from_slice(b"\r\n");
            self.buf.extend_from_slice(arg);
            self.buf.extend_from_slice(b"\r\n");
        }
        self.commands += 1;
    }

    /// Returns the number of commands currently buffered.
    pub fn commands(&self) -> usize {
        self.commands
    }

    /// Returns true if no command is buffered.
    pub fn is_empty(&self) -> bool {
        self.commands == 0
    }

    /// Returns the encoded bytes buffered so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Discards every buffered command.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.commands = 0;
    }

    /// Takes the encoded data from the buffer, leaving it empty.
    ///
    /// # Returns
    ///
    /// The accumulated bytes
    pub fn take(&mut self) -> BytesMut {
        self.commands = 0;
        self.buf.split()
    }
}
