use bytes::Bytes;

use crate::proto::codec::serialize;

/// Conversion into a single command argument.
///
/// Strings and byte slices are passed through unchanged. Integers are
/// converted to their decimal text, since RESP has no integer argument
/// type.
pub trait IntoArg {
    /// Converts the value into the bytes sent on the wire.
    fn into_arg(self) -> Bytes;
}

impl IntoArg for Bytes {
    #[inline]
    fn into_arg(self) -> Bytes {
        self
    }
}

impl IntoArg for &Bytes {
    #[inline]
    fn into_arg(self) -> Bytes {
        self.clone()
    }
}

impl IntoArg for &str {
    #[inline]
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl IntoArg for String {
    #[inline]
    fn into_arg(self) -> Bytes {
        Bytes::from(self)
    }
}

impl IntoArg for &String {
    #[inline]
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl IntoArg for &[u8] {
    #[inline]
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl<const N: usize> IntoArg for &[u8; N] {
    #[inline]
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl IntoArg for Vec<u8> {
    #[inline]
    fn into_arg(self) -> Bytes {
        Bytes::from(self)
    }
}

macro_rules! integer_args {
    ($($ty:ty),*) => {
        $(
            impl IntoArg for $ty {
                #[inline]
                fn into_arg(self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

integer_args!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// A command ready to be sent to the server.
///
/// Commands are built using the builder pattern and serialized with
/// [`serialize`](crate::proto::codec::serialize) when sent.
///
/// # Example
///
/// ```
/// use resply::Cmd;
///
/// let cmd = Cmd::new("SET").arg("key").arg("value").arg("PX").arg(500);
/// assert_eq!(cmd.args().len(), 5);
/// assert_eq!(cmd.args()[4], "500");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a new command with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The command name (e.g., "GET", "SET", "DEL")
    #[inline]
    pub fn new(name: impl IntoArg) -> Self {
        Self {
            args: vec![name.into_arg()],
        }
    }

    /// Builds a command from a full argument vector, name first.
    ///
    /// An empty vector yields an empty command, which is sent as a no-op.
    pub fn from_args<I>(argv: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoArg,
    {
        Self {
            args: argv.into_iter().map(IntoArg::into_arg).collect(),
        }
    }

    /// Appends an argument to the command.
    ///
    /// # Arguments
    ///
    /// * `arg` - The argument value
    #[inline]
    pub fn arg(mut self, arg: impl IntoArg) -> Self {
        self.args.push(arg.into_arg());
        self
    }

    /// Returns the command name, if any.
    pub fn name(&self) -> Option<&[u8]> {
        self.args.first().map(|name| &name[..])
    }

    /// Returns every argument, name included.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Returns true if the command has no arguments at all.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns the RESP wire encoding of the command.
    pub fn to_bytes(&self) -> Bytes {
        serialize(&self.args)
    }

    /// Returns true for commands that change the subscription state.
    pub(crate) fn is_pubsub(&self) -> bool {
        self.name().is_some_and(|name| {
            [
                &b"SUBSCRIBE"[..],
                b"PSUBSCRIBE",
                b"UNSUBSCRIBE",
                b"PUNSUBSCRIBE",
            ]
            .iter()
            .any(|candidate| name.eq_ignore_ascii_case(candidate))
        })
    }
}

/// Creates a PING command.
#[inline]
pub fn ping() -> Cmd {
    Cmd::new("PING")
}

/// Creates an ECHO command.
#[inline]
pub fn echo(msg: impl IntoArg) -> Cmd {
    Cmd::new("ECHO").arg(msg)
}

/// Creates a GET command.
#[inline]
pub fn get(key: impl IntoArg) -> Cmd {
    Cmd::new("GET").arg(key)
}

/// Creates a SET command.
#[inline]
pub fn set(key: impl IntoArg, value: impl IntoArg) -> Cmd {
    Cmd::new("SET").arg(key).arg(value)
}

/// Creates a `SET key value NX PX ttl` command: set only if absent, with
/// an expiry in milliseconds.
#[inline]
pub fn set_nx_px(key: impl IntoArg, value: impl IntoArg, ttl_ms: u64) -> Cmd {
    Cmd::new("SET")
        .arg(key)
        .arg(value)
        .arg("NX")
        .arg("PX")
        .arg(ttl_ms)
}

/// Creates a DEL command.
#[inline]
pub fn del(key: impl IntoArg) -> Cmd {
    Cmd::new("DEL").arg(key)
}

/// Creates an INCR command.
#[inline]
pub fn incr(key: impl IntoArg) -> Cmd {
    Cmd::new("INCR").arg(key)
}

/// Creates a MGET command.
#[inline]
pub fn mget<I>(keys: I) -> Cmd
where
    I: IntoIterator,
    I::Item: IntoArg,
{
    keys.into_iter().fold(Cmd::new("MGET"), Cmd::arg)
}

/// Creates a PUBLISH command.
#[inline]
pub fn publish(channel: impl IntoArg, message: impl IntoArg) -> Cmd {
    Cmd::new("PUBLISH").arg(channel).arg(message)
}

/// Creates an EVAL command running `script` with the given keys and arguments.
pub fn eval<K, A>(script: impl IntoArg, keys: K, args: A) -> Cmd
where
    K: IntoIterator,
    K::Item: IntoArg,
    A: IntoIterator,
    A::Item: IntoArg,
{
    let keys: Vec<Bytes> = keys.into_iter().map(IntoArg::into_arg).collect();
    let cmd = Cmd::new("EVAL").arg(script).arg(keys.len());
    let cmd = keys.into_iter().fold(cmd, Cmd::arg);
    args.into_iter().fold(cmd, Cmd::arg)
}

/// Creates a SUBSCRIBE command.
#[inline]
pub fn subscribe(channel: impl IntoArg) -> Cmd {
    Cmd::new("SUBSCRIBE").arg(channel)
}

/// Creates a PSUBSCRIBE command.
#[inline]
pub fn psubscribe(pattern: impl IntoArg) -> Cmd {
    Cmd::new("PSUBSCRIBE").arg(pattern)
}
