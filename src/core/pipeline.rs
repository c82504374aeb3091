use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::core::command::{Cmd, IntoArg};
use crate::core::connection::Connection;
use crate::proto::codec::Encoder;
use crate::proto::reply::Reply;

const SUBSCRIBED_MODE: &str = "pipelining is unavailable in subscribed mode";

/// A batch of commands sent with a single write.
///
/// Replies come back in the order the commands were added. A pipeline is
/// reusable: after [`send`](Pipeline::send) it is empty again.
///
/// # Example
///
/// ```no_run
/// # async fn run(conn: &mut resply::Connection) {
/// use resply::command;
///
/// let replies = conn
///     .pipeline()
///     .add(command::incr("visits"))
///     .add(command::incr("visits"))
///     .send()
///     .await;
/// assert_eq!(replies.len(), 2);
/// # }
/// ```
#[derive(Debug)]
pub struct Pipeline<'a, S = TcpStream> {
    connection: &'a mut Connection<S>,
    encoder: Encoder,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a pipeline on this connection.
    pub fn pipeline(&mut self) -> Pipeline<'_, S> {
        Pipeline {
            connection: self,
            encoder: Encoder::new(),
        }
    }
}

impl<'a, S> Pipeline<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Appends a command.
    ///
    /// Empty commands and (P)(UN)SUBSCRIBE are ignored: pub/sub changes the
    /// reply stream and cannot share a batch.
    pub fn add(&mut self, cmd: Cmd) -> &mut Self {
        if cmd.is_pubsub() {
            debug!(?cmd, "dropping pub/sub command from pipeline");
            return self;
        }
        self.encoder.encode(cmd.args());
        self
    }

    /// Appends a command given as a full argument vector.
    pub fn command<I>(&mut self, argv: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: IntoArg,
    {
        self.add(Cmd::from_args(argv))
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.encoder.commands()
    }

    /// Returns true if no command is queued.
    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }

    /// Writes every queued command at once, then reads one reply per command.
    ///
    /// The result always holds exactly [`len`](Pipeline::len) replies. If
    /// the write fails every slot is an `IOError`; if a read fails, that
    /// slot and every later one carry the same `IOError`. In subscribed
    /// mode nothing is written and every slot is a `ProtocolError`.
    ///
    /// Dropping the returned future before it completes leaves replies on
    /// the wire; the connection's next command then fails with an `IOError`.
    #[instrument(skip(self), fields(commands = self.len()), level = "debug")]
    pub async fn send(&mut self) -> Vec<Reply> {
        let count = self.encoder.commands();
        if count == 0 {
            return Vec::new();
        }
        let data = self.encoder.take();

        if self.connection.in_subscribed_mode() {
            return vec![Reply::ProtocolError(SUBSCRIBED_MODE.to_string()); count];
        }
        if let Err(e) = self.connection.begin_exchange() {
            return vec![Reply::IOError(e.to_string()); count];
        }
        if let Err(e) = self.connection.write_all(&data).await {
            self.connection.end_exchange();
            return vec![Reply::IOError(e.to_string()); count];
        }

        let mut replies = Vec::with_capacity(count);
        while replies.len() < count {
            let reply = self.connection.read_reply().await;
            if let Reply::IOError(_) = reply {
                replies.resize(count, reply);
                break;
            }
            replies.push(reply);
        }
        self.connection.end_exchange();
        replies
    }
}
