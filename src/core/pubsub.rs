use std::collections::HashMap;
use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument};

use crate::core::command::{self, Cmd};
use crate::core::connection::Connection;
use crate::proto::reply::Reply;

/// Callback invoked for each message received on a subscription.
///
/// Any `FnMut(&str, &[u8]) + Send` closure is a handler.
pub trait MessageHandler: Send {
    /// Handles one message published on `channel`.
    fn on_message(&mut self, channel: &str, payload: &[u8]);
}

impl<F> MessageHandler for F
where
    F: FnMut(&str, &[u8]) + Send,
{
    fn on_message(&mut self, channel: &str, payload: &[u8]) {
        self(channel, payload)
    }
}

/// Registry of channel and pattern handlers for one connection.
///
/// Subscribing twice to the same name replaces the previous handler.
/// Entries are never removed; a non-empty registry puts the connection in
/// subscribed mode.
#[derive(Default)]
pub struct Subscriptions {
    channels: HashMap<String, Box<dyn MessageHandler>>,
    patterns: HashMap<String, Box<dyn MessageHandler>>,
}

impl Subscriptions {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for messages on `channel`.
    pub fn add_channel<H>(&mut self, channel: impl Into<String>, handler: H)
    where
        H: MessageHandler + 'static,
    {
        self.channels.insert(channel.into(), Box::new(handler));
    }

    /// Registers `handler` for messages matching `pattern`.
    pub fn add_pattern<H>(&mut self, pattern: impl Into<String>, handler: H)
    where
        H: MessageHandler + 'static,
    {
        self.patterns.insert(pattern.into(), Box::new(handler));
    }

    /// Returns true if `channel` has a handler.
    pub fn contains_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Returns true if `pattern` has a handler.
    pub fn contains_pattern(&self, pattern: &str) -> bool {
        self.patterns.contains_key(pattern)
    }

    /// Number of registered channels and patterns.
    pub fn len(&self) -> usize {
        self.channels.len() + self.patterns.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.patterns.is_empty()
    }

    /// Routes a pushed reply to its handler.
    ///
    /// `["message", channel, payload]` goes to the channel handler and
    /// `["pmessage", pattern, channel, payload]` to the pattern handler,
    /// which receives the concrete channel. Messages without a matching
    /// handler go to `fallback`. Returns false for anything that is not a
    /// message, such as subscription acknowledgements.
    pub fn dispatch<H>(&mut self, reply: &Reply, fallback: &mut H) -> bool
    where
        H: MessageHandler + ?Sized,
    {
        let Some(items) = reply.as_array() else {
            return false;
        };

        let (handler, channel, payload) = match items {
            [kind, channel, payload] if kind.as_bytes() == Some(&b"message"[..]) => {
                let Some(name) = channel.as_bytes() else {
                    return false;
                };
                let name = String::from_utf8_lossy(name);
                (self.channels.get_mut(name.as_ref()), channel, payload)
            }
            [kind, pattern, channel, payload] if kind.as_bytes() == Some(&b"pmessage"[..]) => {
                let Some(pattern) = pattern.as_bytes() else {
                    return false;
                };
                let pattern = String::from_utf8_lossy(pattern);
                (self.patterns.get_mut(pattern.as_ref()), channel, payload)
            }
            _ => return false,
        };

        let (Some(channel), Some(payload)) = (channel.as_bytes(), payload.as_bytes()) else {
            return false;
        };
        let channel = String::from_utf8_lossy(channel);
        match handler {
            Some(handler) => handler.on_message(&channel, payload),
            None => fallback.on_message(&channel, payload),
        }
        true
    }
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions")
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .field("patterns", &self.patterns.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends SUBSCRIBE and registers `handler` for `channel`.
    ///
    /// The handler is registered once the command is written, before the
    /// receive loop can read any message. The acknowledgement is consumed
    /// by the receive loop; this returns `Nil`, or `IOError` if the write
    /// failed, in which case nothing is registered.
    pub async fn subscribe<H>(&mut self, channel: impl Into<String>, handler: H) -> Reply
    where
        H: MessageHandler + 'static,
    {
        let channel = channel.into();
        let reply = self.write_command(&command::subscribe(channel.as_str())).await;
        if reply.is_nil() {
            self.subscriptions_mut().add_channel(channel, handler);
        }
        reply
    }

    /// Registers `handler` for `pattern` and sends PSUBSCRIBE.
    ///
    /// Behaves like [`subscribe`](Connection::subscribe).
    pub async fn psubscribe<H>(&mut self, pattern: impl Into<String>, handler: H) -> Reply
    where
        H: MessageHandler + 'static,
    {
        let pattern = pattern.into();
        let reply = self.write_command(&command::psubscribe(pattern.as_str())).await;
        if reply.is_nil() {
            self.subscriptions_mut().add_pattern(pattern, handler);
        }
        reply
    }

    /// Runs the receive loop until the transport fails or is closed.
    ///
    /// Every pushed message is delivered to its registered handler, or to
    /// `fallback` when nothing matches. Other replies are ignored. Returns
    /// the `IOError` that ended the loop.
    #[instrument(skip_all, level = "debug")]
    pub async fn listen_for_messages<H>(&mut self, mut fallback: H) -> Reply
    where
        H: MessageHandler,
    {
        loop {
            let reply = self.read_reply().await;
            if let Reply::IOError(message) = &reply {
                debug!(%message, "receive loop stopped");
                return reply;
            }
            if !self.subscriptions_mut().dispatch(&reply, &mut fallback) {
                debug!(%reply, "ignoring non-message reply");
            }
        }
    }

    /// Runs the receive loop, dropping unmatched messages.
    pub async fn listen(&mut self) -> Reply {
        self.listen_for_messages(|_: &str, _: &[u8]| {}).await
    }

    async fn write_command(&mut self, cmd: &Cmd) -> Reply {
        if let Err(e) = self.begin_exchange() {
            return Reply::IOError(e.to_string());
        }
        let reply = match self.write_all(&cmd.to_bytes()).await {
            Ok(()) => Reply::Nil,
            Err(e) => Reply::IOError(e.to_string()),
        };
        self.end_exchange();
        reply
    }
}
