//! # Resply Core
//!
//! Connection handling for a single RESP server: request/response
//! exchanges, pipelining and the pub/sub receive loop.
//!
//! ## Modules
//!
//! - [`builder`] - Connection configuration
//! - [`command`] - Command builders
//! - [`connection`] - Single connection management
//! - [`pipeline`] - Batched commands
//! - [`pubsub`] - Subscription registry and receive loop

/// Connection builder and address parsing.
pub mod builder;
/// Command construction helpers.
pub mod command;
/// Low-level connection management.
pub mod connection;
/// Pipelined command batches.
pub mod pipeline;
/// Publish/subscribe support.
pub mod pubsub;

pub use builder::ConnectionBuilder;
pub use command::{Cmd, IntoArg};
pub use connection::Connection;
pub use pipeline::Pipeline;
pub use pubsub::{MessageHandler, Subscriptions};
