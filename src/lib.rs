//! # Resply
//!
//! Streaming RESP client engine: a resumable reply parser, a command
//! serializer, connections with pipelining and pub/sub, and a Redlock
//! distributed lock.
//!
//! ## Features
//!
//! - `cli` - Interactive `resply-cli` binary (default)
//!
//! ## Example
//!
//! ```no_run
//! use resply::{command, ConnectionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = ConnectionBuilder::new()
//!         .address("redis://localhost:6379")
//!         .connect()
//!         .await?;
//!     conn.send(command::set("greeting", "hello")).await.into_result()?;
//!     println!("{}", conn.send(command::get("greeting")).await);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub(crate) mod core;
pub mod proto;
pub(crate) mod redlock;

pub use crate::core::builder::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT};
pub use crate::core::command;
pub use crate::core::{
    Cmd, Connection, ConnectionBuilder, IntoArg, MessageHandler, Pipeline, Subscriptions,
};
pub use crate::proto::codec::{serialize, Encoder, ParseStatus, ReplyParser};
pub use crate::proto::error::{Error, Result};
pub use crate::proto::reply::Reply;
pub use crate::redlock::{Redlock, SharedConnection, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY_MAX};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
