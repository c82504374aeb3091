//! # Resply Proto
//!
//! RESP (Redis Serialization Protocol) building blocks: the reply model,
//! the command serializer and the streaming reply parser.
//!
//! ## Modules
//!
//! - [`codec`] - Command serializer and resumable reply parser
//! - [`error`] - Error types
//! - [`reply`] - Reply model and its textual rendering

pub mod codec;
/// Error types.
pub mod error;
pub mod reply;
