//! RESP command encoder and streaming reply parser.
//!
//! # Modules
//!
//! - [`encoder`] - Command serialization to wire bytes
//! - [`parser`] - Resumable reply parser fed from byte chunks

pub mod encoder;
pub mod parser;

pub use encoder::{serialize, Encoder};
pub use parser::{ParseStatus, ReplyParser};
