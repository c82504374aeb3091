//! RESP reply model.
//!
//! This module defines [`Reply`], the value produced for every server
//! reply, together with its fixed textual rendering.

/// Reply type definitions.
pub mod types;

pub use types::Reply;
