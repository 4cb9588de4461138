//! Core request-context types for JSON-RPC.
//!
//! This crate provides the pieces shared by the calling side and the serving
//! side (`jsonrpc-context`) of a JSON-RPC connection that wants to carry a
//! deadline and opaque metadata alongside each request.
//!
//! ## Modules
//!
//! - [`context`]: Immutable, hierarchically derived request context
//! - [`metadata`]: Attaching and extracting the metadata value on a context
//! - [`envelope`]: Wire envelope encoding and decoding
//! - [`error`]: Error type shared by all of the above

mod context;
mod envelope;
mod error;
mod metadata;

pub use context::*;
pub use envelope::*;
pub use error::*;
pub use metadata::*;
