//! Stdio framing and wire types.

pub mod stdio;
pub mod types;

pub use stdio::StdioTransport;
pub use types::{Request, Response, RpcError};
