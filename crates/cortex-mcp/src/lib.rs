//! Stdio tool server for the Omni-Cortex knowledge store.
//!
//! The binary wires a [`cortex_core::Storage`] catalog to a newline-delimited
//! JSON framing over stdio. Everything here is also usable as a library: the
//! e2e tests drive [`server::Dispatcher`] directly.

pub mod protocol;
pub mod server;
pub mod tools;

pub use protocol::{Request, Response, RpcError, StdioTransport};
pub use server::Dispatcher;
