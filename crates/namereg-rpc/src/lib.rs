//! namereg-rpc
//!
//! JSON-RPC 2.0 server for the name registry.
//!
//! Namespace: "registry". Mutating methods take the caller's base-58
//! principal as their first parameter and are forwarded to the node's
//! single writer; queries read the shared database directly.

pub mod api;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerState, Submission};
pub use types::{RpcReceipt, RpcRegistryInfo, RpcTimestampedDomain};
