//! Purpose: Synchronous client library for the Algorithmia algorithm and data REST APIs.
//! Exports: `api` (client, invoker, data entries, listings) and `core` (protocol rules).
//! Role: Request/response protocol layer over a pluggable blocking transport.
//! Invariants: Malformed references fail at construction, before any request is sent.
//! Invariants: Nothing is retried; every failure is terminal for that call.
pub mod api;
pub mod core;

pub use api::{Client, Error, ErrorKind};
