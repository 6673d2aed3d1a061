//! Purpose: Define the public client surface for the algorithm and data APIs.
//! Exports: Client handle, transport seam, algorithm invoker, data entries, listings.
//! Role: Public, additive-only boundary; wire structs stay private to their modules.
//! Invariants: This module is the only public path to request composition.
//! Invariants: Every call is synchronous and blocks until the transport returns.

mod algorithm;
mod client;
mod data;
mod listing;
mod transport;

pub use crate::core::acl::{MY_ALGOS_PERMISSIONS, PUBLIC_PERMISSIONS, ReadAcl};
pub use crate::core::envelope::{AlgorithmOutput, OutputMode, ResponseMetadata};
pub use crate::core::error::{ApiResult, Error, ErrorKind};
pub use crate::core::path::{AlgorithmReference, DataPath};
pub use algorithm::{
    Algorithm, AlgorithmInput, AlgorithmResponse, DEFAULT_TIMEOUT_SECS, InvocationOptions,
};
pub use client::{API_ADDRESS_ENV, Client, DEFAULT_API_ADDRESS};
pub use data::{DataDirectory, DataFile};
pub use listing::{DirectoryListing, FileListing, Listing};
pub use transport::{HttpRequest, HttpResponse, Method, Transport, UreqTransport};
