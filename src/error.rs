//! Unified error type.

use thiserror::Error;

/// The error type returned by weft's fallible operations.
///
/// This surfaces infrastructure failures: binding to a port or accepting
/// a connection. Application-level failures are expressed as envelopes
/// ([`Reply`](crate::Reply)) or raw [`Response`](crate::Response) values,
/// never as `Error`s.
#[derive(Debug, Error)]
#[error("io: {0}")]
pub struct Error(#[from] std::io::Error);
