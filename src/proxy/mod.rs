//! Relaying responses from another origin.
//!
//! The relay streams an origin body to the client as chunked transfer
//! encoding and reports a digest of what it sent in trailer fields.

pub mod relay;

pub use relay::{BodySummary, Relay, stream_with_digest};
