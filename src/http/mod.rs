//! HTTP/1.1 message handling on raw byte streams.
//!
//! # Architecture
//!
//! - **`headers`**: Header field storage and the field-line grammar
//! - **`request`**: Request representation and the per-unit parse state machine
//! - **`parser`**: Incremental request parsing from an `AsyncRead`
//! - **`response`**: Status codes, default headers, canned error responses
//! - **`writer`**: Response serialization with enforced write ordering
//! - **`connection`**: Drives one accepted connection from request to close
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Parse one request from the stream
//!        └──────┬──────┘
//!               ├─ Malformed ──▶ Rejecting (400) ─┐
//!               │ Request parsed                  │
//!               ▼                                 │
//!        ┌──────────────────┐                     │
//!        │   Dispatching    │ ← Handler drives    │
//!        └──────┬───────────┘   the writer        │
//!               ▼                                 │
//!        ┌──────────────────┐                     │
//!        │     Closed       │ ◀───────────────────┘
//!        └──────────────────┘
//! ```
//!
//! There is no keep-alive: every response carries `Connection: close` and the
//! socket is shut down after one exchange.
//!
//! # Streaming with trailers
//!
//! A handler that does not know its body up front (for example one relaying
//! bytes from another origin) declares `Transfer-Encoding: chunked` and a
//! `Trailer` header, writes each piece with
//! [`write_chunked_body`](writer::ResponseWriter::write_chunked_body) while
//! folding it into a running digest, then finishes with
//! [`write_chunked_body_done`](writer::ResponseWriter::write_chunked_body_done)
//! and [`write_trailers`](writer::ResponseWriter::write_trailers).
//! See [`crate::proxy::relay`].

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
