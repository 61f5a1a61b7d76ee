//! rawhttp - HTTP/1.1 over raw TCP
//!
//! Request parsing, response writing and a per-connection server loop built
//! directly on tokio sockets.

pub mod config;
pub mod http;
pub mod proxy;
pub mod routes;
pub mod server;
