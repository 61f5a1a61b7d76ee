//! Listening socket, accept loop and the application handler boundary.

pub mod listener;

use std::future::Future;
use std::pin::Pin;

use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

pub use listener::Server;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Application logic invoked once per successfully parsed request.
///
/// The handler owns the response: it must drive `w` from the status line to
/// [`WriterState::Done`](crate::http::writer::WriterState::Done). Writer calls
/// made out of order return an error and write nothing.
///
/// # Example
///
/// ```
/// use rawhttp::http::request::Request;
/// use rawhttp::http::response::{StatusCode, default_headers};
/// use rawhttp::http::writer::ResponseWriter;
/// use rawhttp::server::{Handler, HandlerFuture};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     fn call<'a>(&'a self, _req: &'a Request, w: &'a mut ResponseWriter) -> HandlerFuture<'a> {
///         Box::pin(async move {
///             let body = b"hello";
///             let _ = w.write_status_line(StatusCode::Ok).await;
///             let _ = w.write_headers(&default_headers(body.len())).await;
///             let _ = w.write_body(body).await;
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, req: &'a Request, w: &'a mut ResponseWriter) -> HandlerFuture<'a>;
}
