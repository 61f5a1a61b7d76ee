//! Demo application served by the `rawhttp` binary.
//!
//! | target            | response                                  |
//! |-------------------|-------------------------------------------|
//! | `/httpbin/<path>` | origin body relayed as chunks + trailers  |
//! | `/video`          | file from `assets.video_path`, video/mp4  |
//! | `/yourproblem`    | HTML 400                                  |
//! | `/myproblem`      | HTML 500                                  |
//! | anything else     | HTML 200                                  |

use std::path::PathBuf;

use tracing::{error, warn};

use crate::config::Config;
use crate::http::request::Request;
use crate::http::response::{StatusCode, default_headers};
use crate::http::writer::{ResponseWriter, WriteError};
use crate::proxy::Relay;
use crate::server::{Handler, HandlerFuture};

const RELAY_PREFIX: &str = "/httpbin/";

const PAGE_200: &str = r#"<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>
"#;

const PAGE_400: &str = r#"<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>
"#;

const PAGE_500: &str = r#"<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Relay(&'a str),
    Video,
    YourProblem,
    MyProblem,
    Home,
}

impl<'a> Route<'a> {
    pub fn resolve(target: &'a str) -> Self {
        if let Some(rest) = target.strip_prefix(RELAY_PREFIX) {
            return Route::Relay(rest);
        }
        match target {
            "/video" => Route::Video,
            "/yourproblem" => Route::YourProblem,
            "/myproblem" => Route::MyProblem,
            _ => Route::Home,
        }
    }
}

pub struct Router {
    relay: Option<Relay>,
    video_path: PathBuf,
}

impl Router {
    pub fn new(cfg: &Config) -> Self {
        let relay = match Relay::new(&cfg.relay) {
            Ok(relay) => Some(relay),
            Err(e) => {
                warn!(error = %e, "relay disabled");
                None
            }
        };

        Self {
            relay,
            video_path: PathBuf::from(&cfg.assets.video_path),
        }
    }

    async fn route(&self, req: &Request, w: &mut ResponseWriter) -> Result<(), WriteError> {
        match Route::resolve(&req.request_line.target) {
            Route::Relay(path) => self.relay(path, w).await,
            Route::Video => self.video(w).await,
            Route::YourProblem => write_html(w, StatusCode::BadRequest, PAGE_400).await,
            Route::MyProblem => write_html(w, StatusCode::InternalServerError, PAGE_500).await,
            Route::Home => write_html(w, StatusCode::Ok, PAGE_200).await,
        }
    }

    async fn relay(&self, path: &str, w: &mut ResponseWriter) -> Result<(), WriteError> {
        let Some(relay) = &self.relay else {
            return write_html(w, StatusCode::InternalServerError, PAGE_500).await;
        };

        if let Err(e) = relay.relay(path, w).await {
            error!(error = %e, path, "relay failed");
            // Only answerable if the origin failed before anything was written.
            return write_html(w, StatusCode::InternalServerError, PAGE_500).await;
        }
        Ok(())
    }

    async fn video(&self, w: &mut ResponseWriter) -> Result<(), WriteError> {
        let file = match tokio::fs::read(&self.video_path).await {
            Ok(file) => file,
            Err(e) => {
                error!(error = %e, path = %self.video_path.display(), "failed to read video");
                return write_html(w, StatusCode::InternalServerError, PAGE_500).await;
            }
        };

        let mut headers = default_headers(file.len());
        headers.replace("Content-Type", "video/mp4");
        w.write_status_line(StatusCode::Ok).await?;
        w.write_headers(&headers).await?;
        w.write_body(&file).await?;
        Ok(())
    }
}

impl Handler for Router {
    fn call<'a>(&'a self, req: &'a Request, w: &'a mut ResponseWriter) -> HandlerFuture<'a> {
        Box::pin(async move {
            if let Err(e) = self.route(req, w).await {
                error!(error = %e, target = %req.request_line.target, "failed to write response");
            }
        })
    }
}

async fn write_html(w: &mut ResponseWriter, status: StatusCode, page: &str) -> Result<(), WriteError> {
    let mut headers = default_headers(page.len());
    headers.replace("Content-Type", "text/html");
    w.write_status_line(status).await?;
    w.write_headers(&headers).await?;
    w.write_body(page.as_bytes()).await?;
    Ok(())
}
