use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::http::connection::{Connection, ConnectionSettings};
use crate::server::Handler;

/// A running HTTP server.
///
/// The accept loop runs in its own task from the moment [`Server::bind`]
/// returns. Each accepted connection is served by an independent task.
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    accept_task: Option<JoinHandle<anyhow::Result<()>>>,
}

/// Source of incoming connections for the accept loop.
trait Accept: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    type Stream = TcpStream;

    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

impl Server {
    /// Binds `0.0.0.0:port` with default connection settings.
    pub async fn serve<H: Handler>(port: u16, handler: H) -> anyhow::Result<Self> {
        Self::bind(&format!("0.0.0.0:{port}"), handler, ConnectionSettings::default()).await
    }

    /// Binds `addr` and starts accepting connections.
    pub async fn bind<H: Handler>(addr: &str, handler: H, settings: ConnectionSettings) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        Ok(Self::start(listener, local_addr, handler, settings))
    }

    fn start<A: Accept, H: Handler>(
        listener: A,
        local_addr: SocketAddr,
        handler: H,
        settings: ConnectionSettings,
    ) -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let handler: Arc<dyn Handler> = Arc::new(handler);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            handler,
            settings,
            Arc::clone(&closed),
            Arc::clone(&shutdown),
        ));

        Self {
            local_addr,
            closed,
            shutdown,
            accept_task: Some(accept_task),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting connections. Safe to call more than once.
    ///
    /// Connections already accepted run to completion.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(addr = %self.local_addr, "closing listener");
            self.shutdown.notify_one();
        }
    }

    /// Waits for the accept loop to exit, without consuming the server.
    ///
    /// Returns the accept error that ended the loop, if it was not caused by
    /// [`close`](Self::close). Cancel-safe, so it can sit in a `select!`
    /// next to a shutdown signal. Once the loop has exited, later calls
    /// return `Ok(())`.
    pub async fn wait(&mut self) -> anyhow::Result<()> {
        let Some(task) = self.accept_task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.accept_task = None;
        result?
    }

    /// Waits for the accept loop to exit.
    pub async fn join(mut self) -> anyhow::Result<()> {
        self.wait().await
    }
}

async fn accept_loop<A: Accept>(
    listener: A,
    handler: Arc<dyn Handler>,
    settings: ConnectionSettings,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) -> anyhow::Result<()> {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.notified() => break,
            res = listener.accept() => res,
        };

        let (socket, peer) = match accepted {
            Ok(conn) => conn,
            Err(_) if closed.load(Ordering::SeqCst) => break,
            Err(e) => {
                error!(error = %e, "accept failed, stopping accept loop");
                return Err(e.into());
            }
        };
        info!("Accepted connection from {}", peer);

        let conn = Connection::new(socket, Arc::clone(&handler), settings.clone()).with_peer(peer);
        tokio::spawn(async move {
            if let Err(e) = conn.run().await {
                error!("Connection error from {}: {}", peer, e);
            }
        });
    }

    // Dropping the listener closes the socket.
    drop(listener);
    info!("accept loop stopped");
    Ok(())
}
