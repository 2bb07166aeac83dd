//! Connection server.
//!
//! This module owns everything that touches the listening socket:
//! - binding and accepting TCP connections,
//! - spawning one task per connection,
//! - driving [`read_request`] to completion,
//! - dispatching to the caller's [`Handler`] with a [`ResponseWriter`]
//!   bound to the connection.
//!
//! Protocol-level work (parsing, header rules, response ordering) lives in
//! the [`http`](crate::http) module.
//!
//! ## Connection lifecycle
//!
//! 1. Accept a TCP connection
//! 2. Read and incrementally parse exactly one request
//! 3. Invoke the handler
//! 4. Flush, shut down the write half and drop the socket
//!
//! A malformed request is answered with `400 Bad Request` and a plaintext
//! body naming the error. Transport failures just drop the connection.
//!
//! ## Limitations
//!
//! - Every accepted connection gets its own task; nothing caps how many run
//!   at once.
//! - [`Server::close`] only stops accepting. Connections already being served
//!   run to completion on their own; nobody waits for them.
//! - Any accept error other than the shutdown signal is fatal: the accept
//!   loop stops and [`Server::join`] returns [`ServerError::Accept`]. There
//!   is no retry or backoff.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_std::channel::{self, Receiver, Sender};
use async_std::io::WriteExt;
use async_std::net::{TcpListener, TcpStream};
use async_std::task::{self, JoinHandle};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, select};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::http::parser::{ReadOptions, RequestError, read_request};
use crate::http::request::Request;
use crate::http::response::{ResponseWriter, WriteError, default_headers};
use crate::http::status::StatusCode;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    #[error("server already closed")]
    AlreadyClosed,
}

/// Failure reported by a [`Handler::Buffered`] handler.
///
/// The server sends its `Display` form as a plaintext line and closes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error from handler. {status_code}: {message}")]
pub struct HandlerError {
    pub status_code: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

pub type BufferedFn = dyn Fn(&mut Vec<u8>, &Request) -> Result<(), HandlerError> + Send + Sync;

/// A handler that drives the whole response through the [`ResponseWriter`].
pub trait StreamingHandler: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        w: &'a mut ResponseWriter<TcpStream>,
        req: &'a Request,
    ) -> BoxFuture<'a, ()>;
}

impl<F> StreamingHandler for F
where
    F: for<'a> Fn(&'a mut ResponseWriter<TcpStream>, &'a Request) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    fn handle<'a>(
        &'a self,
        w: &'a mut ResponseWriter<TcpStream>,
        req: &'a Request,
    ) -> BoxFuture<'a, ()> {
        self(w, req)
    }
}

/// The two handler shapes a server can dispatch to.
#[derive(Clone)]
pub enum Handler {
    /// Writes a body into a buffer; the server answers `200 OK` with the
    /// default headers and the buffered body.
    Buffered(Arc<BufferedFn>),
    /// Owns the full status/headers/body (or chunked) sequence.
    Streaming(Arc<dyn StreamingHandler>),
}

impl Handler {
    pub fn buffered<F>(f: F) -> Self
    where
        F: Fn(&mut Vec<u8>, &Request) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Handler::Buffered(Arc::new(f))
    }

    /// Wraps a closure, e.g. `|w, req| Box::pin(async move { ... })`.
    pub fn streaming<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut ResponseWriter<TcpStream>, &'a Request) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Handler::Streaming(Arc::new(f))
    }
}

/// Binds `0.0.0.0:<port>` and starts accepting in the background.
pub async fn serve(port: u16, handler: Handler) -> Result<Server, ServerError> {
    let config = ServerConfig {
        address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        port,
        ..ServerConfig::default()
    };
    Server::bind(config, handler).await
}

/// Handle to a running server.
///
/// Dropping the handle without calling [`Server::close`] also stops the
/// accept loop.
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Sender<()>,
    accept_loop: JoinHandle<Result<(), ServerError>>,
}

impl Server {
    pub async fn bind(config: ServerConfig, handler: Handler) -> Result<Self, ServerError> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(address = %local_addr, "listening");

        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown, shutdown_rx) = channel::bounded(1);
        let accept_loop = AcceptLoop {
            listener,
            closed: closed.clone(),
            shutdown: shutdown_rx,
            handler,
            read_options: Arc::new(config.read_options()),
        };

        Ok(Self {
            local_addr,
            closed,
            shutdown,
            accept_loop: task::spawn(accept_loop.run()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops accepting new connections. A second call fails with
    /// [`ServerError::AlreadyClosed`].
    pub fn close(&self) -> Result<(), ServerError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ServerError::AlreadyClosed);
        }

        self.shutdown.close();
        info!(address = %self.local_addr, "server closed");
        Ok(())
    }

    /// Waits for the accept loop to end and returns how it ended.
    ///
    /// `Ok(())` after [`Server::close`]; `Err(ServerError::Accept)` when the
    /// listener failed on its own.
    pub async fn join(self) -> Result<(), ServerError> {
        self.accept_loop.await
    }
}

/// Source of incoming connections for the accept loop.
trait Incoming: Send + Sync + 'static {
    fn accept(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>>;
}

impl Incoming for TcpListener {
    fn accept(&self) -> BoxFuture<'_, io::Result<(TcpStream, SocketAddr)>> {
        TcpListener::accept(self).boxed()
    }
}

struct AcceptLoop<L> {
    listener: L,
    closed: Arc<AtomicBool>,
    shutdown: Receiver<()>,
    handler: Handler,
    read_options: Arc<ReadOptions>,
}

impl<L: Incoming> AcceptLoop<L> {
    async fn run(self) -> Result<(), ServerError> {
        loop {
            // The shutdown channel only ever gets closed, never written to
            let accepted = select! {
                res = self.listener.accept().fuse() => Some(res),
                _ = self.shutdown.recv().fuse() => None,
            };
            let Some(accepted) = accepted else {
                break;
            };

            if self.closed.load(Ordering::Acquire) {
                break;
            }

            match accepted {
                Ok((stream, peer)) => {
                    task::spawn(handle_connection(
                        stream,
                        peer,
                        self.handler.clone(),
                        self.read_options.clone(),
                    ));
                }
                Err(err) => {
                    error!(error = %err, "accept failed, stopping server");
                    return Err(ServerError::Accept(err));
                }
            }
        }

        info!("stopped accepting connections");
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Handler,
    read_options: Arc<ReadOptions>,
) {
    debug!(%peer, "connection accepted");

    let request = match read_request(&mut stream, &read_options).await {
        Ok(request) => request,
        Err(err) => {
            reject(&mut stream, peer, err).await;
            close(&stream, peer);
            return;
        }
    };

    debug!(
        %peer,
        method = request.method(),
        target = request.target(),
        "request parsed"
    );

    let result = match &handler {
        Handler::Buffered(f) => respond_buffered(&mut stream, f.as_ref(), &request).await,
        Handler::Streaming(h) => {
            let mut w = ResponseWriter::new(stream);
            h.handle(&mut w, &request).await;
            let res = w.flush().await.map_err(WriteError::from);
            stream = w.into_inner();
            res
        }
    };

    if let Err(err) = result {
        warn!(%peer, error = %err, "failed to write response");
    }
    close(&stream, peer);
}

async fn respond_buffered(
    stream: &mut TcpStream,
    handler: &BufferedFn,
    request: &Request,
) -> Result<(), WriteError> {
    let mut body = Vec::new();
    if let Err(err) = handler(&mut body, request) {
        debug!(status = %err.status_code, "handler returned an error");
        stream.write_all(err.to_string().as_bytes()).await?;
        stream.flush().await?;
        return Ok(());
    }

    let mut w = ResponseWriter::new(stream);
    w.write_status_line(StatusCode::OK).await?;
    w.write_headers(&default_headers(body.len())).await?;
    w.write_body(&body).await?;
    w.flush().await?;
    Ok(())
}

/// Answers a request that could not be read. Best effort: write failures
/// are only logged.
async fn reject(stream: &mut TcpStream, peer: SocketAddr, err: RequestError) {
    let Some(status) = err.http_status() else {
        debug!(%peer, error = %err, "dropping connection");
        return;
    };

    warn!(%peer, error = %err, "rejecting malformed request");

    let body = format!("Failed to read request: {err}\n");
    let mut headers = default_headers(body.len());
    headers.set("Content-Type", "text/plain");

    let mut w = ResponseWriter::new(stream);
    let res = async {
        w.write_status_line(status).await?;
        w.write_headers(&headers).await?;
        w.write_body(body.as_bytes()).await?;
        w.flush().await?;
        Ok::<(), WriteError>(())
    }
    .await;

    if let Err(err) = res {
        debug!(%peer, error = %err, "failed to write error response");
    }
}

fn close(stream: &TcpStream, peer: SocketAddr) {
    if let Err(err) = stream.shutdown(Shutdown::Write) {
        debug!(%peer, error = %err, "failed to shut down connection");
    }
}
