//! A minimal HTTP/1.1 server written directly on TCP sockets.
//!
//! - [`http`]: header collection, incremental request parser and the ordered
//!   response writer (including chunked bodies with trailers).
//! - [`net`]: the connection server that accepts sockets and dispatches one
//!   request per connection to a [`Handler`].
//! - [`config`]: TOML-backed server settings.
//!
//! ```no_run
//! use barehttp::{Handler, serve};
//!
//! # async_std::task::block_on(async {
//! let server = serve(42069, Handler::buffered(|body, _req| {
//!     body.extend_from_slice(b"<h1>hello</h1>");
//!     Ok(())
//! }))
//! .await?;
//!
//! server.close()?;
//! server.join().await?;
//! # Ok::<(), barehttp::ServerError>(())
//! # });
//! ```

pub mod config;
pub mod http;
pub mod net;

pub use config::ServerConfig;
pub use http::{Headers, Request, ResponseWriter, StatusCode, default_headers};
pub use net::{Handler, HandlerError, Server, ServerError, serve};
