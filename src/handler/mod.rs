//! Demo application served by the `barehttp` binary.

mod responses;
mod router;
mod static_files;
mod stream;

use std::path::PathBuf;

use async_std::net::TcpStream;
use barehttp::http::{Request, ResponseWriter};
use barehttp::net::StreamingHandler;
use futures_util::future::BoxFuture;
use tracing::warn;

pub struct App {
    assets_dir: PathBuf,
}

impl App {
    pub fn new(assets_dir: PathBuf) -> Self {
        Self { assets_dir }
    }
}

impl StreamingHandler for App {
    fn handle<'a>(
        &'a self,
        w: &'a mut ResponseWriter<TcpStream>,
        req: &'a Request,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Err(err) = router::route(&self.assets_dir, w, req).await {
                warn!(path = req.target(), error = %err, "failed to write response");
            }
        })
    }
}
