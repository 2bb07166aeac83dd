#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_std::io::{Read, ReadExt, WriteExt};
use async_std::net::TcpStream;
use barehttp::{Handler, Server, ServerConfig};

/// Hands out at most `chunk` bytes per read. Once the data runs out it
/// either reports end-of-stream or, with `hang`, never becomes ready again.
pub struct ChunkReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    hang: bool,
}

impl ChunkReader {
    pub fn new(data: &[u8], chunk: usize) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            chunk,
            hang: false,
        }
    }

    pub fn hanging(data: &[u8], chunk: usize) -> Self {
        Self {
            hang: true,
            ..Self::new(data, chunk)
        }
    }
}

impl Read for ChunkReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        if this.pos >= this.data.len() && this.hang {
            return Poll::Pending;
        }

        let end = (this.pos + this.chunk).min(this.data.len());
        let n = (end - this.pos).min(buf.len());
        buf[..n].copy_from_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(n))
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        read_timeout: Some(Duration::from_millis(300)),
        ..ServerConfig::default()
    }
}

pub async fn start(handler: Handler) -> Server {
    Server::bind(test_config(), handler)
        .await
        .expect("bind test server")
}

/// Writes `raw`, then reads until the server closes the connection.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(raw).await.expect("write request");
    read_all(&mut stream).await
}

pub async fn read_all(stream: &mut TcpStream) -> String {
    let mut response = Vec::new();
    // a reset after the server closed still leaves what was received
    let _ = stream.read_to_end(&mut response).await;
    String::from_utf8_lossy(&response).into_owned()
}
