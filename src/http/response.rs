//! Ordered HTTP response emission.
//!
//! A [`ResponseWriter`] wraps the connection and only lets a handler write
//! the parts of a response in wire order: status line, headers, then either
//! one fixed body or a sequence of chunks closed by the last chunk and the
//! trailers. Calls made out of order fail before any byte is written and are
//! never reported to the peer.
//!
//! ```text
//! Start -> StatusLineWritten -> HeadersWritten -> Done
//!                                    |               ^
//!                                    +-- chunk* -- last chunk -- trailers
//! ```

use std::io;

use async_std::io::{Write, WriteExt};
use thiserror::Error;

use crate::http::headers::Headers;
use crate::http::status::StatusCode;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{0} already written")]
    AlreadyWritten(&'static str),

    #[error("cannot write {attempted} before {missing}")]
    OutOfOrder {
        attempted: &'static str,
        missing: &'static str,
    },

    #[error("cannot mix a fixed body with a chunked body")]
    MixedBody,

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WritePhase {
    Start,
    StatusLineWritten,
    HeadersWritten,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunked {
    Idle,
    Streaming,
    Finished,
}

/// Headers every response starts from: `Content-Length`, `Connection: close`
/// and an HTML `Content-Type`. Handlers adjust them before
/// [`ResponseWriter::write_headers`].
pub fn default_headers(content_len: usize) -> Headers {
    let mut headers = Headers::new();
    headers.set("Content-Length", content_len.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/html");
    headers
}

pub struct ResponseWriter<W> {
    writer: W,
    phase: WritePhase,
    chunked: Chunked,
}

impl<W: Write + Unpin> ResponseWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            phase: WritePhase::Start,
            chunked: Chunked::Idle,
        }
    }

    pub fn phase(&self) -> WritePhase {
        self.phase
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes `HTTP/1.1 <code> <reason>\r\n`.
    pub async fn write_status_line(&mut self, code: StatusCode) -> Result<(), WriteError> {
        if self.phase > WritePhase::Start {
            return Err(WriteError::AlreadyWritten("status line"));
        }

        let line = format!("HTTP/1.1 {} {}\r\n", code, code.reason());
        self.writer.write_all(line.as_bytes()).await?;
        self.phase = WritePhase::StatusLineWritten;
        Ok(())
    }

    /// Writes every header sorted by name, then the blank line.
    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), WriteError> {
        match self.phase {
            WritePhase::Start => {
                return Err(WriteError::OutOfOrder {
                    attempted: "headers",
                    missing: "status line",
                });
            }
            WritePhase::StatusLineWritten => {}
            WritePhase::HeadersWritten | WritePhase::Done => {
                return Err(WriteError::AlreadyWritten("headers"));
            }
        }

        self.write_header_block(headers).await?;
        self.phase = WritePhase::HeadersWritten;
        Ok(())
    }

    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.check_body_phase("body")?;
        if self.chunked != Chunked::Idle {
            return Err(WriteError::MixedBody);
        }

        self.writer.write_all(body).await?;
        self.phase = WritePhase::Done;
        Ok(body.len())
    }

    /// Writes one `<hex len>\r\n<bytes>\r\n` frame. An empty `chunk` still
    /// produces a frame; use [`write_chunked_body_done`] to end the body.
    ///
    /// [`write_chunked_body_done`]: ResponseWriter::write_chunked_body_done
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, WriteError> {
        self.check_body_phase("chunk")?;
        if self.chunked == Chunked::Finished {
            return Err(WriteError::AlreadyWritten("last chunk"));
        }

        let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
        frame.extend_from_slice(chunk);
        frame.extend_from_slice(b"\r\n");

        self.writer.write_all(&frame).await?;
        self.chunked = Chunked::Streaming;
        Ok(frame.len())
    }

    /// Writes the `0\r\n` last-chunk marker. Trailers must follow.
    pub async fn write_chunked_body_done(&mut self) -> Result<usize, WriteError> {
        self.check_body_phase("last chunk")?;
        if self.chunked == Chunked::Finished {
            return Err(WriteError::AlreadyWritten("last chunk"));
        }

        const LAST_CHUNK: &[u8] = b"0\r\n";
        self.writer.write_all(LAST_CHUNK).await?;
        self.chunked = Chunked::Finished;
        Ok(LAST_CHUNK.len())
    }

    /// Writes the trailer fields and the blank line closing chunked framing.
    /// Pass an empty collection to only close the framing.
    pub async fn write_trailers(&mut self, trailers: &Headers) -> Result<(), WriteError> {
        if self.phase == WritePhase::Done {
            return Err(WriteError::AlreadyWritten("trailers"));
        }
        if self.chunked != Chunked::Finished {
            return Err(WriteError::OutOfOrder {
                attempted: "trailers",
                missing: "last chunk",
            });
        }

        self.write_header_block(trailers).await?;
        self.phase = WritePhase::Done;
        Ok(())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }

    fn check_body_phase(&self, attempted: &'static str) -> Result<(), WriteError> {
        match self.phase {
            WritePhase::Start | WritePhase::StatusLineWritten => Err(WriteError::OutOfOrder {
                attempted,
                missing: "headers",
            }),
            WritePhase::HeadersWritten => Ok(()),
            WritePhase::Done => Err(WriteError::AlreadyWritten("body")),
        }
    }

    async fn write_header_block(&mut self, headers: &Headers) -> io::Result<()> {
        let mut block = headers.stringify();
        block.push_str("\r\n");
        self.writer.write_all(block.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> ResponseWriter<Vec<u8>> {
        ResponseWriter::new(Vec::new())
    }

    fn written(w: &ResponseWriter<Vec<u8>>) -> &str {
        std::str::from_utf8(w.get_ref()).unwrap()
    }

    #[async_std::test]
    async fn status_line() {
        let mut w = writer();
        w.write_status_line(StatusCode::OK).await.unwrap();
        assert_eq!(written(&w), "HTTP/1.1 200 OK\r\n");
    }

    #[async_std::test]
    async fn status_line_for_unknown_code_has_empty_reason() {
        let mut w = writer();
        w.write_status_line(StatusCode(418)).await.unwrap();
        assert_eq!(written(&w), "HTTP/1.1 418 \r\n");
    }

    #[async_std::test]
    async fn status_line_twice_fails_without_writing() {
        let mut w = writer();
        w.write_status_line(StatusCode::BAD_REQUEST).await.unwrap();
        let err = w.write_status_line(StatusCode::OK).await;
        assert!(matches!(err, Err(WriteError::AlreadyWritten(_))));
        assert_eq!(written(&w), "HTTP/1.1 400 Bad Request\r\n");
    }

    #[async_std::test]
    async fn full_fixed_length_response() {
        let mut w = writer();
        let body = b"<h1>hi</h1>";
        w.write_status_line(StatusCode::OK).await.unwrap();
        w.write_headers(&default_headers(body.len())).await.unwrap();
        assert_eq!(w.write_body(body).await.unwrap(), body.len());
        assert_eq!(w.phase(), WritePhase::Done);

        assert_eq!(
            written(&w),
            "HTTP/1.1 200 OK\r\n\
             connection: close\r\n\
             content-length: 11\r\n\
             content-type: text/html\r\n\
             \r\n\
             <h1>hi</h1>"
        );
    }

    #[async_std::test]
    async fn headers_before_status_line_fail() {
        let mut w = writer();
        let err = w.write_headers(&default_headers(0)).await;
        assert!(matches!(err, Err(WriteError::OutOfOrder { .. })));
        assert!(w.get_ref().is_empty());
    }

    #[async_std::test]
    async fn headers_twice_fails_without_writing() {
        let mut w = writer();
        w.write_status_line(StatusCode::OK).await.unwrap();
        w.write_headers(&default_headers(0)).await.unwrap();
        let before = w.get_ref().len();

        let mut extra = Headers::new();
        extra.set("X-Late", "1");
        assert!(matches!(
            w.write_headers(&extra).await,
            Err(WriteError::AlreadyWritten("headers"))
        ));
        assert_eq!(w.get_ref().len(), before);
        assert_eq!(w.phase(), WritePhase::HeadersWritten);

        // trailers have their own entry point after the last chunk
        w.write_chunked_body_done().await.unwrap();
        w.write_trailers(&extra).await.unwrap();
        assert!(written(&w).ends_with("0\r\nx-late: 1\r\n\r\n"));
    }

    #[async_std::test]
    async fn body_before_headers_fails_without_writing() {
        let mut w = writer();
        assert!(matches!(
            w.write_body(b"x").await,
            Err(WriteError::OutOfOrder { .. })
        ));

        w.write_status_line(StatusCode::OK).await.unwrap();
        let before = w.get_ref().len();
        assert!(w.write_body(b"x").await.is_err());
        assert_eq!(w.get_ref().len(), before);
    }

    #[async_std::test]
    async fn second_body_fails() {
        let mut w = writer();
        w.write_status_line(StatusCode::OK).await.unwrap();
        w.write_headers(&Headers::new()).await.unwrap();
        w.write_body(b"one").await.unwrap();
        assert!(matches!(
            w.write_body(b"two").await,
            Err(WriteError::AlreadyWritten(_))
        ));
        assert!(written(&w).ends_with("\r\n\r\none"));
    }

    #[async_std::test]
    async fn chunked_body_frames() {
        let mut w = writer();
        w.write_status_line(StatusCode::OK).await.unwrap();
        w.write_headers(&Headers::new()).await.unwrap();
        let head = w.get_ref().len();

        assert_eq!(w.write_chunked_body(b"abc").await.unwrap(), 8);
        w.write_chunked_body_done().await.unwrap();
        assert_eq!(&w.get_ref()[head..], b"3\r\nabc\r\n0\r\n");
    }

    #[async_std::test]
    async fn chunk_length_is_hex_and_empty_chunks_allowed() {
        let mut w = writer();
        w.write_status_line(StatusCode::OK).await.unwrap();
        w.write_headers(&Headers::new()).await.unwrap();
        let head = w.get_ref().len();

        w.write_chunked_body(&[b'x'; 26]).await.unwrap();
        w.write_chunked_body(b"").await.unwrap();
        let out = &w.get_ref()[head..];
        assert!(out.starts_with(b"1a\r\nxxxx"));
        assert!(out.ends_with(b"\r\n0\r\n\r\n"));
    }

    #[async_std::test]
    async fn chunked_response_with_trailers() {
        let mut w = writer();
        let mut headers = default_headers(0);
        headers.remove("Content-Length");
        headers.set("Transfer-Encoding", "chunked");
        headers.set("Trailer", "X-Content-Length");

        w.write_status_line(StatusCode::OK).await.unwrap();
        w.write_headers(&headers).await.unwrap();
        w.write_chunked_body(b"hello").await.unwrap();
        w.write_chunked_body_done().await.unwrap();

        let mut trailers = Headers::new();
        trailers.set("X-Content-Length", "5");
        w.write_trailers(&trailers).await.unwrap();
        assert_eq!(w.phase(), WritePhase::Done);

        assert_eq!(
            written(&w),
            "HTTP/1.1 200 OK\r\n\
             connection: close\r\n\
             content-type: text/html\r\n\
             trailer: X-Content-Length\r\n\
             transfer-encoding: chunked\r\n\
             \r\n\
             5\r\nhello\r\n\
             0\r\n\
             x-content-length: 5\r\n\
             \r\n"
        );
    }

    #[async_std::test]
    async fn trailers_require_last_chunk() {
        let mut w = writer();
        w.write_status_line(StatusCode::OK).await.unwrap();
        w.write_headers(&Headers::new()).await.unwrap();
        w.write_chunked_body(b"a").await.unwrap();
        assert!(matches!(
            w.write_trailers(&Headers::new()).await,
            Err(WriteError::OutOfOrder { .. })
        ));
    }

    #[async_std::test]
    async fn fixed_body_after_chunks_is_rejected() {
        let mut w = writer();
        w.write_status_line(StatusCode::OK).await.unwrap();
        w.write_headers(&Headers::new()).await.unwrap();
        w.write_chunked_body(b"a").await.unwrap();
        assert!(matches!(w.write_body(b"b").await, Err(WriteError::MixedBody)));
    }

    #[test]
    fn default_headers_content() {
        let headers = default_headers(42);
        assert_eq!(headers.get("Content-Length"), Some("42"));
        assert_eq!(headers.get("connection"), Some("close"));
        assert_eq!(headers.get("content-type"), Some("text/html"));
    }
}
