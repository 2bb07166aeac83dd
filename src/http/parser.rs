//! Incremental HTTP/1.1 request parser.
//!
//! [`RequestParser`] is a state machine fed with whatever bytes are
//! available. Each call to [`RequestParser::parse`] reports how many bytes
//! it consumed; `Ok(0)` means more data is needed before any progress can be
//! made. The caller drops the consumed prefix and calls again with the rest
//! plus any newly read bytes.
//!
//! [`read_request`] is the driving loop used by the server: it owns a read
//! buffer that grows on demand up to a fixed cap, and bounds each read with
//! an idle timeout.

use std::io;
use std::time::Duration;

use async_std::io::{Read, ReadExt};
use thiserror::Error;
use tracing::trace;

use crate::http::headers::{HeaderError, find_crlf};
use crate::http::request::{Request, RequestLine};
use crate::http::status::StatusCode;

const CRLF_LEN: usize = 2;
const SUPPORTED_VERSION: &[u8] = b"HTTP/1.1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid request line")]
    InvalidRequestLine,

    #[error("invalid http method")]
    InvalidHttpMethod,

    #[error("invalid http version")]
    InvalidHttpVersion,

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("invalid content-length {0:?}")]
    InvalidContentLength(String),

    #[error("insufficient data for declared content-length")]
    InsufficientData,

    #[error("request in error state")]
    InErrorState,
}

/// Failure of the driving loop, wrapping protocol errors from the parser.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to read request: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed before the request was complete")]
    UnexpectedEof,

    #[error("request exceeds the {0} byte read buffer")]
    TooLarge(usize),

    #[error("timed out waiting for request data")]
    Timeout,
}

impl RequestError {
    /// Status to answer with, or `None` when the connection should just be
    /// dropped (transport failures).
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Parse(_) | RequestError::TooLarge(_) => Some(StatusCode::BAD_REQUEST),
            RequestError::Io(_) | RequestError::UnexpectedEof | RequestError::Timeout => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParserState {
    Init,
    ParsingHeaders,
    ParsingBody,
    Done,
    Error,
}

pub struct RequestParser {
    request: Request,
    state: ParserState,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            request: Request::new(),
            state: ParserState::Init,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// True once the parser reached `Done` or `Error`.
    pub fn is_finished(&self) -> bool {
        self.state >= ParserState::Done
    }

    /// The parsed request, available only in the `Done` state.
    pub fn into_request(self) -> Option<Request> {
        match self.state {
            ParserState::Done => Some(self.request),
            _ => None,
        }
    }

    /// Feeds `data` to the state machine and returns the bytes consumed.
    ///
    /// Any error moves the parser to the sticky `Error` state; every later
    /// call fails with [`ParseError::InErrorState`].
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        if self.state == ParserState::Error {
            return Err(ParseError::InErrorState);
        }

        self.advance(data).inspect_err(|_| self.state = ParserState::Error)
    }

    fn advance(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut read = 0;

        loop {
            match self.state {
                ParserState::Init => {
                    let Some((line, n)) = parse_request_line(&data[read..])? else {
                        break;
                    };
                    self.request.request_line = line;
                    read += n;
                    self.state = ParserState::ParsingHeaders;
                }
                ParserState::ParsingHeaders => {
                    let (n, done) = self.request.headers.parse(&data[read..])?;
                    read += n;
                    if !done {
                        break;
                    }
                    self.state = ParserState::ParsingBody;
                }
                ParserState::ParsingBody => {
                    let Some(value) = self.request.headers.get("content-length") else {
                        self.state = ParserState::Done;
                        break;
                    };
                    let length = value
                        .parse::<usize>()
                        .map_err(|_| ParseError::InvalidContentLength(value.to_string()))?;

                    // Bytes past the declared length belong to no one: no pipelining
                    let available = &data[read..];
                    if available.len() < length {
                        break;
                    }
                    self.request.body = available[..length].to_vec();
                    read += length;
                    self.state = ParserState::Done;
                }
                ParserState::Done => break,
                ParserState::Error => return Err(ParseError::InErrorState),
            }
        }

        Ok(read)
    }
}

/// Parses `METHOD SP target SP HTTP/1.1 CRLF`.
///
/// Returns `None` while no full line is available, otherwise the line and the
/// number of bytes it occupied including the terminator.
fn parse_request_line(data: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let Some(line_end) = find_crlf(data) else {
        return Ok(None);
    };

    let parts: Vec<&[u8]> = data[..line_end].split(|&b| b == b' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(ParseError::InvalidRequestLine);
    };

    if method.is_empty() || !method.iter().all(u8::is_ascii_uppercase) {
        return Err(ParseError::InvalidHttpMethod);
    }

    if *version != SUPPORTED_VERSION {
        return Err(ParseError::InvalidHttpVersion);
    }

    let request_line = RequestLine {
        method: String::from_utf8_lossy(method).into_owned(),
        target: String::from_utf8_lossy(target).into_owned(),
        http_version: "1.1".to_string(),
    };

    Ok(Some((request_line, line_end + CRLF_LEN)))
}

/// Buffer and timeout settings for [`read_request`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub initial_capacity: usize,
    pub max_capacity: usize,
    pub idle_timeout: Option<Duration>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            max_capacity: 1024 * 1024,
            idle_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Reads from `reader` until one complete request is parsed.
///
/// The unconsumed tail of the buffer is shifted to the front after every
/// parse. When the buffer is full it doubles, up to `max_capacity`.
pub async fn read_request<R>(reader: &mut R, opts: &ReadOptions) -> Result<Request, RequestError>
where
    R: Read + Unpin,
{
    let max_capacity = opts.max_capacity.max(1);
    let mut parser = RequestParser::new();
    let mut buf = vec![0; opts.initial_capacity.clamp(1, max_capacity)];
    let mut len = 0;

    while !parser.is_finished() {
        if len == buf.len() {
            if buf.len() >= max_capacity {
                return Err(RequestError::TooLarge(max_capacity));
            }
            let grown = (buf.len() * 2).min(max_capacity);
            trace!(from = buf.len(), to = grown, "growing request buffer");
            buf.resize(grown, 0);
        }

        let n = match read_some(reader, &mut buf[len..], opts.idle_timeout).await {
            Ok(0) => return Err(RequestError::UnexpectedEof),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                return Err(match parser.state() {
                    ParserState::ParsingBody => ParseError::InsufficientData.into(),
                    _ => RequestError::Timeout,
                });
            }
            Err(e) => return Err(RequestError::Io(e)),
        };
        len += n;

        let consumed = parser.parse(&buf[..len])?;
        buf.copy_within(consumed..len, 0);
        len -= consumed;
    }

    parser
        .into_request()
        .ok_or(RequestError::Parse(ParseError::InErrorState))
}

async fn read_some<R>(reader: &mut R, buf: &mut [u8], idle: Option<Duration>) -> io::Result<usize>
where
    R: Read + Unpin,
{
    match idle {
        Some(dur) => async_std::io::timeout(dur, reader.read(buf)).await,
        None => reader.read(buf).await,
    }
}
