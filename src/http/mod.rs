//! HTTP/1.1 protocol machinery: header collection, incremental request
//! parsing and ordered response writing. Nothing in here touches sockets
//! directly; readers and writers are any `async_std::io` stream.

pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;

pub use headers::{HeaderError, Headers};
pub use parser::{ParseError, ParserState, ReadOptions, RequestError, RequestParser, read_request};
pub use request::{Request, RequestLine};
pub use response::{ResponseWriter, WriteError, WritePhase, default_headers};
pub use status::StatusCode;
