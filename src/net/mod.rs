pub mod server;

pub use server::{BufferedFn, Handler, HandlerError, Server, ServerError, StreamingHandler, serve};
