use async_std::io::Write;
use barehttp::http::{Headers, ResponseWriter, StatusCode, WriteError, default_headers};
use sha2::{Digest, Sha256};

use crate::handler::responses;

const MAX_CHUNKS: usize = 100;

/// Streams `count` lines as separate chunks, followed by the SHA-256 and
/// length of everything sent as trailers.
pub async fn serve<W>(w: &mut ResponseWriter<W>, count: &str) -> Result<(), WriteError>
where
    W: Write + Unpin,
{
    let count = match count.parse::<usize>() {
        Ok(n) if n <= MAX_CHUNKS => n,
        _ => return responses::bad_request(w).await,
    };

    let mut headers = default_headers(0);
    headers.remove("Content-Length");
    headers.set("Content-Type", "text/plain");
    headers.set("Transfer-Encoding", "chunked");
    headers.set("Trailer", "X-Content-SHA256, X-Content-Length");

    w.write_status_line(StatusCode::OK).await?;
    w.write_headers(&headers).await?;

    let mut hasher = Sha256::new();
    let mut total = 0;
    for i in 0..count {
        let chunk = format!("{{\"id\": {i}}}\n");
        hasher.update(chunk.as_bytes());
        total += chunk.len();
        w.write_chunked_body(chunk.as_bytes()).await?;
    }
    w.write_chunked_body_done().await?;

    let mut trailers = Headers::new();
    trailers.set("X-Content-SHA256", format!("{:x}", hasher.finalize()));
    trailers.set("X-Content-Length", total.to_string());
    w.write_trailers(&trailers).await
}
