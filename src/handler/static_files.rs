use std::path::Path;

use async_std::io::Write;
use barehttp::http::{ResponseWriter, StatusCode, WriteError, default_headers};
use tracing::warn;

use crate::handler::responses;

/// Sends the whole file as a fixed-length body.
pub async fn serve<W>(w: &mut ResponseWriter<W>, path: &Path) -> Result<(), WriteError>
where
    W: Write + Unpin,
{
    let body = match async_std::fs::read(path).await {
        Ok(body) => body,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read asset");
            return responses::internal_server_error(w).await;
        }
    };

    let mut headers = default_headers(body.len());
    headers.set("Content-Type", guess_mime(path));

    w.write_status_line(StatusCode::OK).await?;
    w.write_headers(&headers).await?;
    w.write_body(&body).await?;
    Ok(())
}

fn guess_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("htm") | Some("html") => "text/html",
        Some("mp4") => "video/mp4",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
