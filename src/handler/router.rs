use std::path::Path;

use async_std::io::Write;
use barehttp::http::{Request, ResponseWriter, WriteError};

use crate::handler::{responses, static_files, stream};

pub async fn route<W>(
    assets_dir: &Path,
    w: &mut ResponseWriter<W>,
    req: &Request,
) -> Result<(), WriteError>
where
    W: Write + Unpin,
{
    let target = req.target();

    if target.contains("/yourproblem") {
        return responses::bad_request(w).await;
    }
    if target.contains("/myproblem") {
        return responses::internal_server_error(w).await;
    }
    if target.contains("/video") {
        return static_files::serve(w, &assets_dir.join("vim.mp4")).await;
    }
    if let Some(count) = target.strip_prefix("/stream/") {
        return stream::serve(w, count).await;
    }

    responses::ok(w).await
}
