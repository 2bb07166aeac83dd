use async_std::io::Write;
use barehttp::http::{ResponseWriter, StatusCode, WriteError, default_headers};

pub const BAD_REQUEST_HTML: &str = "<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>";

pub const INTERNAL_SERVER_ERROR_HTML: &str = "<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>";

pub const OK_HTML: &str = "<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>";

pub async fn html<W>(
    w: &mut ResponseWriter<W>,
    status: StatusCode,
    page: &str,
) -> Result<(), WriteError>
where
    W: Write + Unpin,
{
    w.write_status_line(status).await?;
    w.write_headers(&default_headers(page.len())).await?;
    w.write_body(page.as_bytes()).await?;
    Ok(())
}

pub async fn bad_request<W: Write + Unpin>(w: &mut ResponseWriter<W>) -> Result<(), WriteError> {
    html(w, StatusCode::BAD_REQUEST, BAD_REQUEST_HTML).await
}

pub async fn internal_server_error<W: Write + Unpin>(
    w: &mut ResponseWriter<W>,
) -> Result<(), WriteError> {
    html(w, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR_HTML).await
}

pub async fn ok<W: Write + Unpin>(w: &mut ResponseWriter<W>) -> Result<(), WriteError> {
    html(w, StatusCode::OK, OK_HTML).await
}
