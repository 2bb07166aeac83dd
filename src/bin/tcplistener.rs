//! Accepts connections one at a time and prints each parsed request.
//! Nothing is written back; the connection is closed after the dump.

use std::error::Error;

use async_std::net::TcpListener;
use barehttp::http::{ReadOptions, read_request};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tcplistener", about = "Print HTTP requests received on a TCP port")]
struct Cli {
    #[arg(short, long, default_value_t = 42069)]
    port: u16,
}

#[async_std::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "tcplistener=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let listener = TcpListener::bind(("127.0.0.1", cli.port)).await?;
    info!(address = %listener.local_addr()?, "listening");

    let opts = ReadOptions::default();
    loop {
        let (mut stream, peer) = listener.accept().await?;
        info!(%peer, "connection accepted");

        match read_request(&mut stream, &opts).await {
            Ok(request) => println!("{request}"),
            Err(err) => warn!(%peer, error = %err, "failed to read request"),
        }
        info!(%peer, "connection closed");
    }
}
