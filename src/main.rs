mod handler;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use async_std::channel;
use barehttp::{Handler, Server, ServerConfig};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::handler::App;

#[derive(Debug, Parser)]
#[command(name = "barehttp", version, about = "Minimal HTTP/1.1 server on raw TCP sockets")]
struct Cli {
    /// TOML config file; defaults are used when it cannot be read
    #[arg(short, long, default_value = "barehttp.toml")]
    config: PathBuf,

    /// Overrides the port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[async_std::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "barehttp=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_file(&cli.config);
    if let Some(port) = cli.port {
        config.port = port;
    }

    let (signal_tx, signal_rx) = channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    })?;

    let app = App::new(config.assets_dir.clone());
    let server = Server::bind(config, Handler::Streaming(Arc::new(app))).await?;
    info!(address = %server.local_addr(), "server started");

    // A closed channel means the signal handler is gone; stop either way
    let _ = signal_rx.recv().await;

    server.close()?;
    server.join().await?;
    info!("server gracefully stopped");
    Ok(())
}
