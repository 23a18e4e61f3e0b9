use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, env = "PORT", default_value = "8080")]
    port: u16,
    /// Outbound messages a player may lag behind before being dropped
    #[clap(long, default_value = "16")]
    outbox: usize,
    /// Capacity of the command queue shared by all players
    #[clap(long, default_value = "1024")]
    queue: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        outbox_capacity: args.outbox.max(1),
        queue_capacity: args.queue.max(1),
    };

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
