use clap::Parser;
use log::{error, info};
use server::config::SimulationConfig;
use server::network::{Server, ServerOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Room ticks per second
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum concurrent clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Maximum players per room
    #[arg(long, default_value = "4")]
    max_room_players: usize,

    /// RON file with simulation tunables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for map generation and spawns (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if args.tick_rate == 0 {
        return Err("tick rate must be at least 1".into());
    }

    let mut simulation = match &args.config {
        Some(path) => {
            info!("Loading simulation config from {}", path.display());
            SimulationConfig::load(path)?
        }
        None => SimulationConfig::default(),
    };
    if args.seed.is_some() {
        simulation.seed = args.seed;
    }
    simulation.validate()?;

    let options = ServerOptions {
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate as f64),
        max_clients: args.max_clients,
        max_room_players: args.max_room_players,
        simulation,
    };

    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting server on {} at {} Hz (max {} clients, {} per room)",
        address, args.tick_rate, args.max_clients, args.max_room_players
    );

    let mut server = Server::new(&address, options).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
