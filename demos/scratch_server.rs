use ephemeral_redis::error::Result;
use ephemeral_redis::{Config, ServerProcess};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG=ephemeral_redis=debug shows each lifecycle step
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    tracing::info!("Starting scratch_server example");

    // Optional launcher config as the first argument, defaults otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::new().with_option("save", "").with_option("appendonly", false),
    };

    // Scoped: the server is stopped when the closure finishes
    println!("Starting a scoped server...");
    let info = ServerProcess::run(config.clone(), |info| async move {
        println!("Connect with: {}", info);
        info
    })
    .await?;
    println!("Scoped server at {} has been stopped", info);

    // Manual: start, inspect, stop
    println!("\nStarting a server by hand...");
    let mut server = ServerProcess::new(config);
    if let Some(info) = server.start().await? {
        println!("Server {} (pid {:?}) ready at {}", server.id(), server.pid(), info);
    }
    if let Some(dir) = server.scratch_dir() {
        println!("Scratch directory: {}", dir.display());
    }

    let log = server.read_log().await?;
    println!("Server log so far:\n{}", log);

    server.stop().await?;
    println!("Server stopped, status {:?}", server.status());

    Ok(())
}
