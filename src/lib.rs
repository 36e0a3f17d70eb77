/*!
 # ephemeral-redis

 Launch a throwaway `redis-server` for a test or short-lived program, and
 make sure it is gone afterwards.

 ## Overview

 ephemeral-redis provides functionality to:
 - Render server options into a config file inside a private scratch directory
 - Spawn the server with its output captured in a log file
 - Wait for the server's readiness line, or report its log if it dies or hangs
 - Stop the server with `SIGTERM`, `SIGINT`, then `SIGKILL`
 - Stop leftover servers when a handle is dropped or the process exits

 ## Basic Usage

 ```no_run
 use ephemeral_redis::{Config, ServerProcess, Result};

 #[tokio::main]
 async fn main() -> Result<()> {
     // Unix socket in a fresh scratch directory, TCP disabled
     ServerProcess::run(Config::new(), |info| async move {
         println!("redis socket: {}", info);
     })
     .await?;

     // Or on a TCP port, started and stopped by hand
     let config = Config::new()
         .with_option("bind", "127.0.0.1")
         .with_option("port", 6390);
     let mut server = ServerProcess::new(config);
     let info = server.start().await?;
     println!("redis url: {:?}", info.and_then(|i| i.url().map(str::to_string)));
     server.stop().await?;

     Ok(())
 }
 ```

 ## Features

 - **Config passthrough**: any `redis.conf` directive, in insertion order
 - **Readiness detection**: case-insensitive log matching with a timeout
 - **Failure diagnostics**: startup errors carry the full server log
 - **Guaranteed cleanup**: drop guard plus an exit hook, both fork-aware
 - **Async Support**: built on tokio

 ## License

 This project is licensed under the terms in the LICENSE file.
*/

#[cfg(not(unix))]
compile_error!("ephemeral-redis controls processes with POSIX signals and only supports Unix");

pub mod config;
pub mod error;
pub mod owner;
pub mod scratch;
pub mod server;

pub use config::{Config, ConfigValue, ServerConfig};
pub use error::{Error, Result, StartupFailure};
pub use owner::OwnerTag;
pub use scratch::ScratchDirectory;
pub use server::{ConnectInfo, ServerId, ServerProcess, ServerStatus};
