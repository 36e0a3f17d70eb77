/// Server management module for ephemeral-redis.
///
/// This module spawns the server, waits for it to become ready, and stops
/// it again with escalating signals. All public lifecycle methods are
/// instrumented with `tracing` spans.
///
/// # Components
///
/// * `process` - The supervised server handle and its state machine
/// * `readiness` - Log polling for the readiness marker
/// * `shutdown` - `SIGTERM` → `SIGINT` → `SIGKILL` escalation
/// * `lifecycle` - Drop guard and exit hook for servers nobody stopped
/// * `connect` - Connection info derived from the merged options
///
/// # Examples
///
/// Scoped use, stopping the server when the closure returns:
///
/// ```no_run
/// use ephemeral_redis::config::Config;
/// use ephemeral_redis::server::{ConnectInfo, ServerProcess};
///
/// # async fn demo() -> ephemeral_redis::Result<()> {
/// ServerProcess::run(Config::new(), |info: ConnectInfo| async move {
///     let socket = info.path().expect("unix socket by default");
///     println!("connect to {}", socket.display());
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
///
/// Manual start and stop:
///
/// ```no_run
/// use ephemeral_redis::config::Config;
/// use ephemeral_redis::server::{ServerProcess, ServerStatus};
///
/// # async fn demo() -> ephemeral_redis::Result<()> {
/// let mut server = ServerProcess::new(Config::new().with_option("bind", "127.0.0.1").with_option("port", 6391));
/// server.start().await?;
/// assert_eq!(server.status(), ServerStatus::Ready);
/// println!("{:?}", server.connect_info());
/// server.stop().await?;
/// server.stop().await?; // no-op
/// # Ok(())
/// # }
/// ```
pub mod connect;
pub mod lifecycle;
mod process;
mod readiness;
pub mod shutdown;

pub use connect::ConnectInfo;
pub use lifecycle::{is_registered, stop_all_registered, LifecycleGuard};
pub use process::{ServerId, ServerProcess, ServerStatus};
pub use shutdown::{process_exists, ESCALATION};
