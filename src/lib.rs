//! Listening analytics for Spotify, behind a rate-limit aware gateway.
//!
//! All upstream traffic of a session flows through one [`gateway::Gateway`], which
//! combines a response cache, a circuit breaker, a request window and adaptive backoff.
//! The [`paginator`] materializes collections on top of it, and the [`analytics`] layer
//! reduces them into ranked playlists and tracks and genre, mood and energy histograms.
//!
//! # Modules
//!
//! - `analytics` - Activity scoring, histograms and the best effort analytics service
//! - `api` - HTTP handlers of the analytics server
//! - `cli` - Command-line interface implementations
//! - `config` - Environment loading and typed configuration
//! - `error` - Error signals and error types
//! - `gateway` - Backoff, request window, circuit breaker, cache and the gateway itself
//! - `management` - Session token handling
//! - `paginator` - Sequential offset pagination
//! - `server` - Axum server wiring and shutdown handling
//! - `spotify` - Typed Spotify Web API client and HTTP transport
//! - `types` - Upstream projections, payloads and table rows
//! - `utils` - Small shared helpers
//!
//! # Example
//!
//! ```ignore
//! use sporlytics::{cli, config};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> sporlytics::Res<()> {
//!     config::load_env().await?;
//!     let service = cli::session(CancellationToken::new()).await?;
//!     let genres = service.get_top_genres().await?;
//!     println!("{:?}", genres.data);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod management;
pub mod paginator;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// Result alias for application plumbing where any error ends the operation.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Accepts the same arguments as `println!`.
///
/// ```ignore
/// info!("Found {} playlists", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits with status 1.
///
/// Only for conditions the user has to fix before anything else can work, such as a
/// missing session. The macro diverges, so it can stand in for a value:
///
/// ```ignore
/// let addr = match addr.parse::<SocketAddr>() {
///     Ok(addr) => addr,
///     Err(e) => error!("Invalid server address: {}", e),
/// };
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
