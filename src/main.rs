use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sporlytics::{cli, config, error, server, types::TimeRange};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Summary of playlists and listening activity
    Overview,

    /// Genre distribution of your top artists
    Genres,

    /// Mood and energy profile of your top tracks
    Moods,

    /// Rank your playlists by activity
    Playlists(PlaylistsOptions),

    /// Rank tracks by how much you listen to them
    Tracks(TracksOptions),

    /// Serve the analytics over HTTP
    Serve,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct PlaylistsOptions {
    /// Number of playlists to show
    #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..=50))]
    pub limit: u16,
}

#[derive(Parser, Debug, Clone)]
pub struct TracksOptions {
    /// Listening period of the top tracks
    #[clap(long, value_enum, default_value_t = TimeRange::Medium)]
    pub time_range: TimeRange,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sporlytics={}", config::log_level(default_level)).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    init_tracing(match cli.command {
        Command::Serve => "info",
        _ => "warn",
    });

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        server::shutdown_signal().await;
        on_signal.cancel();
    });

    let service = match cli::session(shutdown.clone()).await {
        Ok(service) => service,
        Err(e) => error!("Cannot start a Spotify session: {}. Please sign in again.", e),
    };

    match cli.command {
        Command::Overview => cli::overview(&service).await,
        Command::Genres => cli::genres(&service).await,
        Command::Moods => cli::moods(&service).await,
        Command::Playlists(opt) => cli::playlists(&service, opt.limit as usize).await,
        Command::Tracks(opt) => cli::tracks(&service, opt.time_range).await,
        Command::Serve => cli::serve(service, shutdown).await,
        Command::Completions(_) => {}
    }
}
