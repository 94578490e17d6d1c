mod commands;

use clap::Parser;
use commands::{execute_command, Commands};
use scrobble_harvest::{ClientConfig, ClientEvent, LastFmClient};

/// Last.fm listening history harvester
#[derive(Parser)]
#[command(
    name = "scrobble-harvest",
    about = "Fetch Last.fm listening history, charts and duplicate scrobbles",
    long_about = None
)]
struct Cli {
    /// Show detailed debug information
    #[arg(long, global = true)]
    verbose: bool,

    /// Query this user instead of FM_USERNAME
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            eprintln!();
            eprintln!("Please set the following environment variables:");
            eprintln!("  FMKEY=your_lastfm_api_key");
            eprintln!("  FM_USERNAME=your_lastfm_username");
            std::process::exit(1);
        }
    };
    if let Some(user) = args.user {
        config.username = user;
    }
    log::debug!("Using username: {}", config.username);

    let client = LastFmClient::with_http_client(
        Box::new(http_client::native::NativeClient::new()),
        config,
    );

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::RetryScheduled {
                    error_code,
                    attempt,
                    max_retries,
                    delay_ms,
                    ..
                } => log::warn!(
                    "Last.fm busy (code {error_code}), retry {attempt}/{max_retries} in {delay_ms}ms"
                ),
                ClientEvent::PageFetched {
                    method,
                    page,
                    total_pages,
                    ..
                } => log::debug!("{method}: page {page}/{total_pages}"),
                _ => {}
            }
        }
    });

    if let Err(e) = execute_command(args.command, &client).await {
        eprintln!("❌ Command failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}
