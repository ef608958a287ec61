//! Tribute Page - headless run of the birthday page's background music

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tribute_audio::ControllerConfig;

mod page;
mod sections;

use page::{Policy, Visit};

#[derive(Parser)]
#[command(name = "tribute-page")]
#[command(about = "Simulated visit to the birthday tribute page", long_about = None)]
struct Cli {
    /// Browser autoplay behaviour to simulate
    #[arg(long, value_enum, default_value_t = Policy::Allowed)]
    policy: Policy,

    /// Start with the audio context suspended
    #[arg(long)]
    suspended_context: bool,

    /// Silently stop playback once it is running
    #[arg(long)]
    interrupt: bool,

    /// Never click the page
    #[arg(long)]
    no_gesture: bool,

    /// Pause and resume with the music button
    #[arg(long)]
    toggle: bool,

    /// Print status changes as JSON lines
    #[arg(long)]
    json: bool,

    /// Configuration file path
    #[arg(short, long, env = "TRIBUTE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tribute_audio=info,tribute_page=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => ControllerConfig::load_from(Some(path))?,
        None => ControllerConfig::load()?,
    };
    info!("Background track: {}", config.source_url());

    let visit = Visit {
        policy: cli.policy,
        suspended_context: cli.suspended_context,
        interrupt: cli.interrupt,
        gesture: !cli.no_gesture,
        toggle: cli.toggle,
        json: cli.json,
    };

    let summary = page::run(config, &visit).await;

    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        info!(
            "Visit finished: {} ({} session(s), {} play call(s), {} pause call(s), {} volume step(s))",
            summary.final_status,
            summary.sessions_created,
            summary.play_calls,
            summary.pause_calls,
            summary.volume_steps
        );
    }

    Ok(())
}
