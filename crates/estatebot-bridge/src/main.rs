//! Voice bridge binary: runs one session, then exits.
//!
//! Exits with status 1 when the session cannot start or fails.

use estatebot_bridge::{config, Bridge};
use estatebot_voice::{LiveKitTransport, Session, VoiceService};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("ESTATEBOT_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() -> ExitCode {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("estatebot.toml"));

    let config = match config::load_config(selected_config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "voice bridge failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::from_env()?;
    config.bridge.validate()?;

    let pool = estatebot_db::open_database(
        &config.database.path,
        config.database.runtime_settings(),
    )?;

    let service = VoiceService::new(config.bridge.livekit.clone());
    let transport = Arc::new(LiveKitTransport::new(
        service,
        config.bridge.deepgram.input_sample_rate,
    ));
    let bridge = Bridge::new(&config.bridge, transport, pool)?;

    let report = bridge.run(&session).await?;
    tracing::info!(
        frames = report.frames_forwarded,
        utterances = report.utterances_handled,
        turns = report.persisted_turns,
        state = %report.final_state,
        "voice session finished"
    );
    Ok(())
}
