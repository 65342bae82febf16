pub mod types;
pub mod error;
pub mod config;
pub mod routing;
pub mod topology;
pub mod advancement;
pub mod validator;
pub mod processor;
pub mod bracket;
pub mod script;
pub mod server;

pub use bracket::BracketInstance;
pub use error::BracketError;
pub use types::{
    AdvancementEffects, BracketOptions, BracketSnapshot, Format, Match, MatchId, MatchRecord, MatchStatus,
    ParticipantId, SeedingMode, Standing, StandingState,
};

use config::*;
use std::{fs, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: bracket-engine serve | bracket-engine replay <script.json>";

fn replay(path: &str, config: &EngineConfig) -> Result<(), String> {
    let script = script::load_script(&PathBuf::from(path))?;
    let bracket = script::run_script(&script, &config.bracket_options())?;
    let payload = serde_json::to_string_pretty(&bracket.inspect()).map_err(|e| e.to_string())?;
    println!("{payload}");
    Ok(())
}

fn serve(config: &EngineConfig) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("start runtime: {e}"))?;
    runtime.block_on(server::serve(&config.listen_addr, config.bracket_options()))
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();

    // Initialize tracing with rolling file output
    let logs_dir = logs_dir();
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Bracket engine starting");

    let config = match load_engine_config() {
        Ok(config) => config,
        Err(e) => {
            error!("config error: {e}");
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let outcome = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["serve"] | [] => serve(&config),
        ["replay", path] => replay(path, &config),
        _ => Err(USAGE.to_string()),
    };
    if let Err(e) = outcome {
        error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
