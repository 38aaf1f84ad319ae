//! `rovd` – drive daemon for a remotely operated vehicle.
//!
//! Loads the actuator configuration, builds the fleet, and feeds it
//! commands from a line-based source on stdin until EOF, `quit`, or
//! Ctrl-C. The fleet is always driven back to neutral and disarmed before
//! the process exits.

mod config;

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use rovd_types::Command;

const DEFAULT_CONFIG: &str = "/etc/rovd.toml";

fn main() -> ExitCode {
    let config_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_CONFIG.to_string()),
    );
    let config = match config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rovd: {e}");
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins; the config's log_level is the fallback.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "no Ctrl-C handler; stop with `quit`");
    }

    let mut fleet = config.build_fleet();
    info!(
        actuators = fleet.len(),
        config = %config_path.display(),
        "fleet ready"
    );
    fleet.start();

    // Line-based command source. One command per line; `status` reports the
    // authoritative levels by name.
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "quit" | "exit" => break,
            "status" => println!("speed {} steering {}", fleet.speed(), fleet.steering()),
            _ => match line.parse::<Command>() {
                Ok(command) => fleet.apply(command),
                Err(e) => eprintln!("rovd: {e}"),
            },
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
    }

    info!("stopping fleet");
    fleet.stop();
    ExitCode::SUCCESS
}
