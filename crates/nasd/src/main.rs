//! nasd daemon entry point.
//!
//! Initializes logging, wires the coordinator to its platform adapters, and
//! runs the event loop until interrupted.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nas_types::UnitId;
use nasd::coordinator::{Collaborators, Coordinator, Role};
use nasd::platform::{
    OfflineBackend, StandaloneHardware, StandaloneMacTable, StandalonePortCompat,
    StandaloneTransport, StandaloneVlanQos,
};
use nasd::session::MacAuthEngine;

#[derive(Parser)]
#[command(name = "nasd", about = "Port admission control daemon", version)]
struct Args {
    /// Stack unit id of this switch.
    #[arg(long, default_value_t = 1)]
    unit: u8,

    /// Start as a replica instead of the primary.
    #[arg(long)]
    replica: bool,

    /// Log verbosely.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("--- Starting nasd ---");

    let unit = match UnitId::new(args.unit) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("invalid unit id: {e}");
            return ExitCode::FAILURE;
        }
    };
    let role = if args.replica { Role::Replica } else { Role::Primary };

    let (signal_tx, signal_rx) = nasd::daemon::signal_channel();
    let (_event_tx, event_rx) = nasd::daemon::event_channel();

    let coordinator = Arc::new(Coordinator::new(
        unit,
        role,
        Collaborators {
            engine: Arc::new(MacAuthEngine::new(signal_tx)),
            backend: Arc::new(OfflineBackend::default()),
            overrides: Arc::new(StandaloneVlanQos),
            mac_table: Arc::new(StandaloneMacTable),
            hardware: Arc::new(StandaloneHardware),
            transport: Arc::new(StandaloneTransport),
            compat: Arc::new(StandalonePortCompat),
        },
    ));

    info!(%unit, ?role, "coordinator ready");

    tokio::select! {
        _ = nasd::daemon::run(coordinator, event_rx, signal_rx) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }

    ExitCode::SUCCESS
}
