//! Replay hub - feeds recorded coordinator output through a live hub
//!
//! Run with: cargo run --example replay_coordinator -- [capabilities.json]
//!
//! Reads JSON values from stdin, one per line, and emits each as a
//! coordinator firehose payload while serving observers on 0.0.0.0:3401.
//! Useful for replaying a captured test run against dashboard clients:
//!
//!   cat captured_run.ndjson | cargo run --example replay_coordinator
//!
//! An optional argument names a capability matrix file (a JSON array of
//! `{id, browserName, os, os_version}` entries) so cloud-browser observers
//! can register during the replay.

use tokio::io::{stdin, AsyncBufReadExt, BufReader};

use gridhub_rs::{CapabilityMatrix, CoordinatorHandle, HubConfig, HubServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gridhub_rs=info".parse()?),
        )
        .init();

    let capabilities = match std::env::args().nth(1) {
        Some(path) => CapabilityMatrix::from_file(&path)?,
        None => CapabilityMatrix::default(),
    };

    println!("Replay hub on 0.0.0.0:3401 ({} capability entries)", capabilities.len());
    println!("Paste or pipe JSON lines to emit firehose payloads.");
    println!();

    let (coordinator, events) = CoordinatorHandle::new();
    let server = HubServer::new(HubConfig::default(), capabilities, &coordinator);

    let feeder = coordinator.clone();
    tokio::spawn(async move {
        feeder.listening();

        let mut lines = BufReader::new(stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(payload) => feeder.data(payload),
                Err(e) => eprintln!("Skipping bad line: {}", e),
            }
        }
        println!("Replay input finished; hub stays up for observers.");
    });

    tokio::select! {
        result = server.run(events) => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
