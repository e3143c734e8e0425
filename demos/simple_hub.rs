//! Simple hub example with a scripted coordinator
//!
//! Run with: cargo run --example simple_hub [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_hub                    # binds to 0.0.0.0:3401
//!   cargo run --example simple_hub localhost          # binds to 127.0.0.1:3401
//!   cargo run --example simple_hub 127.0.0.1:3500     # binds to 127.0.0.1:3500
//!
//! A scripted in-process coordinator attaches two worker machines and then
//! emits one firehose payload per second. Connect as an observer and watch:
//!
//!   nc localhost 3401
//!   {"event":"update-slaves-list"}
//!   {"event":"register-browserstack","browserstack":"{\"automation_session\":{\"browser\":\"chrome\",\"os\":\"OS X\",\"os_version\":\"10.12\"}}","session":"run-42"}
//!   {"event":"browserstack-stream","data":["hello"]}
//!
//! Session output lands in ./testlogs/<session>.log.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use gridhub_rs::capability::CapabilityEntry;
use gridhub_rs::registry::{Machine, SlaveMap};
use gridhub_rs::{CapabilityMatrix, CoordinatorHandle, HubConfig, HubServer};

fn demo_slaves() -> SlaveMap {
    let mut group = BTreeMap::new();
    group.insert("m1".to_string(), Machine::new("1", "mac"));
    group.insert("m2".to_string(), Machine::new("2", "win"));

    let mut slaves = SlaveMap::new();
    slaves.insert("local".to_string(), group);
    slaves
}

fn demo_capabilities() -> CapabilityMatrix {
    CapabilityMatrix::new(vec![CapabilityEntry {
        id: "5".into(),
        browser_name: "chrome".into(),
        os: "OS X".into(),
        os_version: "10.12".into(),
    }])
}

/// Parse bind address from command line argument.
///
/// Accepts "localhost", "127.0.0.1", or full "IP:PORT" forms.
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 3401;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gridhub_rs=debug".parse()?)
                .add_directive("simple_hub=debug".parse()?),
        )
        .init();

    let bind_addr = match std::env::args().nth(1) {
        Some(arg) => match parse_bind_addr(&arg) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:3401".parse().unwrap(),
    };

    let config = HubConfig::default().bind(bind_addr);

    println!("Starting hub on {}", config.bind_addr);
    println!("Session logs: {}", config.log_dir.display());
    println!();
    println!("Connect with: nc localhost {}", config.bind_addr.port());
    println!();

    let (coordinator, events) = CoordinatorHandle::new();
    let server = HubServer::new(config, demo_capabilities(), &coordinator);

    // Scripted coordinator: attach workers, then stream forever.
    let feeder = coordinator.clone();
    tokio::spawn(async move {
        feeder.listening();
        feeder.update_slaves(demo_slaves()).await;

        let mut tick = 0u64;
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            tick += 1;
            feeder.data(serde_json::json!({
                "tick": tick,
                "suite": "smoke",
                "status": "running",
            }));
        }
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
