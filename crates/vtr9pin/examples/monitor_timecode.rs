//! Connect to a deck and print timecode and transport changes as the idle
//! poll reports them.
//!
//! Run with: cargo run --example monitor_timecode -- /dev/ttyUSB0

use anyhow::{Context, Result};
use vtr9pin::{MasterBuilder, VtrEvent};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let port = std::env::args()
        .nth(1)
        .context("usage: monitor_timecode <serial-port>")?;

    let master = MasterBuilder::new()
        .serial_port(&port)
        .build()
        .await
        .with_context(|| format!("failed to connect on {port}"))?;

    println!("connected to {}", master.device_info().await);
    println!("watching; press Ctrl-C to stop");

    let mut events = master.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(VtrEvent::TimeChanged { source, timecode }) => {
                    println!("{timecode}  ({source})");
                }
                Ok(VtrEvent::StatusChanged { status }) => {
                    println!("transport: {status}");
                }
                Ok(VtrEvent::LinkHealthChanged { healthy }) => {
                    println!("link {}", if healthy { "recovered" } else { "lost" });
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("event stream closed: {e}");
                    break;
                }
            },
        }
    }

    master.close().await?;
    Ok(())
}
