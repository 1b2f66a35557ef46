//! Basic transport control: cue to a timecode, play for a few seconds, stop.
//!
//! Run with: cargo run --example transport_control -- /dev/ttyUSB0

use std::time::Duration;

use anyhow::{Context, Result};
use vtr9pin::{commands, MasterBuilder, TimeCode};

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
        .context("usage: transport_control <serial-port>")?;

    let master = MasterBuilder::new()
        .serial_port(&port)
        .build()
        .await
        .with_context(|| format!("failed to connect on {port}"))?;
    println!("connected to {}", master.device_info().await);

    let status = master.status().await;
    if status.cassette_out() {
        anyhow::bail!("no cassette loaded");
    }
    if status.local() {
        println!("deck is in local mode, requesting remote control");
        master.send(&commands::local_disable()).await?;
    }

    let target = TimeCode {
        hour: 1,
        minute: 0,
        second: 0,
        frame: 0,
        ..TimeCode::default()
    };
    println!("cueing to {target}");
    master.send(&commands::cue_up_with_data(target)).await?;

    // Wait for the cue-up to land.
    while !master.status().await.cue_up() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("rolling");
    master.send(&commands::play()).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    println!("stopping at {}", master.timecode().await);
    master.send(&commands::stop()).await?;

    master.close().await?;
    Ok(())
}
