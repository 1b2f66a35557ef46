//! Probe every serial port on the system for 9-pin devices.
//!
//! Run with: cargo run --example discover_ports

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let ports = vtr9pin::list_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
        return Ok(());
    }
    println!("probing {} port(s)...", ports.len());

    let found = vtr9pin::discover().await?;
    if found.is_empty() {
        println!("no 9-pin devices answered");
    }
    for (port, device) in found {
        println!("{port}: {device}");
    }

    Ok(())
}
