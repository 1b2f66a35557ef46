//! Port probing and device discovery.
//!
//! A probe is a throwaway engine bring-up: open the port, run the identity
//! exchange, report what answered, tear everything down. [`discover`] does
//! that across every serial port on the system.

use tracing::{debug, info};

use vtr9pin_core::transport::Transport;
use vtr9pin_core::types::DeviceInfo;
use vtr9pin_core::Result;
use vtr9pin_transport::{list_ports, SerialTransport};

use crate::builder::MasterBuilder;

/// Probe a serial port for a 9-pin device.
///
/// Returns the resolved identity if a device answers the probe within the
/// command timeout; the port is closed again either way.
pub async fn probe_port(port: &str) -> Result<DeviceInfo> {
    let transport = SerialTransport::open(port).await?;
    probe_transport(Box::new(transport)).await
}

/// Probe an already-open transport for a 9-pin device.
///
/// The transport is consumed and closed whether or not a device answers.
pub async fn probe_transport(transport: Box<dyn Transport>) -> Result<DeviceInfo> {
    let master = MasterBuilder::new()
        .idle_poll(false)
        .build_with_transport(transport)
        .await?;
    let device = master.device_info().await;
    let mut transport = master.close().await?;
    let _ = transport.close().await;
    Ok(device)
}

/// Probe every serial port on the system and report the devices found.
///
/// Ports that fail to open or do not answer are skipped, not errors; only
/// the enumeration itself can fail.
pub async fn discover() -> Result<Vec<(String, DeviceInfo)>> {
    let mut found = Vec::new();
    for port in list_ports()? {
        match probe_port(&port).await {
            Ok(device) => {
                info!(port = %port, device = %device, "device found");
                found.push((port, device));
            }
            Err(e) => {
                debug!(port = %port, error = %e, "no device on port");
            }
        }
    }
    Ok(found)
}
