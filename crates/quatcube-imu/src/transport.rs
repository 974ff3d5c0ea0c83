use anyhow::{Context, Result};
use quatcube_config::SerialConfig;
use serialport::SerialPort;
use std::time::Duration;

/// Open the IMU serial port.
///
/// Reads block for at most `read_timeout_ms`, which is what lets the reader
/// thread notice a shutdown request while the device is silent.
pub fn open_serial(config: &SerialConfig) -> Result<Box<dyn SerialPort>> {
    tracing::info!(
        port = %config.port,
        baud_rate = config.baud_rate,
        protocol = ?config.protocol,
        "Opening IMU serial port"
    );

    let port = serialport::new(&config.port, config.baud_rate)
        .timeout(Duration::from_millis(config.read_timeout_ms))
        .open();

    match port {
        Ok(port) => Ok(port),
        Err(e) => {
            let available = available_ports();
            tracing::error!(port = %config.port, ?available, "Failed to open serial port");
            Err(e).with_context(|| format!("opening serial port {}", config.port))
        }
    }
}

/// Names of the serial ports present on this machine.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!(?e, "Could not enumerate serial ports");
            Vec::new()
        }
    }
}
