// src/hardware/serial.rs - Opening real serial ports
use std::time::Duration;

use serial2_tokio::SerialPort;

use crate::hardware::transport::{LineTransport, TransportError};

/// Serial connection configuration
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub terminator: u8,
    pub label: &'static str,
}

/// Open a port and wrap it in line framing.
pub fn open_line_transport(
    settings: &SerialSettings,
) -> Result<LineTransport<SerialPort>, TransportError> {
    tracing::info!(
        "Opening {} port {} at {} baud",
        settings.label,
        settings.port_name,
        settings.baud_rate
    );
    let port = SerialPort::open(&settings.port_name, settings.baud_rate).map_err(|source| {
        TransportError::Open {
            port: settings.port_name.clone(),
            source,
        }
    })?;
    Ok(LineTransport::new(port, settings.terminator)
        .with_read_timeout(settings.read_timeout)
        .with_label(settings.label))
}

pub fn available_ports() -> Vec<String> {
    match SerialPort::available_ports() {
        Ok(paths) => paths.iter().map(|p| p.display().to_string()).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            vec![]
        }
    }
}
