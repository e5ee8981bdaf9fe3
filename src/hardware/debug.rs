// src/hardware/debug.rs - DEBUG mode link: log instead of touching hardware
use async_trait::async_trait;
use std::collections::VecDeque;

use crate::hardware::transport::{Link, TransportError};

/// Logs every command and answers stage queries with neutral replies.
///
/// Absolute moves are taken as instantaneous so the poller shows plausible
/// positions, and continuous motion on an axis reports that axis at its limit
/// so homing can run end to end without a device.
pub struct DebugLink {
    label: &'static str,
    pending: VecDeque<String>,
    position: [f64; 2],
    at_limit: [bool; 2],
}

impl DebugLink {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            pending: VecDeque::new(),
            position: [0.0, 0.0],
            at_limit: [false, false],
        }
    }

    fn reply(&mut self, command: &str) -> Option<String> {
        let (axis, body) = match command.strip_prefix("AXIs") {
            Some(rest) => {
                let (index, body) = rest.split_once(':')?;
                let axis = match index {
                    "1" => 0,
                    "2" => 1,
                    _ => return None,
                };
                (Some(axis), body)
            }
            None => (None, command),
        };

        match (axis, body) {
            (Some(_), "READY?") => Some("1".to_string()),
            (Some(_), "SELectSPeed?") => Some("0".to_string()),
            (Some(a), "POSition?") => Some(self.position[a].to_string()),
            (Some(a), "LIMIT?") => Some(if self.at_limit[a] { "1" } else { "0" }.to_string()),
            (Some(a), b) if b.starts_with("GO ") => {
                self.at_limit[a] = true;
                None
            }
            (Some(a), b) => {
                if let Some(value) = b.strip_prefix("GOABS ").or_else(|| b.strip_prefix("POS ")) {
                    if let Ok(mm) = value.trim().parse::<f64>() {
                        self.position[a] = mm;
                        self.at_limit[a] = false;
                    }
                }
                None
            }
            (None, b) => {
                if let Some(args) = b.strip_prefix("GOLineA ") {
                    for part in args.split_whitespace() {
                        let (index, value) = match part.split_at_checked(1) {
                            Some(("X", v)) => (0, v),
                            Some(("Y", v)) => (1, v),
                            _ => continue,
                        };
                        if let Ok(mm) = value.parse::<f64>() {
                            self.position[index] = mm;
                        }
                    }
                }
                None
            }
        }
    }
}

#[async_trait]
impl Link for DebugLink {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        tracing::info!("[DEBUG] {} <- {}", self.label, text);
        if let Some(reply) = self.reply(text) {
            self.pending.push_back(reply);
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        let reply = self.pending.pop_front().unwrap_or_default();
        tracing::debug!("[DEBUG] {} -> {}", self.label, reply);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debug_link_reports_ready_and_slot_zero() {
        let mut link = DebugLink::new("stage");
        link.send("AXIs1:READY?").await.unwrap();
        assert_eq!(link.receive().await.unwrap(), "1");
        link.send("AXIs2:SELectSPeed?").await.unwrap();
        assert_eq!(link.receive().await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_debug_link_tracks_line_moves() {
        let mut link = DebugLink::new("stage");
        link.send("GOLineA X1.5 Y-0.25").await.unwrap();
        link.send("AXIs1:POSition?").await.unwrap();
        assert_eq!(link.receive().await.unwrap(), "1.5");
        link.send("AXIs2:POSition?").await.unwrap();
        assert_eq!(link.receive().await.unwrap(), "-0.25");
    }

    #[tokio::test]
    async fn test_debug_link_limit_after_continuous_motion() {
        let mut link = DebugLink::new("stage");
        link.send("AXIs1:LIMIT?").await.unwrap();
        assert_eq!(link.receive().await.unwrap(), "0");
        link.send("AXIs1:GO 5").await.unwrap();
        link.send("AXIs1:LIMIT?").await.unwrap();
        assert_eq!(link.receive().await.unwrap(), "1");
        link.send("AXIs1:POS 25").await.unwrap();
        link.send("AXIs1:LIMIT?").await.unwrap();
        assert_eq!(link.receive().await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_debug_link_laser_commands_have_no_reply() {
        let mut link = DebugLink::new("laser");
        link.send("1000").await.unwrap();
        assert_eq!(link.receive().await.unwrap(), "");
    }
}
