//! Printer control plane: submitting G-code command batches.

use std::time::Duration;

use log::{debug, info};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("printer request failed: {0}")]
    Transport(String),

    #[error("printer rejected the command batch with http status {0}")]
    Rejected(u16),
}

/// Capability to submit an ordered list of G-code lines.
pub trait PrinterCommand {
    fn send_commands(&self, commands: &[String]) -> Result<(), PrinterError>;
}

/// OctoPrint REST endpoint. Commands are POSTed as one JSON batch; the
/// server answers 204 on success.
pub struct OctoRemote {
    url: String,
    api_key: String,
    agent: ureq::Agent,
}

impl OctoRemote {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(address: &str, port: u16, api_key: &str) -> Self {
        OctoRemote {
            url: format!("http://{address}:{port}/api/printer/command"),
            api_key: api_key.to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Self::REQUEST_TIMEOUT)
                .build(),
        }
    }
}

impl PrinterCommand for OctoRemote {
    fn send_commands(&self, commands: &[String]) -> Result<(), PrinterError> {
        debug!("sending {commands:?} to {}", self.url);
        let response = self
            .agent
            .post(&self.url)
            .set("X-Api-Key", &self.api_key)
            .set("Content-Type", "application/json")
            .send_json(json!({ "commands": commands }));
        match response {
            Ok(resp) if resp.status() == 204 => Ok(()),
            Ok(resp) => Err(PrinterError::Rejected(resp.status())),
            Err(ureq::Error::Status(code, _)) => Err(PrinterError::Rejected(code)),
            Err(e) => Err(PrinterError::Transport(e.to_string())),
        }
    }
}

/// Logs the batch instead of submitting it.
pub struct DryRunPrinter;

impl PrinterCommand for DryRunPrinter {
    fn send_commands(&self, commands: &[String]) -> Result<(), PrinterError> {
        for command in commands {
            info!("dry-run gcode: {command}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_accepts_any_batch() {
        let printer = DryRunPrinter;
        let commands = vec!["G28 O X Y Z".to_string(), "G1 X200".to_string()];
        assert!(printer.send_commands(&commands).is_ok());
        assert!(printer.send_commands(&[]).is_ok());
    }

    #[test]
    fn remote_points_at_the_command_endpoint() {
        let printer = OctoRemote::new("octopi.local", 80, "secret");
        assert_eq!(printer.url, "http://octopi.local:80/api/printer/command");
    }
}
