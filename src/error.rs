use crate::scan_config::ScanConfigError;
use crate::transport::UsbError;

#[derive(Debug, thiserror::Error)]
pub enum DaqError {
    #[error("USB transport error: {0}")]
    Transport(#[from] UsbError),

    #[error("Command '{command}' failed: {reason}")]
    Protocol { command: String, reason: String },

    #[error("Could not parse calibration for channel {channel} from response '{response}'")]
    Calibration { channel: u8, response: String },

    #[error("Invalid scan configuration: {0}")]
    InvalidConfig(#[from] ScanConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaqError {
    pub(crate) fn protocol(command: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}
