use std::sync::Arc;

use crate::error::DaqError;
use crate::transport::{DaqTransport, COMMAND_REQUEST};

/// Size of every control response, null-padded by the device.
pub const RESPONSE_LENGTH: usize = 64;

/// Synchronous DAQFlex command/response exchange over vendor control transfers.
///
/// Cloning is cheap; clones share the same transport.
pub struct CommandChannel<T: DaqTransport> {
    transport: Arc<T>,
}

impl<T: DaqTransport> Clone for CommandChannel<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: DaqTransport> CommandChannel<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Send a command and return the raw device response.
    ///
    /// The command is upper-cased and null-terminated before it goes out. The
    /// reply is returned with its null padding removed; parsing `KEY=VALUE`
    /// is left to the caller. Nothing is retried here.
    pub fn send(&self, command: &str) -> Result<String, DaqError> {
        if !command.is_ascii() {
            return Err(DaqError::protocol(command, "command is not ASCII"));
        }

        let mut message = command.to_ascii_uppercase().into_bytes();
        message.push(0);

        log::debug!("Sending command {}", command.to_ascii_uppercase());
        let written = self.transport.control_out(COMMAND_REQUEST, &message)?;
        if written != message.len() {
            return Err(DaqError::protocol(
                command,
                format!("device accepted {written} of {} bytes", message.len()),
            ));
        }

        let raw = self.transport.control_in(COMMAND_REQUEST, RESPONSE_LENGTH)?;
        let end = raw.iter().rposition(|&byte| byte != 0).map_or(0, |i| i + 1);
        let response = std::str::from_utf8(&raw[..end])
            .ok()
            .filter(|text| text.is_ascii())
            .ok_or_else(|| DaqError::protocol(command, "response is not ASCII"))?
            .to_string();

        log::debug!("Response: {}", response);
        Ok(response)
    }

    /// Send a command and require the device to acknowledge it.
    ///
    /// A DAQFlex acknowledgement starts with the command's key, i.e. the part
    /// before `=`. Anything else is treated as a rejection.
    pub fn execute(&self, command: &str) -> Result<String, DaqError> {
        let response = self.send(command)?;
        let key = command_key(command);
        if !response.to_ascii_uppercase().starts_with(&key) {
            return Err(DaqError::protocol(
                command,
                format!("unexpected acknowledgement '{response}'"),
            ));
        }
        Ok(response)
    }
}

fn command_key(command: &str) -> String {
    command
        .split('=')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase()
}

/// The value part of a `KEY=VALUE` response.
pub fn response_value(response: &str) -> Option<&str> {
    response.split_once('=').map(|(_, value)| value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockTransport;
    use crate::transport::UsbError;

    fn channel(mock: MockTransport) -> (Arc<MockTransport>, CommandChannel<MockTransport>) {
        let transport = Arc::new(mock);
        (Arc::clone(&transport), CommandChannel::new(transport))
    }

    #[test]
    fn test_send_uppercases_command() {
        let (mock, channel) = channel(MockTransport::new());
        let response = channel.send("aiscan:rate=1000").unwrap();

        assert_eq!(mock.commands(), vec!["AISCAN:RATE=1000".to_string()]);
        assert_eq!(response, "AISCAN:RATE");
    }

    #[test]
    fn test_send_strips_null_padding() {
        let (_, channel) = channel(MockTransport::new().with_query("?DEV:MFGSER", "DEV:MFGSER=01ABCDEF"));
        assert_eq!(channel.send("?dev:mfgser").unwrap(), "DEV:MFGSER=01ABCDEF");
    }

    #[test]
    fn test_short_write_is_protocol_error() {
        let (mock, channel) = channel(MockTransport::new());
        mock.set_short_write(true);

        assert!(matches!(
            channel.send("AISCAN:START"),
            Err(DaqError::Protocol { .. })
        ));
    }

    #[test]
    fn test_transfer_fault_is_transport_error() {
        let (mock, channel) = channel(MockTransport::new());
        mock.fail_command(Some("AISCAN"));

        assert!(matches!(
            channel.send("AISCAN:START"),
            Err(DaqError::Transport(UsbError::Stall))
        ));
    }

    #[test]
    fn test_execute_rejects_mismatched_acknowledgement() {
        let (_, channel) = channel(MockTransport::new().with_query("AISCAN:START", "AISCAN:STOP"));
        assert!(matches!(
            channel.execute("AISCAN:START"),
            Err(DaqError::Protocol { .. })
        ));
    }

    #[test]
    fn test_response_value() {
        assert_eq!(response_value("AI{0}:SLOPE=1.0025"), Some("1.0025"));
        assert_eq!(response_value("AISCAN:START"), None);
    }
}
