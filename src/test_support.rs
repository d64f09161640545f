//! Scripted transport used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::transport::{DaqTransport, UsbError};

#[derive(Default)]
struct MockState {
    commands: Vec<String>,
    pending_response: Vec<u8>,
    queries: HashMap<String, String>,
    bulk: VecDeque<Result<Vec<u8>, UsbError>>,
    bulk_repeat: Option<Vec<u8>>,
    bulk_timeouts: Vec<Duration>,
    short_write: bool,
    failing_command: Option<String>,
}

/// Answers set-commands with their key, queries from a table, and bulk reads
/// from a queue. An exhausted bulk queue times out.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_query(self, command: &str, response: &str) -> Self {
        self.state()
            .queries
            .insert(command.to_string(), response.to_string());
        self
    }

    pub fn with_calibration(self, channel: u8, slope: f64, offset: f64) -> Self {
        self.with_query(
            &format!("?AI{{{channel}}}:SLOPE"),
            &format!("AI{{{channel}}}:SLOPE={slope}"),
        )
        .with_query(
            &format!("?AI{{{channel}}}:OFFSET"),
            &format!("AI{{{channel}}}:OFFSET={offset}"),
        )
    }

    pub fn push_bulk(&self, packet: Vec<u8>) {
        self.state().bulk.push_back(Ok(packet));
    }

    pub fn push_samples(&self, samples: &[u16]) {
        self.push_bulk(samples_to_bytes(samples));
    }

    pub fn push_bulk_error(&self, error: UsbError) {
        self.state().bulk.push_back(Err(error));
    }

    /// Once the queue is empty, every bulk read returns `packet`.
    pub fn repeat_bulk(&self, packet: Vec<u8>) {
        self.state().bulk_repeat = Some(packet);
    }

    pub fn set_short_write(&self, short_write: bool) {
        self.state().short_write = short_write;
    }

    /// Control writes of commands starting with `prefix` stall.
    pub fn fail_command(&self, prefix: Option<&str>) {
        self.state().failing_command = prefix.map(str::to_string);
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn count_command(&self, command: &str) -> usize {
        self.state()
            .commands
            .iter()
            .filter(|sent| sent.as_str() == command)
            .count()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    pub fn bulk_timeouts(&self) -> Vec<Duration> {
        self.state().bulk_timeouts.clone()
    }

    pub fn pending_bulk(&self) -> usize {
        self.state().bulk.len()
    }
}

impl DaqTransport for MockTransport {
    fn control_out(&self, _request: u8, data: &[u8]) -> Result<usize, UsbError> {
        let mut state = self.state();
        let command = String::from_utf8_lossy(data)
            .trim_end_matches('\0')
            .to_string();

        if let Some(prefix) = &state.failing_command {
            if command.starts_with(prefix.as_str()) {
                return Err(UsbError::Stall);
            }
        }

        let response = match state.queries.get(&command) {
            Some(response) => response.clone(),
            None => command.split('=').next().unwrap_or_default().to_string(),
        };
        state.pending_response = response.into_bytes();
        state.commands.push(command);

        if state.short_write {
            Ok(data.len() - 1)
        } else {
            Ok(data.len())
        }
    }

    fn control_in(&self, _request: u8, length: usize) -> Result<Vec<u8>, UsbError> {
        let mut response = std::mem::take(&mut self.state().pending_response);
        response.resize(length, 0);
        Ok(response)
    }

    fn bulk_in(&self, length: usize, timeout: Duration) -> Result<Vec<u8>, UsbError> {
        let next = {
            let mut state = self.state();
            state.bulk_timeouts.push(timeout);
            state
                .bulk
                .pop_front()
                .or_else(|| state.bulk_repeat.clone().map(Ok))
        };

        match next {
            Some(Ok(mut packet)) => {
                packet.truncate(length);
                thread::sleep(Duration::from_micros(200));
                Ok(packet)
            }
            Some(Err(error)) => Err(error),
            None => {
                thread::sleep(Duration::from_millis(1));
                Err(UsbError::Timeout)
            }
        }
    }
}

pub fn samples_to_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|sample| sample.to_le_bytes()).collect()
}
