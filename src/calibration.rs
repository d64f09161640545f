use std::collections::HashMap;

use crate::command_channel::{response_value, CommandChannel};
use crate::error::DaqError;
use crate::scan_config::ChannelMode;
use crate::transport::DaqTransport;

/// Identifies the calibration constants valid for one channel setup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalibrationKey {
    pub channel: u8,
    pub mode: ChannelMode,
    pub range_code: String,
}

impl CalibrationKey {
    pub fn new(channel: u8, mode: ChannelMode, range_code: impl Into<String>) -> Self {
        Self {
            channel,
            mode,
            range_code: range_code.into(),
        }
    }
}

/// Linear correction applied to raw counts before voltage scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub slope: f64,
    pub offset: f64,
}

impl Calibration {
    pub const IDENTITY: Self = Self {
        slope: 1.0,
        offset: 0.0,
    };

    pub fn new(slope: f64, offset: f64) -> Self {
        Self { slope, offset }
    }

    /// Calibrate one raw value and rescale it onto `min_voltage..max_voltage`.
    pub fn apply(&self, raw: f64, min_voltage: f64, max_voltage: f64, max_counts: f64) -> f64 {
        let full_scale = max_voltage - min_voltage;
        let calibrated = raw * self.slope + self.offset;
        (calibrated / max_counts) * full_scale + min_voltage
    }
}

/// Apply calibration and scaling to a block of raw values.
pub fn scale_and_calibrate(
    data: &[f64],
    min_voltage: f64,
    max_voltage: f64,
    calibration: Calibration,
    max_counts: f64,
) -> Vec<f64> {
    data.iter()
        .map(|&raw| calibration.apply(raw, min_voltage, max_voltage, max_counts))
        .collect()
}

/// Ask the device for the slope and offset of `channel`.
///
/// The answer is only valid for the currently selected mode and range.
pub fn query_calibration<T: DaqTransport>(
    channel: &CommandChannel<T>,
    ai_channel: u8,
) -> Result<Calibration, DaqError> {
    let slope = query_value(channel, ai_channel, "SLOPE")?;
    let offset = query_value(channel, ai_channel, "OFFSET")?;
    Ok(Calibration::new(slope, offset))
}

fn query_value<T: DaqTransport>(
    channel: &CommandChannel<T>,
    ai_channel: u8,
    property: &str,
) -> Result<f64, DaqError> {
    let response = channel.send(&format!("?AI{{{ai_channel}}}:{property}"))?;
    response_value(&response)
        .and_then(|value| value.parse::<f64>().ok())
        .ok_or(DaqError::Calibration {
            channel: ai_channel,
            response,
        })
}

/// Per-session memo of calibration constants. Entries never expire.
#[derive(Debug, Default)]
pub struct CalibrationCache {
    entries: HashMap<CalibrationKey, Calibration>,
}

impl CalibrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached constants for `(channel, mode, range_code)`, querying the device on a miss.
    pub fn get<T: DaqTransport>(
        &mut self,
        channel: &CommandChannel<T>,
        ai_channel: u8,
        mode: ChannelMode,
        range_code: &str,
    ) -> Result<Calibration, DaqError> {
        let key = CalibrationKey::new(ai_channel, mode, range_code);
        if let Some(calibration) = self.entries.get(&key) {
            return Ok(*calibration);
        }

        let calibration = query_calibration(channel, ai_channel)?;
        log::debug!(
            "Calibration for AI{} ({} {}): slope={}, offset={}",
            ai_channel,
            mode.as_str(),
            range_code,
            calibration.slope,
            calibration.offset
        );
        self.entries.insert(key, calibration);
        Ok(calibration)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
