use std::collections::BTreeMap;

use polars::prelude::{Column, DataFrame, NamedFrom, PolarsResult, Series};

use crate::calibration::scale_and_calibrate;
use crate::daq_device::DaqDevice;
use crate::error::DaqError;
use crate::scan_config::{ScanConfig, ScanConfigError};
use crate::transport::DaqTransport;

/// Attempts a one-shot read makes before settling for a short result.
pub const MAX_READ_ATTEMPTS: u32 = 10;

const TIME_COLUMN_NAME: &str = "time";

/// Per-channel samples of a finished scan: a bare sequence when a single
/// channel was scanned, otherwise keyed by channel number.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Single(Vec<f64>),
    Multi(BTreeMap<u8, Vec<f64>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanReading {
    pub data: ChannelData,
    pub low_channel: u8,
    pub rate_hz: u32,
    /// Scans performed, including the successful one.
    pub attempts: u32,
    /// Every attempt came back short and this is the last one's data.
    ///
    /// Such a reading is best effort; channel lengths may not match the
    /// requested sample count.
    pub degraded: bool,
}

impl ScanReading {
    /// Samples of one channel, if it was part of the scan.
    pub fn channel(&self, channel: u8) -> Option<&[f64]> {
        match &self.data {
            ChannelData::Single(values) if channel == self.low_channel => Some(values.as_slice()),
            ChannelData::Single(_) => None,
            ChannelData::Multi(channels) => channels.get(&channel).map(Vec::as_slice),
        }
    }

    pub fn channel_count(&self) -> usize {
        match &self.data {
            ChannelData::Single(_) => 1,
            ChannelData::Multi(channels) => channels.len(),
        }
    }

    /// Tabular view: a `time` column in seconds followed by one `ai{n}` column per channel.
    ///
    /// Channels share the scan rate, so each one is sampled at
    /// `rate_hz / channel_count`. Fails if a degraded reading left the
    /// channels with different lengths.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let channels: Vec<(u8, &[f64])> = match &self.data {
            ChannelData::Single(values) => vec![(self.low_channel, values.as_slice())],
            ChannelData::Multi(channels) => channels
                .iter()
                .map(|(channel, values)| (*channel, values.as_slice()))
                .collect(),
        };

        let rows = channels.first().map_or(0, |(_, values)| values.len());
        let period = channels.len() as f64 / f64::from(self.rate_hz.max(1));
        let time: Vec<f64> = (0..rows).map(|row| row as f64 * period).collect();

        let mut columns: Vec<Column> = vec![Series::new(TIME_COLUMN_NAME.into(), time).into()];
        for (channel, values) in channels {
            columns.push(Series::new(format!("ai{channel}").into(), values).into());
        }
        DataFrame::new(columns)
    }
}

/// Split a channel-interleaved buffer into one sequence per channel.
pub fn deinterleave<S: Copy>(data: &[S], channel_count: usize) -> Vec<Vec<S>> {
    let channel_count = channel_count.max(1);
    (0..channel_count)
        .map(|offset| {
            data.iter()
                .skip(offset)
                .step_by(channel_count)
                .copied()
                .collect()
        })
        .collect()
}

/// Configure, scan, read and stop, retrying short reads.
///
/// When a read returns fewer samples than `config.sample_count`, stale
/// input is flushed and the whole scan repeated, up to
/// [`MAX_READ_ATTEMPTS`] scans. If all of them come back short, the last
/// result is processed anyway and marked `degraded` instead of failing.
#[tracing::instrument(level = "debug", skip(device))]
pub fn one_shot_read<T: DaqTransport + 'static>(
    device: &mut DaqDevice<T>,
    config: &ScanConfig,
    scale: bool,
) -> Result<ScanReading, DaqError> {
    config.validate()?;
    if config.sample_count == 0 {
        return Err(ScanConfigError::ZeroSamples.into());
    }

    let mut attempts = 0;
    let raw = loop {
        attempts += 1;
        let raw = scan_once(device, config)?;
        if raw.len() == config.sample_count {
            break raw;
        }
        if attempts >= MAX_READ_ATTEMPTS {
            log::warn!(
                "Giving up after {} attempts, using {} of {} samples",
                attempts,
                raw.len(),
                config.sample_count
            );
            break raw;
        }
        log::warn!(
            "Incorrect read length: {} samples, {} retries",
            raw.len(),
            attempts
        );
        device.flush();
    };
    let degraded = raw.len() != config.sample_count;

    let range_code = config.range_code();
    let max_counts = f64::from(device.max_counts());
    let mut channels = BTreeMap::new();
    for (offset, samples) in deinterleave(&raw, config.channel_count()).into_iter().enumerate() {
        let channel = config.low_channel + offset as u8;
        let values: Vec<f64> = samples.into_iter().map(f64::from).collect();
        let values = if scale {
            let calibration = device.calibration(channel, config.mode, &range_code)?;
            scale_and_calibrate(
                &values,
                config.min_voltage(),
                config.max_voltage(),
                calibration,
                max_counts,
            )
        } else {
            values
        };
        channels.insert(channel, values);
    }

    let data = if channels.len() == 1 {
        ChannelData::Single(channels.into_values().next().unwrap_or_default())
    } else {
        ChannelData::Multi(channels)
    };

    Ok(ScanReading {
        data,
        low_channel: config.low_channel,
        rate_hz: config.rate_hz,
        attempts,
        degraded,
    })
}

fn scan_once<T: DaqTransport + 'static>(
    device: &mut DaqDevice<T>,
    config: &ScanConfig,
) -> Result<Vec<u16>, DaqError> {
    device.configure(config)?;
    device.start_scan()?;
    let raw = device.read_scan(config.sample_count, config.rate_hz);
    let stopped = device.stop_scan();
    let raw = raw?;
    stopped?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk_reader::FLUSH_TIMEOUT;
    use crate::device_registry::DeviceDescriptor;
    use crate::scan_config::ChannelMode;
    use crate::test_support::MockTransport;
    use crate::transport::UsbError;
    use std::sync::Arc;

    const TEST_DEVICE: DeviceDescriptor = DeviceDescriptor {
        name: "USB-1608FS-Plus",
        product_id: 0x00EA,
        max_counts: 0xFFFF,
        fpga_image: None,
    };

    fn open_device(mock: MockTransport) -> (Arc<MockTransport>, DaqDevice<MockTransport>) {
        let mock = Arc::new(mock);
        let device = DaqDevice::from_shared(Arc::clone(&mock), TEST_DEVICE, 64);
        (mock, device)
    }

    #[test]
    fn test_deinterleave_two_channels() {
        let data = ["a0", "b0", "a1", "b1", "a2", "b2"];
        assert_eq!(
            deinterleave(&data, 2),
            vec![vec!["a0", "a1", "a2"], vec!["b0", "b1", "b2"]]
        );
        assert_eq!(deinterleave(&[1, 2, 3], 1), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_two_channel_raw_read() {
        let (mock, mut device) = open_device(MockTransport::new());
        mock.push_samples(&[10, 20, 30, 40]);

        let config = ScanConfig::new()
            .rate(1000)
            .samples(4)
            .channels(0, 1)
            .range(10)
            .mode(ChannelMode::SingleEnded);
        let reading = one_shot_read(&mut device, &config, false).unwrap();

        let expected = BTreeMap::from([(0, vec![10.0, 30.0]), (1, vec![20.0, 40.0])]);
        assert_eq!(reading.data, ChannelData::Multi(expected));
        assert_eq!(reading.attempts, 1);
        assert!(!reading.degraded);
        assert_eq!(
            &mock.commands()[6..],
            &["AISCAN:START".to_string(), "AISCAN:STOP".to_string()]
        );
    }

    #[test]
    fn test_channels_keyed_by_number() {
        let (mock, mut device) = open_device(MockTransport::new());
        mock.push_samples(&[1, 2, 3, 4, 5, 6]);

        let config = ScanConfig::new().channels(4, 6).samples(6);
        let reading = one_shot_read(&mut device, &config, false).unwrap();

        assert_eq!(reading.channel(4), Some(&[1.0, 4.0][..]));
        assert_eq!(reading.channel(6), Some(&[3.0, 6.0][..]));
        assert_eq!(reading.channel(3), None);
    }

    #[test]
    fn test_gives_up_after_ten_short_reads() {
        let (mock, mut device) = open_device(MockTransport::new());

        let config = ScanConfig::new().samples(8);
        let reading = one_shot_read(&mut device, &config, false).unwrap();

        assert_eq!(reading.attempts, MAX_READ_ATTEMPTS);
        assert!(reading.degraded);
        assert_eq!(reading.data, ChannelData::Single(Vec::new()));
        assert_eq!(mock.count_command("AISCAN:START"), 10);
        assert_eq!(mock.count_command("AISCAN:STOP"), 10);
        assert_eq!(mock.count_command("AI:CHMODE=SE"), 1);

        let flushes = mock
            .bulk_timeouts()
            .iter()
            .filter(|t| **t == FLUSH_TIMEOUT)
            .count();
        assert_eq!(flushes, 9);
    }

    #[test]
    fn test_rejects_continuous_config() {
        let (mock, mut device) = open_device(MockTransport::new());
        let result = one_shot_read(&mut device, &ScanConfig::new().continuous(), false);

        assert!(matches!(
            result,
            Err(DaqError::InvalidConfig(ScanConfigError::ZeroSamples))
        ));
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn test_retry_recovers() {
        let (mock, mut device) = open_device(MockTransport::new());
        mock.push_samples(&[1, 2]);
        mock.push_bulk_error(UsbError::Timeout);
        mock.push_bulk_error(UsbError::Timeout);
        mock.push_samples(&[5, 6, 7, 8]);

        let config = ScanConfig::new().samples(4);
        let reading = one_shot_read(&mut device, &config, false).unwrap();

        assert_eq!(reading.attempts, 2);
        assert!(!reading.degraded);
        assert_eq!(reading.data, ChannelData::Single(vec![5.0, 6.0, 7.0, 8.0]));
    }

    #[test]
    fn test_transport_fault_propagates_after_stop() {
        let (mock, mut device) = open_device(MockTransport::new());
        mock.push_bulk_error(UsbError::Disconnected);

        let result = one_shot_read(&mut device, &ScanConfig::new().samples(4), false);
        assert!(matches!(result, Err(DaqError::Transport(UsbError::Disconnected))));
        assert_eq!(mock.count_command("AISCAN:STOP"), 1);
    }

    #[test]
    fn test_scaled_read_uses_cached_calibration() {
        let (mock, mut device) = open_device(MockTransport::new().with_calibration(0, 1.0, 0.0));
        let config = ScanConfig::new().samples(2).range(10);

        mock.push_samples(&[0, 0xFFFF]);
        let reading = one_shot_read(&mut device, &config, true).unwrap();
        let ChannelData::Single(volts) = reading.data else {
            unreachable!("single channel scans return a bare sequence");
        };
        assert!((volts[0] + 10.0).abs() < 1e-9);
        assert!((volts[1] - 10.0).abs() < 1e-9);
        assert_eq!(mock.count_command("?AI{0}:SLOPE"), 1);

        mock.push_samples(&[0x8000, 0x8000]);
        one_shot_read(&mut device, &config, true).unwrap();
        assert_eq!(mock.count_command("?AI{0}:SLOPE"), 1);
        assert_eq!(mock.count_command("?AI{0}:OFFSET"), 1);
    }

    #[test]
    fn test_dataframe_columns() {
        let reading = ScanReading {
            data: ChannelData::Multi(BTreeMap::from([
                (0, vec![1.0, 2.0]),
                (1, vec![3.0, 4.0]),
            ])),
            low_channel: 0,
            rate_hz: 1000,
            attempts: 1,
            degraded: false,
        };

        let df = reading.to_dataframe().unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(names, ["time", "ai0", "ai1"]);
        assert_eq!(df.height(), 2);

        let time: Vec<f64> = df.column("time").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(time, vec![0.0, 0.002]);
    }
}
