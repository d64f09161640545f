use std::sync::Arc;

use crate::bulk_reader::SynchronousBulkReader;
use crate::calibration::{self, Calibration, CalibrationCache};
use crate::command_channel::CommandChannel;
use crate::continuous::ContinuousAcquisition;
use crate::device_registry::DeviceDescriptor;
use crate::error::DaqError;
use crate::sample_processor::{self, ScanReading};
use crate::scan_config::{ChannelMode, ScanConfig, ScanConfigurator};
use crate::transport::DaqTransport;

/// One session with an opened DAQFlex device.
///
/// Holds everything that lives as long as the session: the applied scan
/// configuration, the calibration cache and the continuous pipeline.
pub struct DaqDevice<T: DaqTransport + 'static> {
    descriptor: DeviceDescriptor,
    commands: CommandChannel<T>,
    configurator: ScanConfigurator<T>,
    calibrations: CalibrationCache,
    reader: SynchronousBulkReader<T>,
    continuous: ContinuousAcquisition<T>,
}

impl<T: DaqTransport + 'static> DaqDevice<T> {
    /// Start a session on `transport`.
    ///
    /// `bulk_packet_size` is the max packet size of the bulk IN endpoint.
    pub fn new(transport: T, descriptor: DeviceDescriptor, bulk_packet_size: usize) -> Self {
        Self::from_shared(Arc::new(transport), descriptor, bulk_packet_size)
    }

    pub fn from_shared(
        transport: Arc<T>,
        descriptor: DeviceDescriptor,
        bulk_packet_size: usize,
    ) -> Self {
        log::debug!(
            "Opening {} session, bulk packet size {}",
            descriptor.name,
            bulk_packet_size
        );
        let commands = CommandChannel::new(Arc::clone(&transport));
        Self {
            descriptor,
            configurator: ScanConfigurator::new(commands.clone()),
            commands,
            calibrations: CalibrationCache::new(),
            reader: SynchronousBulkReader::new(Arc::clone(&transport), bulk_packet_size),
            continuous: ContinuousAcquisition::new(transport),
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn max_counts(&self) -> u32 {
        self.descriptor.max_counts
    }

    /// Send a raw DAQFlex command and return the device response.
    pub fn send_message(&self, message: &str) -> Result<String, DaqError> {
        self.commands.send(message)
    }

    /// Whether the FPGA of devices that need one has been loaded.
    pub fn fpga_configured(&self) -> Result<bool, DaqError> {
        if self.descriptor.fpga_image.is_none() {
            return Ok(true);
        }
        let status = self.commands.send("?DEV:FPGACFG")?;
        log::debug!("FPGA status: {}", status);
        Ok(status == "DEV:FPGACFG=CONFIGURED")
    }

    pub fn configure(&mut self, config: &ScanConfig) -> Result<(), DaqError> {
        self.configurator.configure(config)
    }

    pub fn current_config(&self) -> Option<&ScanConfig> {
        self.configurator.current()
    }

    pub fn start_scan(&self) -> Result<(), DaqError> {
        self.configurator.start()
    }

    pub fn stop_scan(&self) -> Result<(), DaqError> {
        self.configurator.stop()
    }

    /// Read up to `sample_count` raw samples of a running scan.
    pub fn read_scan(&self, sample_count: usize, rate_hz: u32) -> Result<Vec<u16>, DaqError> {
        Ok(self.reader.read_scan(sample_count, rate_hz)?)
    }

    /// Discard pending bulk data. Returns the number of bytes dropped.
    pub fn flush(&self) -> usize {
        self.reader.flush()
    }

    /// Query slope and offset for `channel` without touching the cache.
    pub fn query_calibration(&self, channel: u8) -> Result<Calibration, DaqError> {
        calibration::query_calibration(&self.commands, channel)
    }

    /// Cached slope and offset for `channel` in the given mode and range.
    pub fn calibration(
        &mut self,
        channel: u8,
        mode: ChannelMode,
        range_code: &str,
    ) -> Result<Calibration, DaqError> {
        self.calibrations.get(&self.commands, channel, mode, range_code)
    }

    /// Convert raw counts to volts for a `min_voltage..max_voltage` range.
    pub fn scale_and_calibrate(
        &self,
        data: &[f64],
        min_voltage: f64,
        max_voltage: f64,
        calibration: Calibration,
    ) -> Vec<f64> {
        calibration::scale_and_calibrate(
            data,
            min_voltage,
            max_voltage,
            calibration,
            f64::from(self.descriptor.max_counts),
        )
    }

    /// Run a complete scan and return per-channel data. See
    /// [`sample_processor::one_shot_read`].
    pub fn one_shot_read(
        &mut self,
        config: &ScanConfig,
        scale: bool,
    ) -> Result<ScanReading, DaqError> {
        sample_processor::one_shot_read(self, config, scale)
    }

    /// Start polling the bulk endpoint in the background.
    ///
    /// This does not start a scan on the device; see
    /// [`start_continuous_scan`](Self::start_continuous_scan).
    pub fn start_continuous_transfer(
        &mut self,
        rate_hz: u32,
        buffer_packets: usize,
        packet_size: Option<usize>,
    ) -> Result<(), DaqError> {
        self.continuous.start(rate_hz, buffer_packets, packet_size)
    }

    /// Stop the background poller and wait for it to exit.
    pub fn stop_continuous_transfer(&mut self) {
        self.continuous.stop();
    }

    /// Everything the poller buffered since the last call.
    pub fn get_new_bulk_data(&self, wait: bool) -> Vec<u16> {
        self.continuous.drain(wait)
    }

    pub fn continuous(&self) -> &ContinuousAcquisition<T> {
        &self.continuous
    }

    /// Configure the device, start polling, then start the scan.
    pub fn start_continuous_scan(
        &mut self,
        config: &ScanConfig,
        buffer_packets: usize,
        packet_size: Option<usize>,
    ) -> Result<(), DaqError> {
        self.configure(config)?;
        self.continuous
            .start(config.rate_hz, buffer_packets, packet_size)?;
        if let Err(e) = self.start_scan() {
            self.continuous.stop();
            return Err(e);
        }
        Ok(())
    }

    /// Stop the scan on the device and then the poller.
    pub fn stop_continuous_scan(&mut self) -> Result<(), DaqError> {
        let stopped = self.stop_scan();
        self.continuous.stop();
        stopped
    }
}
