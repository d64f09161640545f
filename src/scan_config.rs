use crate::command_channel::CommandChannel;
use crate::error::DaqError;
use crate::transport::DaqTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    SingleEnded,
    Differential,
}

impl ChannelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleEnded => "SE",
            Self::Differential => "DIFF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanConfigError {
    #[error("Low channel {low} is above high channel {high}")]
    ChannelOrder { low: u8, high: u8 },

    #[error("Sample rate must be above 0 Hz")]
    ZeroRate,

    #[error("A one-shot read needs a sample count above 0")]
    ZeroSamples,

    #[error("Voltage range must be above 0 V")]
    ZeroRange,

    #[error("Buffer capacity must be at least one packet")]
    ZeroCapacity,
}

/// Parameters of one analog input scan.
///
/// `sample_count` counts samples across all scanned channels, so each
/// channel receives `sample_count / channel_count()` of them. A count of 0
/// asks the device to scan until stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub mode: ChannelMode,
    pub voltage_range: u32,
    pub low_channel: u8,
    pub high_channel: u8,
    pub rate_hz: u32,
    pub sample_count: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ChannelMode::SingleEnded,
            voltage_range: 10,
            low_channel: 0,
            high_channel: 0,
            rate_hz: 1000,
            sample_count: 1024,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channels(mut self, low: u8, high: u8) -> Self {
        self.low_channel = low;
        self.high_channel = high;
        self
    }

    pub fn rate(mut self, rate_hz: u32) -> Self {
        self.rate_hz = rate_hz;
        self
    }

    pub fn samples(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Bipolar range of ±`volts`.
    pub fn range(mut self, volts: u32) -> Self {
        self.voltage_range = volts;
        self
    }

    pub fn mode(mut self, mode: ChannelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Scan until stopped, for continuous acquisition.
    pub fn continuous(self) -> Self {
        self.samples(0)
    }

    pub fn validate(&self) -> Result<(), ScanConfigError> {
        if self.low_channel > self.high_channel {
            return Err(ScanConfigError::ChannelOrder {
                low: self.low_channel,
                high: self.high_channel,
            });
        }
        if self.rate_hz == 0 {
            return Err(ScanConfigError::ZeroRate);
        }
        if self.voltage_range == 0 {
            return Err(ScanConfigError::ZeroRange);
        }
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        1 + usize::from(self.high_channel) - usize::from(self.low_channel)
    }

    /// DAQFlex name of the voltage range, e.g. `BIP10V`.
    pub fn range_code(&self) -> String {
        format!("BIP{}V", self.voltage_range)
    }

    pub fn min_voltage(&self) -> f64 {
        -f64::from(self.voltage_range)
    }

    pub fn max_voltage(&self) -> f64 {
        f64::from(self.voltage_range)
    }

    /// Setup commands in the order the device expects them.
    pub fn commands(&self) -> [String; 6] {
        [
            format!("AI:CHMODE={}", self.mode.as_str()),
            format!("AISCAN:RANGE={}", self.range_code()),
            format!("AISCAN:LOWCHAN={}", self.low_channel),
            format!("AISCAN:HIGHCHAN={}", self.high_channel),
            format!("AISCAN:RATE={}", self.rate_hz),
            format!("AISCAN:SAMPLES={}", self.sample_count),
        ]
    }
}

/// Arms the device for a scan, skipping reconfiguration when nothing changed.
pub struct ScanConfigurator<T: DaqTransport> {
    channel: CommandChannel<T>,
    current: Option<ScanConfig>,
}

impl<T: DaqTransport> ScanConfigurator<T> {
    pub fn new(channel: CommandChannel<T>) -> Self {
        Self {
            channel,
            current: None,
        }
    }

    /// Apply `config` unless it is already the active configuration.
    ///
    /// The configuration is only recorded once every command succeeded.
    pub fn configure(&mut self, config: &ScanConfig) -> Result<(), DaqError> {
        config.validate()?;
        if self.current.as_ref() == Some(config) {
            log::debug!("Scan configuration unchanged, skipping setup");
            return Ok(());
        }

        for command in config.commands() {
            self.channel.execute(&command).map_err(|error| match error {
                DaqError::Transport(fault) => DaqError::protocol(&command, fault.to_string()),
                other => other,
            })?;
        }

        self.current = Some(*config);
        Ok(())
    }

    pub fn start(&self) -> Result<(), DaqError> {
        self.channel.execute("AISCAN:START")?;
        Ok(())
    }

    /// Stop any running scan. Harmless when the device is idle.
    pub fn stop(&self) -> Result<(), DaqError> {
        self.channel.execute("AISCAN:STOP")?;
        Ok(())
    }

    pub fn current(&self) -> Option<&ScanConfig> {
        self.current.as_ref()
    }
}
