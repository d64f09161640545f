//! # DAQFlex RS
//!
//! A Rust library for acquiring analog input data from Measurement Computing
//! DAQFlex USB devices.
//!
//! The device speaks a textual command language over vendor control
//! transfers and streams raw 16-bit samples over a bulk endpoint. This crate
//! covers the acquisition side: arming scans, pulling samples, splitting
//! interleaved channels and converting counts to volts.
//!
//! ## Features
//!
//! - **Command channel**: upper-cased, null-terminated DAQFlex commands with `KEY=VALUE` replies
//! - **Idempotent scan setup**: unchanged configurations are not sent again
//! - **One-shot scans**: bounded retry on short reads, per-channel output, optional calibration
//! - **Continuous acquisition**: background poller into a bounded drop-oldest buffer
//! - **Calibration cache**: slope/offset fetched once per channel, mode and range
//! - **DataFrame output**: readings convert to `polars` DataFrames
//! - **Pluggable transport**: anything implementing [`DaqTransport`]; an `nusb` backend is included
//!
//! ## Examples
//!
//! ### One-shot read
//!
//! ```rust,no_run
//! use daqflex_rs::{find_descriptor, ChannelData, DaqDevice, NusbTransport, ScanConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let info = nusb::list_devices()?
//!     .find(|d| d.vendor_id() == daqflex_rs::VENDOR_ID && d.product_id() == 0x00EA)
//!     .ok_or("device not found")?;
//! let interface = info.open()?.claim_interface(0)?;
//! let descriptor = *find_descriptor(info.product_id()).ok_or("unknown device")?;
//!
//! let mut device = DaqDevice::new(NusbTransport::new(interface, 0x81)?, descriptor, 64);
//! let config = ScanConfig::new().channels(0, 1).rate(1000).samples(1024);
//! let reading = device.one_shot_read(&config, true)?;
//!
//! if let ChannelData::Multi(channels) = &reading.data {
//!     for (channel, volts) in channels {
//!         println!("AI{}: {} samples", channel, volts.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Deinterleaving
//!
//! ```rust
//! use daqflex_rs::deinterleave;
//!
//! let channels = deinterleave(&[10u16, 20, 30, 40], 2);
//! assert_eq!(channels, vec![vec![10, 30], vec![20, 40]]);
//! ```
//!
//! ### Drop-oldest buffer
//!
//! ```rust
//! use daqflex_rs::StreamBuffer;
//!
//! let buffer = StreamBuffer::new(2);
//! buffer.push(vec![1]);
//! buffer.push(vec![2]);
//! buffer.push(vec![3]);
//! assert_eq!(buffer.drain(), vec![2, 3]);
//! ```

pub mod bulk_reader;
pub mod calibration;
pub mod command_channel;
pub mod continuous;
pub mod daq_device;
pub mod device_registry;
pub mod error;
pub mod sample_processor;
pub mod scan_config;
pub mod stream_buffer;
pub mod transport;
pub mod usb_transport;

#[cfg(test)]
mod test_support;

// Re-export the main types for convenience
pub use bulk_reader::SynchronousBulkReader;
pub use calibration::{scale_and_calibrate, Calibration, CalibrationCache, CalibrationKey};
pub use command_channel::CommandChannel;
pub use continuous::ContinuousAcquisition;
pub use daq_device::DaqDevice;
pub use device_registry::{find_descriptor, DeviceDescriptor, DEVICES, VENDOR_ID};
pub use error::DaqError;
pub use sample_processor::{deinterleave, ChannelData, ScanReading, MAX_READ_ATTEMPTS};
pub use scan_config::{ChannelMode, ScanConfig, ScanConfigError, ScanConfigurator};
pub use stream_buffer::StreamBuffer;
pub use transport::{DaqTransport, UsbError};
pub use usb_transport::NusbTransport;
