use std::sync::Arc;
use std::time::Duration;

use crate::transport::{DaqTransport, UsbError};

/// Timeout used while discarding stale bulk data.
pub const FLUSH_TIMEOUT: Duration = Duration::from_millis(20);

const SCAN_TIMEOUT_MARGIN_MS: u64 = 10;

/// Decode little-endian 16-bit samples. A trailing odd byte is dropped.
pub fn decode_samples(packet: &[u8]) -> Vec<u16> {
    let chunks = packet.chunks_exact(2);
    if !chunks.remainder().is_empty() {
        log::warn!("Dropping odd trailing byte of a {} byte packet", packet.len());
    }
    chunks
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Time to wait for one packet: half the time the device needs to fill it, plus `margin_ms`.
pub fn packet_timeout(packet_size: usize, rate_hz: u32, margin_ms: u64) -> Duration {
    let fill_ms = (packet_size as u64 * 1000) / (2 * u64::from(rate_hz.max(1)));
    Duration::from_millis(fill_ms + margin_ms)
}

/// Drains the bulk IN endpoint for one-shot scans.
pub struct SynchronousBulkReader<T: DaqTransport> {
    transport: Arc<T>,
    packet_size: usize,
}

impl<T: DaqTransport> SynchronousBulkReader<T> {
    pub fn new(transport: Arc<T>, packet_size: usize) -> Self {
        Self {
            transport,
            packet_size,
        }
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Read packets until `sample_count` samples arrived or the stream goes quiet.
    ///
    /// A timeout or an empty packet ends the read without an error, so the
    /// result may be shorter than requested. Other faults are returned.
    pub fn read_scan(&self, sample_count: usize, rate_hz: u32) -> Result<Vec<u16>, UsbError> {
        let timeout = packet_timeout(self.packet_size, rate_hz, SCAN_TIMEOUT_MARGIN_MS);
        let mut data = Vec::with_capacity(sample_count);

        while data.len() < sample_count {
            let packet = match self.transport.bulk_in(self.packet_size, timeout) {
                Ok(packet) => packet,
                Err(UsbError::Timeout) => {
                    log::debug!("Bulk read timed out after {} samples", data.len());
                    break;
                }
                Err(e) => return Err(e),
            };
            if packet.is_empty() {
                break;
            }
            log::trace!("Bulk packet of {} bytes", packet.len());
            data.extend(decode_samples(&packet));
        }

        Ok(data)
    }

    /// Read and discard everything still pending on the endpoint.
    ///
    /// Returns the number of bytes thrown away.
    pub fn flush(&self) -> usize {
        let mut discarded = 0;
        loop {
            match self.transport.bulk_in(self.packet_size, FLUSH_TIMEOUT) {
                Ok(packet) if !packet.is_empty() => discarded += packet.len(),
                Ok(_) => break,
                Err(e) => {
                    if !e.is_timeout() {
                        log::debug!("Flush stopped on {}", e);
                    }
                    break;
                }
            }
        }
        if discarded > 0 {
            log::debug!("Flushed {} stale bytes", discarded);
        }
        discarded
    }
}
