use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::bulk_reader::{decode_samples, packet_timeout};
use crate::error::DaqError;
use crate::scan_config::ScanConfigError;
use crate::stream_buffer::StreamBuffer;
use crate::transport::{DaqTransport, UsbError};

/// Continuous packets are sized in multiples of this many bytes.
pub const PACKET_UNIT: usize = 64;

const POLL_TIMEOUT_MARGIN_MS: u64 = 100;
const FAULT_BACKOFF: Duration = Duration::from_millis(1);

/// Packet size used when the caller does not pick one: one unit per started kHz.
pub fn default_packet_size(rate_hz: u32) -> usize {
    (rate_hz as usize / 1000 + 1) * PACKET_UNIT
}

struct Poller {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Streams a running scan into a bounded drop-oldest buffer from a background thread.
///
/// Read faults inside the poller are logged and retried, never reported:
/// a long acquisition keeps going through transient USB trouble.
pub struct ContinuousAcquisition<T: DaqTransport + 'static> {
    transport: Arc<T>,
    buffer: Option<Arc<StreamBuffer>>,
    poller: Option<Poller>,
}

impl<T: DaqTransport + 'static> ContinuousAcquisition<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            buffer: None,
            poller: None,
        }
    }

    /// Start polling into a fresh buffer of `capacity` packets.
    ///
    /// A pipeline that is already polling is stopped first.
    pub fn start(
        &mut self,
        rate_hz: u32,
        capacity: usize,
        packet_size: Option<usize>,
    ) -> Result<(), DaqError> {
        if rate_hz == 0 {
            return Err(ScanConfigError::ZeroRate.into());
        }
        if capacity == 0 {
            return Err(ScanConfigError::ZeroCapacity.into());
        }
        self.stop();

        let packet_size = packet_size.unwrap_or_else(|| default_packet_size(rate_hz));
        let timeout = packet_timeout(packet_size, rate_hz, POLL_TIMEOUT_MARGIN_MS);
        let buffer = Arc::new(StreamBuffer::new(capacity));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let transport = Arc::clone(&self.transport);
            let buffer = Arc::clone(&buffer);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("daqflex-poller".to_string())
                .spawn(move || poll(&*transport, &buffer, &shutdown, packet_size, timeout))?
        };

        log::debug!(
            "Continuous acquisition started: {} Hz, {} byte packets, {} packet buffer",
            rate_hz,
            packet_size,
            capacity
        );
        self.buffer = Some(buffer);
        self.poller = Some(Poller { shutdown, handle });
        Ok(())
    }

    /// Stop the poller and wait for it to exit. Does nothing when idle.
    ///
    /// Once this returns the buffer is no longer written to; what is still in
    /// it can be drained.
    pub fn stop(&mut self) {
        let Some(poller) = self.poller.take() else {
            return;
        };
        poller.shutdown.store(true, Ordering::Release);
        if poller.handle.join().is_err() {
            log::error!("Poller thread panicked");
        }
        if let Some(buffer) = &self.buffer {
            buffer.close();
        }
        log::debug!("Continuous acquisition stopped");
    }

    /// Take every buffered sample.
    ///
    /// With `wait` set on an active pipeline, first block until new data
    /// arrived since the last drain. The result can still be empty if
    /// another consumer drained in between.
    pub fn drain(&self, wait: bool) -> Vec<u16> {
        match &self.buffer {
            Some(buffer) if wait && self.is_active() => buffer.wait_and_drain(),
            Some(buffer) => buffer.drain(),
            None => Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.poller.is_some()
    }

    /// Handle on the current buffer, for consumers on other threads.
    pub fn buffer(&self) -> Option<Arc<StreamBuffer>> {
        self.buffer.clone()
    }
}

impl<T: DaqTransport + 'static> Drop for ContinuousAcquisition<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll<T: DaqTransport + ?Sized>(
    transport: &T,
    buffer: &StreamBuffer,
    shutdown: &AtomicBool,
    packet_size: usize,
    timeout: Duration,
) {
    let span = tracing::info_span!("daqflex_poller", packet_size);
    let _entered = span.enter();

    while !shutdown.load(Ordering::Acquire) {
        match transport.bulk_in(packet_size, timeout) {
            Ok(packet) if packet.is_empty() => {}
            Ok(packet) => {
                log::trace!("Polled {} bytes", packet.len());
                if buffer.push(decode_samples(&packet)).is_some() {
                    log::trace!("Stream buffer full, dropped oldest packet");
                }
            }
            Err(UsbError::Timeout) => log::trace!("Poll timed out"),
            Err(e) => {
                log::debug!("Ignoring bulk read fault: {}", e);
                thread::sleep(FAULT_BACKOFF);
            }
        }
    }
}
