use std::time::Duration;

/// Vendor request used for both halves of a DAQFlex command exchange.
pub const COMMAND_REQUEST: u8 = 0x80;

/// Raw outcome of a USB transfer that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsbError {
    #[error("USB transfer timed out")]
    Timeout,

    #[error("USB endpoint stalled")]
    Stall,

    #[error("USB device disconnected")]
    Disconnected,

    #[error("USB transfer fault: {0}")]
    Fault(String),
}

impl UsbError {
    /// A timeout marks a quiet stream rather than a broken one.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// An already-opened DAQFlex device handle.
///
/// Opening, enumerating and claiming the device happen elsewhere; an
/// implementation only has to move bytes. All methods take `&self` so the
/// handle can be shared between the caller and the continuous poller thread.
pub trait DaqTransport: Send + Sync {
    /// Vendor control transfer, host to device. Returns the number of bytes accepted.
    fn control_out(&self, request: u8, data: &[u8]) -> Result<usize, UsbError>;

    /// Vendor control transfer, device to host, of at most `length` bytes.
    fn control_in(&self, request: u8, length: usize) -> Result<Vec<u8>, UsbError>;

    /// One bulk IN transfer of at most `length` bytes.
    fn bulk_in(&self, length: usize, timeout: Duration) -> Result<Vec<u8>, UsbError>;
}

impl<T: DaqTransport + ?Sized> DaqTransport for Box<T> {
    fn control_out(&self, request: u8, data: &[u8]) -> Result<usize, UsbError> {
        (**self).control_out(request, data)
    }

    fn control_in(&self, request: u8, length: usize) -> Result<Vec<u8>, UsbError> {
        (**self).control_in(request, length)
    }

    fn bulk_in(&self, length: usize, timeout: Duration) -> Result<Vec<u8>, UsbError> {
        (**self).bulk_in(length, timeout)
    }
}
