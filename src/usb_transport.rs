use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use nusb::transfer::{Control, ControlType, Queue, Recipient, RequestBuffer, TransferError};
use nusb::Interface;

use crate::transport::{DaqTransport, UsbError};

const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

impl From<TransferError> for UsbError {
    fn from(error: TransferError) -> Self {
        match error {
            TransferError::Stall => Self::Stall,
            TransferError::Disconnected => Self::Disconnected,
            other => Self::Fault(other.to_string()),
        }
    }
}

/// [`DaqTransport`] over a claimed `nusb` interface.
///
/// Bulk reads go through a one-transfer queue driven by a private
/// single-threaded runtime, which gives them a timeout.
pub struct NusbTransport {
    interface: Interface,
    bulk_in: Mutex<Queue<RequestBuffer>>,
    runtime: tokio::runtime::Runtime,
}

impl NusbTransport {
    /// `bulk_in_endpoint` is the address of the bulk IN endpoint, e.g. `0x81`.
    pub fn new(interface: Interface, bulk_in_endpoint: u8) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let bulk_in = Mutex::new(interface.bulk_in_queue(bulk_in_endpoint));
        Ok(Self {
            interface,
            bulk_in,
            runtime,
        })
    }

    fn vendor_request(request: u8) -> Control {
        Control {
            control_type: ControlType::Vendor,
            recipient: Recipient::Device,
            request,
            value: 0,
            index: 0,
        }
    }
}

impl DaqTransport for NusbTransport {
    fn control_out(&self, request: u8, data: &[u8]) -> Result<usize, UsbError> {
        Ok(self
            .interface
            .control_out_blocking(Self::vendor_request(request), data, CONTROL_TIMEOUT)?)
    }

    fn control_in(&self, request: u8, length: usize) -> Result<Vec<u8>, UsbError> {
        let mut buffer = vec![0; length];
        let received = self.interface.control_in_blocking(
            Self::vendor_request(request),
            &mut buffer,
            CONTROL_TIMEOUT,
        )?;
        buffer.truncate(received);
        Ok(buffer)
    }

    fn bulk_in(&self, length: usize, timeout: Duration) -> Result<Vec<u8>, UsbError> {
        let mut queue = self.bulk_in.lock().unwrap_or_else(PoisonError::into_inner);
        queue.submit(RequestBuffer::new(length));

        let completion = match self
            .runtime
            .block_on(tokio::time::timeout(timeout, queue.next_complete()))
        {
            Ok(completion) => completion,
            Err(_) => {
                queue.cancel_all();
                // the transfer may have completed while being cancelled
                let completion = self.runtime.block_on(queue.next_complete());
                if completion.status.is_err() {
                    return Err(UsbError::Timeout);
                }
                completion
            }
        };

        completion.status?;
        Ok(completion.data)
    }
}
