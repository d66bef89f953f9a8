use crate::register::{decode_register, REGISTER_SIZE};
use crate::Result;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Vendor requests understood by the board firmware. The discriminants are the `bRequest` values
/// of the control transfers and must match the firmware's request table.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, TryFromPrimitive, IntoPrimitive)]
pub enum VendorRequest {
    /// Reads the one-byte board ID.
    ReadBoardId = 14,

    /// Resets the emulated controller and attaches it to the bus.
    Connect = 40,
    /// Detaches the emulated controller from the bus.
    Disconnect = 41,
    /// Reads the pending interrupt register (4 bytes).
    GetStatus = 42,
    /// Reads the setup-pending bitmap (4 bytes).
    GetSetupStatus = 43,
    /// Reads the transfer-complete bitmap (4 bytes).
    GetTransferStatus = 44,
    /// Reads the transfer-readiness bitmap (4 bytes).
    GetTransferReadiness = 45,
    /// Reads the 8-byte SETUP packet latched on endpoint `index`.
    ReadSetup = 46,
    /// Primes OUT endpoint `index` for a non-blocking read.
    StartNonblockingRead = 47,
    /// Reads the byte count of the last non-blocking read on endpoint `index` (4 bytes).
    GetNonblockingLength = 48,
    /// Returns the data of the last non-blocking read on endpoint `index`.
    FinishNonblockingRead = 49,
    /// Transmits the data stage of this request on IN endpoint `index`.
    SendOnEndpoint = 50,
    /// Stalls endpoint `index`.
    StallEndpoint = 51,
    /// Sets the device address to `value`.
    SetAddress = 52,
    /// Initializes endpoints from a table of 4-byte entries.
    SetUpEndpoints = 53,
    /// Retires completed transfer descriptors on endpoint `index`, direction `value` (1 for IN).
    CleanUpTransfer = 54,
    /// Acknowledges a bus reset.
    BusReset = 55,
}

/// The control request channel to the board. Implement this to drive the engine over a new kind
/// of link.
///
/// All hardware access is serialized through a single transport: one request is in flight at a
/// time, and implementations need no internal locking.
pub trait Transport {
    /// Performs a vendor request with an IN data stage of up to `length` bytes and returns the data
    /// the device sent.
    ///
    /// # Errors
    ///
    /// * [`Transport`](crate::UsbError::Transport) - The control transfer failed.
    fn vendor_request_in(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        length: usize,
    ) -> Result<Vec<u8>>;

    /// Performs a vendor request with an OUT data stage carrying `data`, which may be empty.
    ///
    /// # Errors
    ///
    /// * [`Transport`](crate::UsbError::Transport) - The control transfer failed.
    fn vendor_request_out(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()>;

    /// Reads a 32-bit register through a vendor request.
    ///
    /// # Errors
    ///
    /// * [`MalformedRegister`](crate::UsbError::MalformedRegister) - The device returned fewer
    ///   than four bytes.
    fn read_register(&mut self, request: VendorRequest, index: u16) -> Result<u32> {
        let raw = self.vendor_request_in(request, 0, index, REGISTER_SIZE)?;
        decode_register(&raw)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn vendor_request_in(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        length: usize,
    ) -> Result<Vec<u8>> {
        (**self).vendor_request_in(request, value, index, length)
    }

    fn vendor_request_out(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()> {
        (**self).vendor_request_out(request, value, index, data)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn vendor_request_in(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        length: usize,
    ) -> Result<Vec<u8>> {
        (**self).vendor_request_in(request, value, index, length)
    }

    fn vendor_request_out(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()> {
        (**self).vendor_request_out(request, value, index, data)
    }
}
