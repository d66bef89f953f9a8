use crate::{Result, UsbError, SUPPORTED_ENDPOINTS};

/// Number of bytes in a hardware register as returned over the vendor request channel.
pub const REGISTER_SIZE: usize = 4;

/// Bit offset of IN endpoint state in per-endpoint bitmaps.
const IN_SHIFT: u8 = 16;

/// Decodes a raw 32-bit register value from the form it is encoded in for transit as a USB
/// control request. The hardware sends registers least significant byte first.
///
/// # Errors
///
/// * [`MalformedRegister`](crate::UsbError::MalformedRegister) - `raw` holds fewer than four
///   bytes.
pub fn decode_register(raw: &[u8]) -> Result<u32> {
    match raw.get(..REGISTER_SIZE) {
        Some(&[b0, b1, b2, b3]) => Ok(u32::from_le_bytes([b0, b1, b2, b3])),
        _ => Err(UsbError::MalformedRegister {
            expected: REGISTER_SIZE,
            actual: raw.len(),
        }),
    }
}

/// The controller's pending interrupt register (USBSTS).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct IrqStatus(pub u32);

impl IrqStatus {
    /// USB interrupt: a setup packet arrived or a transfer completed.
    pub const USB_INTERRUPT: u32 = 1 << 0;

    /// The host signalled a bus reset.
    pub const BUS_RESET: u32 = 1 << 6;

    /// Gets whether setup or transfer events are pending.
    #[inline]
    pub fn usb_interrupt(&self) -> bool {
        self.0 & Self::USB_INTERRUPT != 0
    }

    /// Gets whether a bus reset is pending.
    #[inline]
    pub fn bus_reset(&self) -> bool {
        self.0 & Self::BUS_RESET != 0
    }
}

/// A per-endpoint register. Bit `n` holds the state of OUT endpoint `n`, bit `n + 16` the state of
/// IN endpoint `n`.
///
/// The setup-pending and transfer-complete registers set a bit when an event is waiting. The
/// readiness register sets a bit while a transfer descriptor is primed on the endpoint, so an
/// endpoint is ready for a new transfer when its bit is clear; see [`out_ready`] and
/// [`in_ready`].
///
/// [`out_ready`]: EndpointBitmap::out_ready
/// [`in_ready`]: EndpointBitmap::in_ready
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct EndpointBitmap(pub u32);

impl EndpointBitmap {
    /// Builds a bitmap from OUT and IN endpoint masks, where bit `n` of each mask stands for
    /// endpoint `n`.
    pub fn from_masks(out_mask: u16, in_mask: u16) -> EndpointBitmap {
        EndpointBitmap(u32::from(out_mask) | (u32::from(in_mask) << IN_SHIFT))
    }

    /// Gets whether nothing is flagged at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Gets the raw OUT bit for endpoint `number`.
    #[inline]
    pub fn out_bit(&self, number: u8) -> bool {
        number < IN_SHIFT && self.0 & (1 << number) != 0
    }

    /// Gets the raw IN bit for endpoint `number`.
    #[inline]
    pub fn in_bit(&self, number: u8) -> bool {
        number < IN_SHIFT && self.0 & (1 << (number + IN_SHIFT)) != 0
    }

    /// Readiness interpretation: no transfer is primed on OUT endpoint `number`.
    #[inline]
    pub fn out_ready(&self, number: u8) -> bool {
        !self.out_bit(number)
    }

    /// Readiness interpretation: no transfer is primed on IN endpoint `number`, so the endpoint
    /// buffer can take more data.
    #[inline]
    pub fn in_ready(&self, number: u8) -> bool {
        !self.in_bit(number)
    }

    /// Iterates over the supported endpoint numbers whose OUT bit is set.
    pub fn out_endpoints(self) -> impl Iterator<Item = u8> {
        (0..SUPPORTED_ENDPOINTS).filter(move |&n| self.out_bit(n))
    }

    /// Iterates over the supported endpoint numbers whose IN bit is set.
    pub fn in_endpoints(self) -> impl Iterator<Item = u8> {
        (0..SUPPORTED_ENDPOINTS).filter(move |&n| self.in_bit(n))
    }
}
