//! Host-side emulation of a USB device controller.
//!
//! A GreatFET-style board exposes the registers of its second USB controller through a handful
//! of vendor-specific control requests: interrupt status, setup-pending and transfer bitmaps,
//! endpoint priming, reads and writes. This crate rebuilds the USB device protocol on top of that
//! narrow channel in host software. [`GreatDancer`](device::GreatDancer) polls the hardware,
//! sequences the setup, data and status stages of control transfers, keeps non-control endpoints
//! armed, and routes every completed transfer to a [`VirtualDevice`](class::VirtualDevice)
//! implementation that decides how the emulated peripheral behaves.
//!
//! ```ignore
//! let transport = RusbTransport::open(RusbTransportConfig::default())?;
//! let mut dancer = GreatDancerBuilder::new(transport).build();
//! let mut device = MyKeyboard::new();
//!
//! dancer.connect()?;
//! dancer.service_irqs(&mut device)?;
//! ```

#![warn(missing_docs)]

#[macro_use]
mod macros;

/// Boxed error type used to carry transport and virtual device failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A USB emulation error.
#[derive(Debug, thiserror::Error)]
pub enum UsbError {
    /// The underlying control transfer channel failed to complete a vendor request.
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),

    /// A register read returned fewer bytes than a register holds.
    #[error("malformed register read: expected {expected} bytes, got {actual}")]
    MalformedRegister {
        /// Number of bytes a register holds.
        expected: usize,
        /// Number of bytes actually returned.
        actual: usize,
    },

    /// A setup packet was not exactly 8 bytes long.
    #[error("invalid setup packet")]
    InvalidSetupPacket,

    /// An endpoint number outside of `0..SUPPORTED_ENDPOINTS` was used.
    #[error("endpoint {0} is not supported by the emulated controller")]
    InvalidEndpoint(u8),

    /// A configuration declared more endpoints than the controller can hold.
    #[error("configuration declares more endpoints than the controller supports")]
    EndpointOverflow,

    /// A blocking read gave up after the configured number of status polls.
    #[error("timed out waiting for a transfer on endpoint {endpoint}")]
    Timeout {
        /// Endpoint number the read was waiting on.
        endpoint: u8,
    },

    /// The cancellation token fired while the engine was polling.
    #[error("operation cancelled")]
    Cancelled,

    /// A virtual device callback failed.
    #[error("virtual device failure: {0}")]
    Device(#[source] BoxError),

    /// The hardware reported a non-blocking read larger than [`bus::MAX_TRANSFER_LENGTH`].
    #[error("endpoint {endpoint} reported an invalid transfer length of {length} bytes")]
    InvalidTransferLength {
        /// Endpoint number the read was primed on.
        endpoint: u8,
        /// Byte count reported by the hardware.
        length: u32,
    },

    /// No registered board handles the board ID reported by the hardware.
    #[error("no supported board has id {0}")]
    InvalidBoard(u8),

    /// The board answered the board ID request without any data.
    #[error("board did not report its id")]
    MissingBoardId,
}

impl UsbError {
    /// Wraps an error raised by a transport implementation.
    pub fn transport(err: impl Into<BoxError>) -> UsbError {
        UsbError::Transport(err.into())
    }

    /// Wraps an error raised by a virtual device implementation.
    pub fn device(err: impl Into<BoxError>) -> UsbError {
        UsbError::Device(err.into())
    }

    /// Returns true if the error leaves the hardware link in an unknown state, so the IRQ service
    /// loop has to stop. Other errors only abort the transaction that raised them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UsbError::Transport(_)
                | UsbError::MalformedRegister { .. }
                | UsbError::Timeout { .. }
                | UsbError::Cancelled
        )
    }
}

#[cfg(feature = "rusb")]
impl From<rusb::Error> for UsbError {
    fn from(err: rusb::Error) -> UsbError {
        UsbError::Transport(Box::new(err))
    }
}

/// Direction of USB traffic. Note that in the USB standard the direction is always indicated from
/// the perspective of the host, which is backward for devices, but the standard directions are used
/// for consistency.
///
/// The values of the enum also match the direction bit used in endpoint addresses and control
/// request types.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum UsbDirection {
    /// Host to device (OUT)
    Out = 0x00,
    /// Device to host (IN)
    In = 0x80,
}

impl From<u8> for UsbDirection {
    fn from(value: u8) -> Self {
        if value & 0x80 != 0 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        }
    }
}

/// Result for USB operations.
pub type Result<T> = core::result::Result<T, UsbError>;

/// Number of endpoint numbers the emulated controller exposes. Endpoint bitmaps carry OUT state
/// in bits `0..SUPPORTED_ENDPOINTS` and IN state in bits `16..16 + SUPPORTED_ENDPOINTS`.
pub const SUPPORTED_ENDPOINTS: u8 = 4;

/// Decoding of the status registers read from the hardware.
pub mod register;

/// USB control transfers and the SETUP packet.
pub mod control;

/// USB endpoints and the per-endpoint state kept by the engine.
pub mod endpoint;

/// Device configurations installed by virtual devices.
pub mod config;

/// USB descriptor encoding.
pub mod descriptor;

/// The vendor request channel to the hardware.
pub mod transport;

/// libusb-backed transport.
#[cfg(feature = "rusb")]
pub mod rusb_transport;

/// Supported boards.
pub mod board;

/// Cooperative cancellation.
pub mod cancel;

/// Hardware primitives shared by the engine and virtual devices.
pub mod bus;

/// Virtual devices driven by the engine.
pub mod class;

/// The emulation engine and its IRQ service loop.
pub mod device;

mod control_pipe;
mod device_builder;
mod transfer;

/// Loopback virtual device for exercising the engine.
pub mod test_class;

/// Prelude for applications that run the emulation engine.
pub mod prelude {
    pub use crate::board::Board;
    pub use crate::cancel::CancelToken;
    pub use crate::device::{GreatDancer, GreatDancerBuilder};
    pub use crate::transport::{Transport, VendorRequest};
    pub use crate::{Result, UsbDirection, UsbError, SUPPORTED_ENDPOINTS};

    #[cfg(feature = "rusb")]
    pub use crate::rusb_transport::{RusbTransport, RusbTransportConfig};
}

/// Prelude for virtual device implementors.
pub mod device_prelude {
    pub use crate::bus::Bus;
    pub use crate::class::VirtualDevice;
    pub use crate::config::{Configuration, Interface};
    pub use crate::control::{self, Direction, Recipient, RequestType, SetupRequest};
    pub use crate::descriptor::{descriptor_type, lang_id, DescriptorWriter, DeviceDescriptor};
    pub use crate::endpoint::{EndpointAddress, EndpointDescriptor, EndpointType};
    pub use crate::{Result, UsbDirection, UsbError};
}
