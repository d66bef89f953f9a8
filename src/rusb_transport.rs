use crate::transport::{Transport, VendorRequest};
use crate::{Result, UsbError};
use rusb::{request_type, Context, DeviceHandle, Direction, Recipient, RequestType, UsbContext as _};
use std::time::Duration;

/// Default vendor ID of GreatFET boards.
pub const GREATFET_VENDOR_ID: u16 = 0x1d50;

/// Default product ID of GreatFET boards.
pub const GREATFET_PRODUCT_ID: u16 = 0x60e6;

/// Selects the board [`RusbTransport::open`] connects to.
#[derive(Clone, Debug)]
pub struct RusbTransportConfig {
    /// Vendor ID to match.
    pub vendor_id: u16,
    /// Product ID to match.
    pub product_id: u16,
    /// Serial number to match. `None` accepts any board.
    pub serial_number: Option<String>,
    /// Timeout applied to every control transfer.
    pub timeout: Duration,
}

impl Default for RusbTransportConfig {
    fn default() -> Self {
        RusbTransportConfig {
            vendor_id: GREATFET_VENDOR_ID,
            product_id: GREATFET_PRODUCT_ID,
            serial_number: None,
            timeout: Duration::from_secs(1),
        }
    }
}

/// A [`Transport`] that issues vendor requests to a board with libusb.
pub struct RusbTransport {
    handle: DeviceHandle<Context>,
    timeout: Duration,
}

impl RusbTransport {
    /// Opens the first board matching `config`.
    ///
    /// # Errors
    ///
    /// * [`Transport`](crate::UsbError::Transport) - libusb failed, or no matching board is
    ///   attached (`rusb::Error::NoDevice`).
    pub fn open(config: RusbTransportConfig) -> Result<RusbTransport> {
        let ctx = Context::new()?;

        for device in ctx.devices()?.iter() {
            let descriptor = device.device_descriptor()?;

            if !(descriptor.vendor_id() == config.vendor_id
                && descriptor.product_id() == config.product_id)
            {
                continue;
            }

            let mut handle = device.open()?;

            if let Some(serial) = &config.serial_number {
                if handle.read_serial_number_string_ascii(&descriptor)? != *serial {
                    continue;
                }
            }

            // Boards only provide a single configuration.
            handle.set_active_configuration(1)?;

            usb_debug!(
                "opened board {:04x}:{:04x}",
                config.vendor_id,
                config.product_id
            );

            return Ok(RusbTransport {
                handle,
                timeout: config.timeout,
            });
        }

        Err(UsbError::from(rusb::Error::NoDevice))
    }
}

impl Transport for RusbTransport {
    fn vendor_request_in(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        length: usize,
    ) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];

        let count = self.handle.read_control(
            request_type(Direction::In, RequestType::Vendor, Recipient::Device),
            request.into(),
            value,
            index,
            &mut buf,
            self.timeout,
        )?;

        buf.truncate(count);
        Ok(buf)
    }

    fn vendor_request_out(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()> {
        self.handle.write_control(
            request_type(Direction::Out, RequestType::Vendor, Recipient::Device),
            request.into(),
            value,
            index,
            data,
            self.timeout,
        )?;

        Ok(())
    }
}
