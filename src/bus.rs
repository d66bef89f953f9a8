use crate::cancel::CancelToken;
use crate::config::Configuration;
use crate::control::{Direction, SetupRequest, SETUP_PACKET_SIZE};
use crate::endpoint::{check_number, EndpointState};
use crate::register::{EndpointBitmap, IrqStatus};
use crate::transport::{Transport, VendorRequest};
use crate::{Result, UsbDirection, UsbError};

/// Largest byte count a single non-blocking read can return. The data is fetched with one vendor
/// request, whose length field is 16 bits wide.
pub const MAX_TRANSFER_LENGTH: u16 = u16::MAX;

/// Engine state that outlives a single [`Bus`] borrow.
#[derive(Debug)]
pub(crate) struct BusState {
    pub endpoints: EndpointState,
    pub configuration: Option<Configuration>,
    pub configuration_changed: bool,
    pub busy_wait_limit: Option<u32>,
    pub cancel: CancelToken,
}

impl BusState {
    pub fn new(busy_wait_limit: Option<u32>, cancel: CancelToken) -> BusState {
        BusState {
            endpoints: EndpointState::new(),
            configuration: None,
            configuration_changed: false,
            busy_wait_limit,
            cancel,
        }
    }
}

/// Access to the emulated controller's endpoints.
///
/// A `Bus` is handed to every [`VirtualDevice`](crate::class::VirtualDevice) callback and is also
/// what the engine itself drives the hardware through. Every method translates into one or more
/// vendor requests on the underlying [`Transport`].
pub struct Bus<'a> {
    transport: &'a mut dyn Transport,
    state: &'a mut BusState,
}

impl<'a> Bus<'a> {
    pub(crate) fn new(transport: &'a mut dyn Transport, state: &'a mut BusState) -> Bus<'a> {
        Bus { transport, state }
    }

    /// Queues `data` for transmission on IN endpoint `number`. An empty slice sends a zero-length
    /// packet.
    ///
    /// # Errors
    ///
    /// * [`InvalidEndpoint`](crate::UsbError::InvalidEndpoint) - `number` is not supported.
    pub fn send_on_endpoint(&mut self, number: u8, data: &[u8]) -> Result<()> {
        check_number(number)?;
        usb_trace!("sending {} bytes on ep{}", data.len(), number);

        self.transport
            .vendor_request_out(VendorRequest::SendOnEndpoint, 0, number.into(), data)
    }

    /// Stalls endpoint `number`. Stalling the control endpoint from within
    /// [`handle_request`](crate::class::VirtualDevice::handle_request) rejects the request and
    /// suppresses the automatic status stage.
    pub fn stall_endpoint(&mut self, number: u8) -> Result<()> {
        self.state.endpoints.mark_stalled(number)?;
        usb_debug!("stalling ep{}", number);

        self.transport
            .vendor_request_out(VendorRequest::StallEndpoint, 0, number.into(), &[])
    }

    /// Stalls the control endpoint.
    pub fn stall_ep0(&mut self) -> Result<()> {
        self.stall_endpoint(0)
    }

    /// Gets whether endpoint `number` was stalled during the current transaction.
    pub fn is_stalled(&self, number: u8) -> bool {
        self.state.endpoints.is_stalled(number)
    }

    /// Sets the device address of the emulated controller.
    pub fn set_address(&mut self, address: u8) -> Result<()> {
        usb_debug!("setting address {}", address);

        self.transport
            .vendor_request_out(VendorRequest::SetAddress, address.into(), 0, &[])
    }

    /// Installs `config` as the active configuration: its endpoints are set up in hardware and
    /// replace everything the readiness scan considered before. The scan itself runs as soon as
    /// the current callback returns.
    ///
    /// # Errors
    ///
    /// * [`InvalidEndpoint`](crate::UsbError::InvalidEndpoint) - An endpoint number is not
    ///   supported. Nothing is installed.
    /// * [`EndpointOverflow`](crate::UsbError::EndpointOverflow) - The configuration holds more
    ///   endpoints than the controller. Nothing is installed.
    pub fn configure(&mut self, config: Configuration) -> Result<()> {
        self.state.endpoints.install(&config)?;

        let table = config.endpoint_table();

        for ep in config.endpoints() {
            usb_debug!(
                "setting up ep{} ({:?}, {:?}, max packet size {})",
                ep.number(),
                ep.address.direction(),
                ep.ep_type,
                ep.max_packet_size
            );
        }

        if !table.is_empty() {
            self.transport
                .vendor_request_out(VendorRequest::SetUpEndpoints, 0, 0, &table)?;
        }

        self.state.configuration = Some(config);
        self.state.configuration_changed = true;

        Ok(())
    }

    /// Gets the active configuration, if one was installed.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.state.configuration.as_ref()
    }

    /// Performs a blocking read on OUT endpoint `number`: primes the endpoint, waits for the host
    /// to complete a transfer and returns the received data.
    ///
    /// # Errors
    ///
    /// * [`Timeout`](crate::UsbError::Timeout) - The busy-wait limit was reached.
    /// * [`Cancelled`](crate::UsbError::Cancelled) - The cancellation token fired while waiting.
    pub fn read_from_endpoint(&mut self, number: u8) -> Result<Vec<u8>> {
        self.prime_out_endpoint(number)?;
        self.wait_for_transfer(number, UsbDirection::Out)?;
        // The firmware only latches the byte count when the descriptor is retired.
        self.clean_up_transfer(number, UsbDirection::Out)?;
        self.finish_primed_read(number)
    }

    /// Primes OUT endpoint `number` so it can receive data the next time the host sends it. Does
    /// not wait for the transfer.
    pub(crate) fn prime_out_endpoint(&mut self, number: u8) -> Result<()> {
        check_number(number)?;
        usb_trace!("priming ep{}", number);

        self.transport
            .vendor_request_out(VendorRequest::StartNonblockingRead, 0, number.into(), &[])?;
        self.state.endpoints.mark_armed(number)
    }

    /// Busy-waits until the transfer-complete bit of the given endpoint is set.
    fn wait_for_transfer(&mut self, number: u8, direction: UsbDirection) -> Result<()> {
        let mut polls: u32 = 0;

        loop {
            self.state.cancel.check()?;

            if self.transfer_is_complete(number, direction)? {
                return Ok(());
            }

            polls += 1;

            if let Some(limit) = self.state.busy_wait_limit {
                if polls >= limit {
                    return Err(UsbError::Timeout { endpoint: number });
                }
            }
        }
    }

    fn transfer_is_complete(&mut self, number: u8, direction: UsbDirection) -> Result<bool> {
        let status = self.fetch_transfer_status()?;

        Ok(match direction {
            UsbDirection::Out => status.out_bit(number),
            UsbDirection::In => status.in_bit(number),
        })
    }

    /// Collects the data of a completed non-blocking read on endpoint `number`. The transfer must
    /// have been cleaned up already.
    ///
    /// # Errors
    ///
    /// * [`InvalidTransferLength`](crate::UsbError::InvalidTransferLength) - The reported byte
    ///   count does not fit a single vendor request. The endpoint is left unarmed.
    pub(crate) fn finish_primed_read(&mut self, number: u8) -> Result<Vec<u8>> {
        let length = self
            .transport
            .read_register(VendorRequest::GetNonblockingLength, number.into())?;

        self.state.endpoints.clear_armed(number)?;

        if length == 0 {
            return Ok(Vec::new());
        }

        if length > u32::from(MAX_TRANSFER_LENGTH) {
            return Err(UsbError::InvalidTransferLength {
                endpoint: number,
                length,
            });
        }

        self.transport.vendor_request_in(
            VendorRequest::FinishNonblockingRead,
            0,
            number.into(),
            length as usize,
        )
    }

    /// Responds to the status stage of a successfully completed control transfer.
    pub(crate) fn ack_status_stage(&mut self, direction: Direction, number: u8) -> Result<()> {
        match direction {
            // The host reads a zero-length packet from us.
            Direction::HostToDevice => self.send_on_endpoint(number, &[]),
            // The host sends a zero-length packet, which needs a primed descriptor to land in.
            Direction::DeviceToHost => self.read_from_endpoint(number).map(|_| ()),
        }
    }

    /// Reads the SETUP packet latched on endpoint `number`. The firmware clears the endpoint's
    /// setup-pending bit as a side effect.
    pub(crate) fn read_setup(&mut self, number: u8) -> Result<SetupRequest> {
        let data = self.transport.vendor_request_in(
            VendorRequest::ReadSetup,
            0,
            number.into(),
            SETUP_PACKET_SIZE,
        )?;

        SetupRequest::parse(&data)
    }

    /// Retires completed transfer descriptors on one endpoint.
    pub(crate) fn clean_up_transfer(&mut self, number: u8, direction: UsbDirection) -> Result<()> {
        usb_trace!("cleaning up transfers on ep{} {:?}", number, direction);

        let value = match direction {
            UsbDirection::In => 1,
            UsbDirection::Out => 0,
        };

        self.transport
            .vendor_request_out(VendorRequest::CleanUpTransfer, value, number.into(), &[])
    }

    pub(crate) fn acknowledge_bus_reset(&mut self) -> Result<()> {
        self.transport
            .vendor_request_out(VendorRequest::BusReset, 0, 0, &[])
    }

    pub(crate) fn fetch_irq_status(&mut self) -> Result<IrqStatus> {
        let status = self.transport.read_register(VendorRequest::GetStatus, 0)?;
        usb_trace!("irq status {:#010x}", status);
        Ok(IrqStatus(status))
    }

    pub(crate) fn fetch_setup_status(&mut self) -> Result<EndpointBitmap> {
        let status = self.transport.read_register(VendorRequest::GetSetupStatus, 0)?;
        usb_trace!("setup status {:#010x}", status);
        Ok(EndpointBitmap(status))
    }

    pub(crate) fn fetch_transfer_status(&mut self) -> Result<EndpointBitmap> {
        let status = self
            .transport
            .read_register(VendorRequest::GetTransferStatus, 0)?;
        usb_trace!("transfer status {:#010x}", status);
        Ok(EndpointBitmap(status))
    }

    pub(crate) fn fetch_transfer_readiness(&mut self) -> Result<EndpointBitmap> {
        let status = self
            .transport
            .read_register(VendorRequest::GetTransferReadiness, 0)?;
        usb_trace!("transfer readiness {:#010x}", status);
        Ok(EndpointBitmap(status))
    }

    pub(crate) fn state(&mut self) -> &mut BusState {
        &mut *self.state
    }
}
