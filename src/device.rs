use crate::bus::{Bus, BusState};
use crate::cancel::CancelToken;
use crate::class::VirtualDevice;
use crate::config::Configuration;
use crate::control_pipe;
use crate::endpoint::EndpointState;
use crate::transfer;
use crate::transport::{Transport, VendorRequest};
use crate::{Result, UsbError};
pub use crate::device_builder::{GreatDancerBuilder, DEFAULT_BUSY_WAIT_LIMIT};

/// The emulated USB device controller.
///
/// `GreatDancer` owns the [`Transport`] to the board and all engine state. It connects the
/// emulated controller to the host and runs the IRQ service loop, which dispatches the host's
/// traffic to a [`VirtualDevice`].
///
/// ``` ignore
/// let mut dancer = GreatDancerBuilder::new(transport).build();
///
/// dancer.connect()?;
/// dancer.service_irqs(&mut device)?;
/// ```
pub struct GreatDancer<T: Transport> {
    transport: T,
    state: BusState,
    connected: bool,
}

impl<T: Transport> GreatDancer<T> {
    pub(crate) fn build(
        transport: T,
        busy_wait_limit: Option<u32>,
        cancel: CancelToken,
    ) -> GreatDancer<T> {
        GreatDancer {
            transport,
            state: BusState::new(busy_wait_limit, cancel),
            connected: false,
        }
    }

    /// Gets a [`Bus`] to drive the emulated controller directly, outside of any callback.
    pub fn bus(&mut self) -> Bus<'_> {
        Bus::new(&mut self.transport, &mut self.state)
    }

    /// Gets the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets the underlying transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the controller and returns the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Gets a clone of the token that stops [`service_irqs`](GreatDancer::service_irqs).
    pub fn cancel_token(&self) -> CancelToken {
        self.state.cancel.clone()
    }

    /// Gets the stall and armed flags of every endpoint.
    pub fn endpoint_state(&self) -> &EndpointState {
        &self.state.endpoints
    }

    /// Gets the active configuration, if one was installed.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.state.configuration.as_ref()
    }

    /// Gets whether [`connect`](GreatDancer::connect) succeeded and no disconnect followed.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Attaches the emulated controller to the host. The host starts enumerating the device as soon
    /// as this returns, so the service loop should be started right after.
    pub fn connect(&mut self) -> Result<()> {
        self.transport
            .vendor_request_out(VendorRequest::Connect, 0, 0, &[])?;

        self.state.endpoints.reset();
        self.connected = true;
        usb_debug!("connected");

        Ok(())
    }

    /// Detaches the emulated controller from the host and forgets the active configuration.
    pub fn disconnect(&mut self) -> Result<()> {
        self.transport
            .vendor_request_out(VendorRequest::Disconnect, 0, 0, &[])?;

        self.state.endpoints.reset();
        self.state.configuration = None;
        self.state.configuration_changed = false;
        self.connected = false;
        usb_debug!("disconnected");

        Ok(())
    }

    /// Installs `config` from outside of a callback and runs the readiness scan for its endpoints
    /// right away.
    pub fn configure(&mut self, config: Configuration, device: &mut dyn VirtualDevice) -> Result<()> {
        let mut bus = self.bus();

        bus.configure(config)?;
        transfer::handle_transfer_readiness(&mut bus, device)
    }

    /// Runs a single iteration of the IRQ service loop: reads the interrupt status and handles
    /// pending setup packets, completed transfers and bus resets.
    ///
    /// Errors of independent transactions do not prevent the others from being handled; the first
    /// one is returned once the iteration is over. Fatal errors end the iteration immediately.
    ///
    /// # Errors
    ///
    /// * [`Cancelled`](crate::UsbError::Cancelled) - The cancellation token fired.
    /// * Any error of the transport or of `device`.
    pub fn poll(&mut self, device: &mut dyn VirtualDevice) -> Result<()> {
        self.state.cancel.check()?;

        let mut bus = Bus::new(&mut self.transport, &mut self.state);
        let status = bus.fetch_irq_status()?;
        let mut deferred = Deferred::default();

        if status.usb_interrupt() {
            deferred.check(control_pipe::handle_setup_events(&mut bus, device))?;
            deferred.check(transfer::handle_transfer_events(&mut bus, device))?;
        }

        // Also covers configurations installed through `bus()` between polls.
        if bus.state().configuration_changed {
            deferred.check(transfer::handle_transfer_readiness(&mut bus, device))?;
        }

        if status.bus_reset() {
            handle_bus_reset(&mut bus, device);
        }

        deferred.finish()
    }

    /// Runs the IRQ service loop until it is cancelled or a fatal error occurs.
    ///
    /// Errors that only affect one transaction, such as a device callback failing or a malformed
    /// setup packet, are logged and the loop carries on. Transport failures and timeouts end the
    /// loop.
    ///
    /// Returns `Ok(())` once the [`CancelToken`] fires.
    pub fn service_irqs(&mut self, device: &mut dyn VirtualDevice) -> Result<()> {
        usb_debug!("servicing IRQs");

        loop {
            match self.poll(device) {
                Ok(()) => {}
                Err(UsbError::Cancelled) => {
                    usb_debug!("IRQ service loop cancelled");
                    return Ok(());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    usb_warn!("transaction aborted: {}", err);
                }
            }
        }
    }
}

fn handle_bus_reset(bus: &mut Bus, device: &mut dyn VirtualDevice) {
    usb_debug!("bus reset");

    if let Err(err) = bus.acknowledge_bus_reset() {
        usb_warn!("failed to acknowledge bus reset: {}", err);
    }

    // The controller flushed every primed transfer.
    bus.state().endpoints.reset();
    device.reset();
}

/// Holds on to the first non-fatal error of a batch of independent transactions, so one failing
/// transaction does not keep the rest from being handled.
#[derive(Default)]
pub(crate) struct Deferred(Option<UsbError>);

impl Deferred {
    /// Passes fatal errors through and stores everything else.
    pub fn check(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Err(err) if !err.is_fatal() => {
                if self.0.is_none() {
                    self.0 = Some(err);
                } else {
                    usb_warn!("transaction aborted: {}", err);
                }

                Ok(())
            }
            other => other,
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.0 {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
