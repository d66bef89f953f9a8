use crate::bus::Bus;
use crate::control::SetupRequest;
use crate::Result;

/// A USB peripheral emulated on top of the engine. Implement this to describe how the emulated
/// device answers the host.
///
/// All methods receive a [`Bus`] through which the device responds: sending data, stalling
/// endpoints, setting its address and installing a configuration. Returning an error from a
/// callback aborts the current transaction; for control requests this means no status stage is
/// sent.
pub trait VirtualDevice {
    /// Called for every control request received on a control endpoint.
    ///
    /// For control OUT requests with a DATA stage, `data` holds the data the host sent. For all
    /// other requests it is empty.
    ///
    /// To answer a control IN request, send the response with
    /// [`send_on_endpoint`](Bus::send_on_endpoint) on the request's endpoint. To reject any request,
    /// stall the endpoint with [`stall_endpoint`](Bus::stall_endpoint). The engine completes the
    /// status stage of requests that were not stalled once this method returns.
    fn handle_request(&mut self, bus: &mut Bus, request: &SetupRequest, data: &[u8]) -> Result<()>;

    /// Called when the host has sent data on a non-control OUT endpoint of the active
    /// configuration.
    fn handle_data_available(&mut self, bus: &mut Bus, endpoint: u8, data: &[u8]) -> Result<()> {
        let _ = (bus, endpoint, data);
        Ok(())
    }

    /// Called when a non-control IN endpoint of the active configuration has no transfer queued,
    /// so the device may send more data on it. Called once per readiness scan for as long as the
    /// endpoint stays idle.
    fn handle_buffer_available(&mut self, bus: &mut Bus, endpoint: u8) -> Result<()> {
        let _ = (bus, endpoint);
        Ok(())
    }

    /// Called after the host reset the bus. The device should return to its unaddressed,
    /// unconfigured state.
    fn reset(&mut self) {}
}

impl<D: VirtualDevice + ?Sized> VirtualDevice for &mut D {
    fn handle_request(&mut self, bus: &mut Bus, request: &SetupRequest, data: &[u8]) -> Result<()> {
        (**self).handle_request(bus, request, data)
    }

    fn handle_data_available(&mut self, bus: &mut Bus, endpoint: u8, data: &[u8]) -> Result<()> {
        (**self).handle_data_available(bus, endpoint, data)
    }

    fn handle_buffer_available(&mut self, bus: &mut Bus, endpoint: u8) -> Result<()> {
        (**self).handle_buffer_available(bus, endpoint)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
