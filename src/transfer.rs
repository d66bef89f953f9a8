use crate::bus::Bus;
use crate::class::VirtualDevice;
use crate::device::Deferred;
use crate::endpoint::EndpointType;
use crate::{Result, UsbDirection};

/// Handles every transfer the controller reports complete, then runs the readiness scan.
///
/// Completed transfers are cleaned up on every reported endpoint before any data is collected:
/// the byte count of a primed read is only latched by the clean-up.
pub(crate) fn handle_transfer_events(bus: &mut Bus, device: &mut dyn VirtualDevice) -> Result<()> {
    let status = bus.fetch_transfer_status()?;

    if status.is_empty() {
        return Ok(());
    }

    for number in 0..crate::SUPPORTED_ENDPOINTS {
        if status.out_bit(number) {
            bus.clean_up_transfer(number, UsbDirection::Out)?;
        }

        if status.in_bit(number) {
            bus.clean_up_transfer(number, UsbDirection::In)?;
        }
    }

    let mut deferred = Deferred::default();

    for number in status.out_endpoints() {
        deferred.check(handle_out_complete(bus, device, number))?;
    }

    // Completed IN transfers surface through the readiness scan as idle endpoints.
    deferred.check(handle_transfer_readiness(bus, device))?;

    deferred.finish()
}

fn handle_out_complete(bus: &mut Bus, device: &mut dyn VirtualDevice, number: u8) -> Result<()> {
    if number == 0 {
        // Control OUT data is collected by the setup handler's blocking reads.
        usb_trace!("ignoring completion on ep0 OUT");
        return Ok(());
    }

    let data = bus.finish_primed_read(number)?;
    usb_trace!("received {} bytes on ep{}", data.len(), number);

    device.handle_data_available(bus, number, &data)
}

/// Walks the active configuration: idle IN endpoints are offered to the device, idle OUT endpoints
/// that are not waiting on a read are primed.
pub(crate) fn handle_transfer_readiness(
    bus: &mut Bus,
    device: &mut dyn VirtualDevice,
) -> Result<()> {
    bus.state().configuration_changed = false;

    if bus.configuration().is_none() {
        return Ok(());
    }

    let endpoints = bus.state().endpoints.active().clone();
    let readiness = bus.fetch_transfer_readiness()?;

    let mut deferred = Deferred::default();

    for ep in endpoints
        .iter()
        .filter(|ep| ep.number() != 0 && ep.ep_type != EndpointType::Control)
    {
        let number = ep.number();

        match ep.address.direction() {
            UsbDirection::In => {
                if readiness.in_ready(number) {
                    deferred.check(device.handle_buffer_available(bus, number))?;
                }
            }
            UsbDirection::Out => {
                if readiness.out_ready(number) && !bus.state().endpoints.is_armed(number) {
                    bus.prime_out_endpoint(number)?;
                }
            }
        }
    }

    deferred.finish()
}
