use crate::bus::Bus;
use crate::class::VirtualDevice;
use crate::device::Deferred;
use crate::transfer;
use crate::Result;

/// Handles every setup packet the controller has latched, one transaction per endpoint.
pub(crate) fn handle_setup_events(bus: &mut Bus, device: &mut dyn VirtualDevice) -> Result<()> {
    let status = bus.fetch_setup_status()?;

    if status.is_empty() {
        return Ok(());
    }

    let mut deferred = Deferred::default();

    for number in status.out_endpoints() {
        deferred.check(handle_setup_event(bus, device, number))?;
    }

    deferred.finish()
}

/// Runs one control transaction on endpoint `number`: SETUP, optional OUT DATA stage, dispatch to
/// the virtual device and STATUS stage.
pub(crate) fn handle_setup_event(
    bus: &mut Bus,
    device: &mut dyn VirtualDevice,
    number: u8,
) -> Result<()> {
    // A stall only ever answers the transaction it was raised in.
    bus.state().endpoints.clear_stalled(number)?;

    let request = bus.read_setup(number)?;

    usb_debug!(
        "SETUP ep{} {:?} {:?} {:?} req:{} val:{} idx:{} len:{}",
        number,
        request.direction,
        request.request_type,
        request.recipient,
        request.request,
        request.value,
        request.index,
        request.length
    );

    // The DATA stage is collected right after the SETUP packet, before the request is dispatched.
    let data = if request.has_out_data() {
        let mut data = bus.read_from_endpoint(number)?;

        if data.len() != request.length as usize {
            usb_debug!(
                "ep{} DATA stage carried {} bytes, expected {}",
                number,
                data.len(),
                request.length
            );
        }

        data.truncate(request.length as usize);
        data
    } else {
        Vec::new()
    };

    device.handle_request(bus, &request, &data)?;

    if bus.is_stalled(number) {
        usb_debug!("ep{} stalled, skipping status stage", number);
    } else {
        bus.ack_status_stage(request.direction, number)?;
    }

    if bus.state().configuration_changed {
        transfer::handle_transfer_readiness(bus, device)?;
    }

    Ok(())
}
