use crate::config::Configuration;
use crate::{Result, UsbDirection, UsbError, SUPPORTED_ENDPOINTS};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// USB endpoint address that contains a direction and number.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EndpointAddress(u8);

impl From<u8> for EndpointAddress {
    #[inline]
    fn from(addr: u8) -> EndpointAddress {
        EndpointAddress(addr)
    }
}

impl From<EndpointAddress> for u8 {
    #[inline]
    fn from(addr: EndpointAddress) -> u8 {
        addr.0
    }
}

impl EndpointAddress {
    const INBITS: u8 = UsbDirection::In as u8;

    /// Constructs a new EndpointAddress with the given number and direction.
    #[inline]
    pub fn from_parts(number: u8, dir: UsbDirection) -> Self {
        EndpointAddress(number | dir as u8)
    }

    /// Gets the direction part of the address.
    #[inline]
    pub fn direction(&self) -> UsbDirection {
        if (self.0 & Self::INBITS) != 0 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        }
    }

    /// Returns true if the endpoint is an OUT endpoint.
    #[inline]
    pub fn is_out(&self) -> bool {
        self.direction() == UsbDirection::Out
    }

    /// Returns true if the endpoint is an IN endpoint.
    #[inline]
    pub fn is_in(&self) -> bool {
        self.direction() == UsbDirection::In
    }

    /// Gets the number part of the endpoint address.
    #[inline]
    pub fn number(&self) -> u8 {
        self.0 & !Self::INBITS
    }
}

/// USB endpoint transfer type. The values of this enum can be directly cast into `u8` to get the
/// transfer bmAttributes transfer type bits.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive, IntoPrimitive)]
pub enum EndpointType {
    /// Control endpoint. Used for device management. Only the host can initiate requests. Usually
    /// used only endpoint 0.
    Control = 0b00,

    /// Isochronous endpoint. Used for time-critical unreliable data.
    Isochronous = 0b01,

    /// Bulk endpoint. Used for large amounts of best-effort reliable data.
    Bulk = 0b10,

    /// Interrupt endpoint. Used for small amounts of time-critical reliable data.
    Interrupt = 0b11,
}

/// USB endpoint descriptor information.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EndpointDescriptor {
    /// Endpoint address.
    pub address: EndpointAddress,

    /// Endpoint transfer type.
    pub ep_type: EndpointType,

    /// Maximum packet size.
    pub max_packet_size: u16,

    /// Poll interval for interrupt and isochronous endpoints.
    pub interval: u8,
}

impl EndpointDescriptor {
    /// Creates a descriptor for an endpoint with the given number and direction.
    pub const fn new(
        number: u8,
        direction: UsbDirection,
        ep_type: EndpointType,
        max_packet_size: u16,
    ) -> EndpointDescriptor {
        EndpointDescriptor {
            address: EndpointAddress(number | direction as u8),
            ep_type,
            max_packet_size,
            interval: 0,
        }
    }

    /// Creates a bulk IN endpoint descriptor.
    pub const fn bulk_in(number: u8, max_packet_size: u16) -> EndpointDescriptor {
        Self::new(number, UsbDirection::In, EndpointType::Bulk, max_packet_size)
    }

    /// Creates a bulk OUT endpoint descriptor.
    pub const fn bulk_out(number: u8, max_packet_size: u16) -> EndpointDescriptor {
        Self::new(number, UsbDirection::Out, EndpointType::Bulk, max_packet_size)
    }

    /// Creates an interrupt IN endpoint descriptor.
    pub const fn interrupt_in(number: u8, max_packet_size: u16, interval: u8) -> EndpointDescriptor {
        EndpointDescriptor {
            interval,
            ..Self::new(number, UsbDirection::In, EndpointType::Interrupt, max_packet_size)
        }
    }

    /// Creates an interrupt OUT endpoint descriptor.
    pub const fn interrupt_out(number: u8, max_packet_size: u16, interval: u8) -> EndpointDescriptor {
        EndpointDescriptor {
            interval,
            ..Self::new(number, UsbDirection::Out, EndpointType::Interrupt, max_packet_size)
        }
    }

    /// Gets the endpoint number.
    #[inline]
    pub fn number(&self) -> u8 {
        self.address.number()
    }

    /// Encodes the endpoint for the set-up-endpoints command:
    /// `[address, max_packet_size_low, max_packet_size_high, transfer_type]`.
    pub fn to_command(&self) -> [u8; 4] {
        let [mps_l, mps_h] = self.max_packet_size.to_le_bytes();
        [u8::from(self.address), mps_l, mps_h, u8::from(self.ep_type)]
    }
}

/// Checks that an endpoint number is handled by the emulated controller.
#[inline]
pub(crate) fn check_number(number: u8) -> Result<usize> {
    if number < SUPPORTED_ENDPOINTS {
        Ok(number as usize)
    } else {
        Err(UsbError::InvalidEndpoint(number))
    }
}

/// Maximum number of endpoints a configuration can hold: every supported number in both
/// directions.
pub const MAX_CONFIGURED_ENDPOINTS: usize = 2 * SUPPORTED_ENDPOINTS as usize;

#[derive(Copy, Clone, Default, Debug)]
struct EndpointFlags {
    stalled: bool,
    armed: bool,
}

/// Bookkeeping for every supported endpoint number. Owns no hardware; the engine updates it as it
/// drives the controller.
///
/// The stall flag of an endpoint number is the single source of truth for whether the automatic
/// status stage of the current control transaction fires. The armed flag tracks OUT endpoints that
/// have been primed and not yet completed, so the readiness scan never primes twice.
#[derive(Debug)]
pub struct EndpointState {
    flags: [EndpointFlags; SUPPORTED_ENDPOINTS as usize],
    active: heapless::Vec<EndpointDescriptor, MAX_CONFIGURED_ENDPOINTS>,
}

impl Default for EndpointState {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointState {
    /// Creates the tracker with every endpoint unstalled and unarmed.
    pub fn new() -> EndpointState {
        EndpointState {
            flags: [EndpointFlags::default(); SUPPORTED_ENDPOINTS as usize],
            active: heapless::Vec::new(),
        }
    }

    /// Records that `number` was stalled.
    pub fn mark_stalled(&mut self, number: u8) -> Result<()> {
        let i = check_number(number)?;
        self.flags[i].stalled = true;
        Ok(())
    }

    /// Clears the stall record for `number`.
    pub fn clear_stalled(&mut self, number: u8) -> Result<()> {
        let i = check_number(number)?;
        self.flags[i].stalled = false;
        Ok(())
    }

    /// Gets whether `number` has been stalled during the current transaction. Unsupported numbers
    /// are never stalled.
    pub fn is_stalled(&self, number: u8) -> bool {
        check_number(number)
            .map(|i| self.flags[i].stalled)
            .unwrap_or(false)
    }

    pub(crate) fn mark_armed(&mut self, number: u8) -> Result<()> {
        let i = check_number(number)?;
        self.flags[i].armed = true;
        Ok(())
    }

    pub(crate) fn clear_armed(&mut self, number: u8) -> Result<()> {
        let i = check_number(number)?;
        self.flags[i].armed = false;
        Ok(())
    }

    /// Gets whether a read is currently primed on OUT endpoint `number`.
    pub fn is_armed(&self, number: u8) -> bool {
        check_number(number)
            .map(|i| self.flags[i].armed)
            .unwrap_or(false)
    }

    /// Forgets every stall and armed flag. Called when the hardware drops its transfers, on bus
    /// reset and on disconnect.
    pub fn reset(&mut self) {
        self.flags = [EndpointFlags::default(); SUPPORTED_ENDPOINTS as usize];
    }

    /// Replaces the endpoints considered by the readiness scan with those of `config`. Nothing of
    /// the previous configuration survives, including armed flags.
    pub(crate) fn install(&mut self, config: &Configuration) -> Result<()> {
        let mut active = heapless::Vec::new();

        for ep in config.endpoints() {
            check_number(ep.number())?;
            active.push(*ep).map_err(|_| UsbError::EndpointOverflow)?;
        }

        self.active = active;

        for flags in self.flags.iter_mut() {
            flags.armed = false;
        }

        Ok(())
    }

    /// Endpoints of the active configuration, in configuration order.
    pub fn active_endpoints(&self) -> &[EndpointDescriptor] {
        &self.active
    }

    pub(crate) fn active(&self) -> &heapless::Vec<EndpointDescriptor, MAX_CONFIGURED_ENDPOINTS> {
        &self.active
    }
}
