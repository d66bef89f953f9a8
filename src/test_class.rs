#![allow(missing_docs)]

use crate::descriptor::{descriptor_type, lang_id, DescriptorWriter, DeviceDescriptor};
use crate::device_prelude::*;
use std::collections::VecDeque;

/// Loopback virtual device for testing the engine and board firmware. Everything the host writes
/// to the bulk OUT endpoint is echoed back on the bulk IN endpoint. A few vendor requests give
/// access to a scratch buffer over the control endpoint.
pub struct TestClass {
    buffer: [u8; 128],
    address: u8,
    configured: bool,
    pending: VecDeque<u8>,
}

pub const VID: u16 = 0x1d50;
pub const PID: u16 = 0x60e7;
pub const MANUFACTURER: &str = "GreatDancer";
pub const PRODUCT: &str = "GreatDancer Loopback";
pub const SERIAL_NUMBER: &str = "0001";

pub const CONFIGURATION_VALUE: u8 = 1;
pub const EP_OUT: u8 = 1;
pub const EP_IN: u8 = 2;
pub const PACKET_SIZE: u16 = 64;

pub const REQ_STORE_REQUEST: u8 = 1;
pub const REQ_READ_BUFFER: u8 = 2;
pub const REQ_WRITE_BUFFER: u8 = 3;
pub const REQ_UNKNOWN: u8 = 42;

impl Default for TestClass {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClass {
    pub fn new() -> TestClass {
        TestClass {
            buffer: [0; 128],
            address: 0,
            configured: false,
            pending: VecDeque::new(),
        }
    }

    /// The single configuration of the device: one vendor interface with a bulk OUT and a bulk IN
    /// endpoint.
    pub fn configuration() -> Configuration {
        Configuration::new(CONFIGURATION_VALUE).interface(
            Interface::new(0)
                .endpoint(EndpointDescriptor::bulk_out(EP_OUT, PACKET_SIZE))
                .endpoint(EndpointDescriptor::bulk_in(EP_IN, PACKET_SIZE)),
        )
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Data received on the OUT endpoint that has not been echoed yet.
    pub fn pending(&self) -> &VecDeque<u8> {
        &self.pending
    }

    fn standard_request(&mut self, bus: &mut Bus, req: &SetupRequest) -> Result<()> {
        const CONFIGURATION_VALUE_U16: u16 = CONFIGURATION_VALUE as u16;

        match (req.direction, req.request) {
            (Direction::DeviceToHost, SetupRequest::GET_DESCRIPTOR) => {
                match self.descriptor(req.descriptor_type_index()) {
                    Some(descriptor) => respond(bus, req, &descriptor),
                    None => bus.stall_ep0(),
                }
            }
            (Direction::DeviceToHost, SetupRequest::GET_CONFIGURATION) => {
                let value = if self.configured { CONFIGURATION_VALUE } else { 0 };
                respond(bus, req, &[value])
            }
            (Direction::DeviceToHost, SetupRequest::GET_STATUS) => respond(bus, req, &[0, 0]),
            (Direction::HostToDevice, SetupRequest::SET_ADDRESS) => {
                self.address = req.value as u8;
                bus.set_address(self.address)
            }
            (Direction::HostToDevice, SetupRequest::SET_CONFIGURATION) => match req.value {
                0 => {
                    self.configured = false;
                    bus.configure(Configuration::new(0))
                }
                CONFIGURATION_VALUE_U16 => {
                    self.configured = true;
                    bus.configure(Self::configuration())
                }
                _ => bus.stall_ep0(),
            },
            (Direction::HostToDevice, SetupRequest::SET_INTERFACE)
            | (Direction::HostToDevice, SetupRequest::CLEAR_FEATURE) => Ok(()),
            _ => bus.stall_ep0(),
        }
    }

    fn descriptor(&self, (dtype, index): (u8, u8)) -> Option<Vec<u8>> {
        let mut writer = DescriptorWriter::new();

        match (dtype, index) {
            (descriptor_type::DEVICE, _) => {
                let mut device = DeviceDescriptor::new(VID, PID);
                device.manufacturer = 1;
                device.product = 2;
                device.serial_number = 3;
                writer.device(&device);
            }
            (descriptor_type::CONFIGURATION, 0) => writer.configuration(&Self::configuration(), 50),
            (descriptor_type::STRING, 0) => writer.languages(&[lang_id::ENGLISH_US]),
            (descriptor_type::STRING, 1) => writer.string(MANUFACTURER),
            (descriptor_type::STRING, 2) => writer.string(PRODUCT),
            (descriptor_type::STRING, 3) => writer.string(SERIAL_NUMBER),
            _ => return None,
        }

        Some(writer.into_bytes())
    }

    fn vendor_request(&mut self, bus: &mut Bus, req: &SetupRequest, data: &[u8]) -> Result<()> {
        let buf = &mut self.buffer;

        match (req.direction, req.request) {
            (Direction::DeviceToHost, REQ_READ_BUFFER) if req.length as usize <= buf.len() => {
                bus.send_on_endpoint(0, &buf[..req.length as usize])
            }
            (Direction::HostToDevice, REQ_STORE_REQUEST) => {
                buf[..8].copy_from_slice(&req.to_bytes());
                Ok(())
            }
            (Direction::HostToDevice, REQ_WRITE_BUFFER) if data.len() <= buf.len() => {
                buf[..data.len()].copy_from_slice(data);
                Ok(())
            }
            _ => bus.stall_ep0(),
        }
    }
}

/// Sends at most as many bytes as the host asked for.
fn respond(bus: &mut Bus, req: &SetupRequest, data: &[u8]) -> Result<()> {
    let len = data.len().min(req.length as usize);
    bus.send_on_endpoint(0, &data[..len])
}

impl VirtualDevice for TestClass {
    fn handle_request(&mut self, bus: &mut Bus, req: &SetupRequest, data: &[u8]) -> Result<()> {
        match (req.request_type, req.recipient) {
            (RequestType::Standard, _) => self.standard_request(bus, req),
            (RequestType::Vendor, Recipient::Device) => self.vendor_request(bus, req, data),
            _ => bus.stall_ep0(),
        }
    }

    fn handle_data_available(&mut self, _bus: &mut Bus, endpoint: u8, data: &[u8]) -> Result<()> {
        if endpoint == EP_OUT {
            self.pending.extend(data);
        }

        Ok(())
    }

    fn handle_buffer_available(&mut self, bus: &mut Bus, endpoint: u8) -> Result<()> {
        if endpoint != EP_IN || self.pending.is_empty() {
            return Ok(());
        }

        let count = self.pending.len().min(PACKET_SIZE as usize);
        let packet: Vec<u8> = self.pending.drain(..count).collect();

        bus.send_on_endpoint(EP_IN, &packet)
    }

    fn reset(&mut self) {
        self.address = 0;
        self.configured = false;
        self.pending.clear();
    }
}
