use crate::config::Configuration;

/// Standard descriptor types
#[allow(missing_docs)]
pub mod descriptor_type {
    pub const DEVICE: u8 = 1;
    pub const CONFIGURATION: u8 = 2;
    pub const STRING: u8 = 3;
    pub const INTERFACE: u8 = 4;
    pub const ENDPOINT: u8 = 5;
}

/// String descriptor language IDs.
pub mod lang_id {
    /// English (US)
    ///
    /// Recommended for use as the first language ID for compatibility.
    pub const ENGLISH_US: u16 = 0x0409;
}

/// Fields of a standard device descriptor.
#[derive(Clone, Debug)]
pub struct DeviceDescriptor {
    /// bcdUSB.
    pub usb_release: u16,
    /// Device class code. `0x00` defers to the interfaces.
    pub device_class: u8,
    /// Device subclass code.
    pub device_sub_class: u8,
    /// Device protocol code.
    pub device_protocol: u8,
    /// Maximum packet size of the control endpoint.
    pub max_packet_size_0: u8,
    /// idVendor.
    pub vendor_id: u16,
    /// idProduct.
    pub product_id: u16,
    /// bcdDevice.
    pub device_release: u16,
    /// Index of the manufacturer string, or 0.
    pub manufacturer: u8,
    /// Index of the product string, or 0.
    pub product: u8,
    /// Index of the serial number string, or 0.
    pub serial_number: u8,
}

impl DeviceDescriptor {
    /// Creates a USB 2.0 device descriptor for the given IDs, with no string indices.
    pub fn new(vendor_id: u16, product_id: u16) -> DeviceDescriptor {
        DeviceDescriptor {
            usb_release: 0x0200,
            device_class: 0x00,
            device_sub_class: 0x00,
            device_protocol: 0x00,
            max_packet_size_0: 64,
            vendor_id,
            product_id,
            device_release: 0x0010,
            manufacturer: 0,
            product: 0,
            serial_number: 0,
        }
    }
}

/// Configuration attribute bits
pub const CONFIG_ATTRIBUTES_RESERVED: u8 = 0x80;

/// Writes USB descriptors into a growable buffer.
#[derive(Default)]
pub struct DescriptorWriter {
    buf: Vec<u8>,
}

impl DescriptorWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        DescriptorWriter::default()
    }

    /// Gets the number of bytes written so far.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Consumes the writer and returns the descriptors.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Writes an arbitrary (usually class-specific) descriptor. The length and type fields are
    /// prepended.
    pub fn write(&mut self, descriptor_type: u8, descriptor: &[u8]) {
        self.buf.push((descriptor.len() + 2) as u8);
        self.buf.push(descriptor_type);
        self.buf.extend_from_slice(descriptor);
    }

    /// Writes a device descriptor.
    pub fn device(&mut self, device: &DeviceDescriptor) {
        let [usb_l, usb_h] = device.usb_release.to_le_bytes();
        let [vid_l, vid_h] = device.vendor_id.to_le_bytes();
        let [pid_l, pid_h] = device.product_id.to_le_bytes();
        let [rel_l, rel_h] = device.device_release.to_le_bytes();

        self.write(
            descriptor_type::DEVICE,
            &[
                usb_l,
                usb_h,
                device.device_class,
                device.device_sub_class,
                device.device_protocol,
                device.max_packet_size_0,
                vid_l,
                vid_h,
                pid_l,
                pid_h,
                rel_l,
                rel_h,
                device.manufacturer,
                device.product,
                device.serial_number,
                1, // bNumConfigurations
            ],
        );
    }

    /// Writes a configuration descriptor followed by the interface and endpoint descriptors of
    /// every interface in `config`. `max_power` is in units of 2mA.
    pub fn configuration(&mut self, config: &Configuration, max_power: u8) {
        let start = self.position();

        self.write(
            descriptor_type::CONFIGURATION,
            &[
                0,
                0, // wTotalLength, patched below
                config.interfaces.len() as u8,
                config.value,
                0, // iConfiguration
                CONFIG_ATTRIBUTES_RESERVED,
                max_power,
            ],
        );

        for interface in &config.interfaces {
            self.write(
                descriptor_type::INTERFACE,
                &[
                    interface.number,
                    interface.alternate_setting,
                    interface.endpoints.len() as u8,
                    interface.class,
                    interface.sub_class,
                    interface.protocol,
                    0, // iInterface
                ],
            );

            for ep in &interface.endpoints {
                let [mps_l, mps_h] = ep.max_packet_size.to_le_bytes();

                self.write(
                    descriptor_type::ENDPOINT,
                    &[
                        ep.address.into(),
                        ep.ep_type.into(),
                        mps_l,
                        mps_h,
                        ep.interval,
                    ],
                );
            }
        }

        let total_length = (self.position() - start) as u16;
        self.buf[start + 2..start + 4].copy_from_slice(&total_length.to_le_bytes());
    }

    /// Writes the string descriptor listing the supported language IDs.
    pub fn languages(&mut self, lang_ids: &[u16]) {
        let data: Vec<u8> = lang_ids.iter().flat_map(|id| id.to_le_bytes()).collect();
        self.write(descriptor_type::STRING, &data);
    }

    /// Writes a string descriptor, encoded as UTF-16LE.
    pub fn string(&mut self, string: &str) {
        let data: Vec<u8> = string.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        self.write(descriptor_type::STRING, &data);
    }
}
