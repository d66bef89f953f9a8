use crate::{Result, UsbError};
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// Length of a SETUP packet.
pub const SETUP_PACKET_SIZE: usize = 8;

/// Control request direction.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive, IntoPrimitive)]
pub enum Direction {
    /// Host-to-device direction (control OUT transfer)
    HostToDevice = 0,
    /// Device-to-host direction (control IN transfer)
    DeviceToHost = 1,
}

/// Control request type.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive, IntoPrimitive)]
pub enum RequestType {
    /// Request is a USB standard request.
    Standard = 0,
    /// Request is intended for a USB class.
    Class = 1,
    /// Request is vendor-specific.
    Vendor = 2,
    /// Reserved.
    Reserved = 3,
}

/// Control request recipient.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, FromPrimitive, IntoPrimitive)]
pub enum Recipient {
    /// Request is intended for the entire device.
    Device = 0,
    /// Request is intended for an interface. Generally, the `index` field of the request specifies
    /// the interface number.
    Interface = 1,
    /// Request is intended for an endpoint. Generally, the `index` field of the request specifies
    /// the endpoint address.
    Endpoint = 2,
    /// None of the above.
    Other = 3,
    /// Reserved.
    #[num_enum(default)]
    Reserved = 4,
}

/// A control request read from a SETUP packet.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SetupRequest {
    /// Direction of the request.
    pub direction: Direction,
    /// Type of the request.
    pub request_type: RequestType,
    /// Recipient of the request.
    pub recipient: Recipient,
    /// Request code. The meaning of the value depends on the previous fields.
    pub request: u8,
    /// Request value. The meaning of the value depends on the previous fields.
    pub value: u16,
    /// Request index. The meaning of the value depends on the previous fields.
    pub index: u16,
    /// Length of the DATA stage. For control OUT transfers this is the exact length of the data the
    /// host sends. For control IN transfers this is the maximum length of data the device should
    /// return.
    pub length: u16,
}

impl SetupRequest {
    /// Standard USB control request Get Status
    pub const GET_STATUS: u8 = 0;
    /// Standard USB control request Clear Feature
    pub const CLEAR_FEATURE: u8 = 1;
    /// Standard USB control request Set Feature
    pub const SET_FEATURE: u8 = 3;
    /// Standard USB control request Set Address
    pub const SET_ADDRESS: u8 = 5;
    /// Standard USB control request Get Descriptor
    pub const GET_DESCRIPTOR: u8 = 6;
    /// Standard USB control request Set Descriptor
    pub const SET_DESCRIPTOR: u8 = 7;
    /// Standard USB control request Get Configuration
    pub const GET_CONFIGURATION: u8 = 8;
    /// Standard USB control request Set Configuration
    pub const SET_CONFIGURATION: u8 = 9;
    /// Standard USB control request Get Interface
    pub const GET_INTERFACE: u8 = 10;
    /// Standard USB control request Set Interface
    pub const SET_INTERFACE: u8 = 11;
    /// Standard USB control request Synch Frame
    pub const SYNCH_FRAME: u8 = 12;

    /// Parses a SETUP packet.
    ///
    /// # Errors
    ///
    /// * [`InvalidSetupPacket`](crate::UsbError::InvalidSetupPacket) - `buf` is not exactly 8
    ///   bytes long.
    pub fn parse(buf: &[u8]) -> Result<SetupRequest> {
        if buf.len() != SETUP_PACKET_SIZE {
            return Err(UsbError::InvalidSetupPacket);
        }

        let rt = buf[0];

        Ok(SetupRequest {
            direction: Direction::try_from(rt >> 7).map_err(|_| UsbError::InvalidSetupPacket)?,
            request_type: RequestType::try_from((rt >> 5) & 0b11)
                .map_err(|_| UsbError::InvalidSetupPacket)?,
            recipient: Recipient::from_primitive(rt & 0b11111),
            request: buf[1],
            value: u16::from_le_bytes([buf[2], buf[3]]),
            index: u16::from_le_bytes([buf[4], buf[5]]),
            length: u16::from_le_bytes([buf[6], buf[7]]),
        })
    }

    /// Encodes the request back into a SETUP packet.
    pub fn to_bytes(&self) -> [u8; SETUP_PACKET_SIZE] {
        let mut buf = [0u8; SETUP_PACKET_SIZE];

        buf[0] = (u8::from(self.direction) << 7)
            | (u8::from(self.request_type) << 5)
            | (u8::from(self.recipient) & 0b11111);
        buf[1] = self.request;
        buf[2..4].copy_from_slice(&self.value.to_le_bytes());
        buf[4..6].copy_from_slice(&self.index.to_le_bytes());
        buf[6..8].copy_from_slice(&self.length.to_le_bytes());

        buf
    }

    /// Returns true for control OUT transfers that carry a DATA stage.
    #[inline]
    pub fn has_out_data(&self) -> bool {
        self.direction == Direction::HostToDevice && self.length > 0
    }

    /// Gets the descriptor type and index from the value field of a GET_DESCRIPTOR request.
    pub fn descriptor_type_index(&self) -> (u8, u8) {
        ((self.value >> 8) as u8, self.value as u8)
    }
}
