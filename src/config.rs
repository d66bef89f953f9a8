use crate::endpoint::EndpointDescriptor;

/// An interface of a device configuration and the endpoints it uses.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Interface {
    /// bInterfaceNumber.
    pub number: u8,
    /// bAlternateSetting.
    pub alternate_setting: u8,
    /// Interface class code. Non-standard classes should use `0xff` (vendor-specific).
    pub class: u8,
    /// Interface subclass code.
    pub sub_class: u8,
    /// Interface protocol code.
    pub protocol: u8,
    /// Endpoints used by the interface, in descriptor order.
    pub endpoints: Vec<EndpointDescriptor>,
}

impl Interface {
    /// Creates an interface with the given number and the vendor-specific class code.
    pub fn new(number: u8) -> Interface {
        Interface {
            number,
            class: 0xff,
            ..Default::default()
        }
    }

    /// Sets the class, subclass and protocol codes.
    pub fn class(mut self, class: u8, sub_class: u8, protocol: u8) -> Interface {
        self.class = class;
        self.sub_class = sub_class;
        self.protocol = protocol;
        self
    }

    /// Adds an endpoint to the interface.
    pub fn endpoint(mut self, endpoint: EndpointDescriptor) -> Interface {
        self.endpoints.push(endpoint);
        self
    }
}

/// A snapshot of the interfaces and endpoints of a configured device. Installing one with
/// [`Bus::configure`](crate::bus::Bus::configure) replaces the previous configuration wholesale.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Configuration {
    /// bConfigurationValue.
    pub value: u8,
    /// Interfaces, in configuration order.
    pub interfaces: Vec<Interface>,
}

impl Configuration {
    /// Creates an empty configuration with the given bConfigurationValue.
    pub fn new(value: u8) -> Configuration {
        Configuration {
            value,
            interfaces: Vec::new(),
        }
    }

    /// Adds an interface to the configuration.
    pub fn interface(mut self, interface: Interface) -> Configuration {
        self.interfaces.push(interface);
        self
    }

    /// Iterates over every endpoint of every interface, interfaces in configuration order and
    /// endpoints in interface order.
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.interfaces.iter().flat_map(|i| i.endpoints.iter())
    }

    /// Encodes the endpoint table sent with the set-up-endpoints request: four bytes per endpoint,
    /// see [`EndpointDescriptor::to_command`]. The hardware indexes endpoints only by position, so
    /// the order is exactly that of [`endpoints`](Configuration::endpoints).
    pub fn endpoint_table(&self) -> Vec<u8> {
        self.endpoints().flat_map(|ep| ep.to_command()).collect()
    }
}
