#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use greatdancer::device_prelude::*;
use greatdancer::prelude::*;
use greatdancer::register::{EndpointBitmap, IrqStatus};

pub use greatdancer::test_class;

/// Busy-wait limit used by test engines, low enough to make timeouts cheap.
pub const BUSY_WAIT_LIMIT: u32 = 16;

/// A vendor request as seen by the board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    In {
        request: VendorRequest,
        value: u16,
        index: u16,
        length: usize,
    },
    Out {
        request: VendorRequest,
        value: u16,
        index: u16,
        data: Vec<u8>,
    },
}

impl Call {
    pub fn request(&self) -> VendorRequest {
        match self {
            Call::In { request, .. } | Call::Out { request, .. } => *request,
        }
    }

    pub fn index(&self) -> u16 {
        match self {
            Call::In { index, .. } | Call::Out { index, .. } => *index,
        }
    }

    pub fn value(&self) -> u16 {
        match self {
            Call::In { value, .. } | Call::Out { value, .. } => *value,
        }
    }
}

const REGISTERS: &[VendorRequest] = &[
    VendorRequest::GetStatus,
    VendorRequest::GetSetupStatus,
    VendorRequest::GetTransferStatus,
    VendorRequest::GetTransferReadiness,
    VendorRequest::GetNonblockingLength,
];

/// Scripted stand-in for the board. Register reads pop queued values and read as zero once the
/// queue runs dry. Every request is recorded.
#[derive(Default)]
pub struct MockTransport {
    pub calls: Vec<Call>,
    registers: HashMap<VendorRequest, VecDeque<u32>>,
    responses: HashMap<VendorRequest, VecDeque<Vec<u8>>>,
    failures: Vec<VendorRequest>,
    cancel_when_idle: Option<CancelToken>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    pub fn queue_register(&mut self, request: VendorRequest, value: u32) -> &mut Self {
        self.registers.entry(request).or_default().push_back(value);
        self
    }

    pub fn queue_irq(&mut self, value: u32) -> &mut Self {
        self.queue_register(VendorRequest::GetStatus, value)
    }

    pub fn queue_setup_status(&mut self, out_mask: u16) -> &mut Self {
        self.queue_register(
            VendorRequest::GetSetupStatus,
            EndpointBitmap::from_masks(out_mask, 0).0,
        )
    }

    pub fn queue_transfer_status(&mut self, out_mask: u16, in_mask: u16) -> &mut Self {
        self.queue_register(
            VendorRequest::GetTransferStatus,
            EndpointBitmap::from_masks(out_mask, in_mask).0,
        )
    }

    pub fn queue_readiness(&mut self, out_primed: u16, in_primed: u16) -> &mut Self {
        self.queue_register(
            VendorRequest::GetTransferReadiness,
            EndpointBitmap::from_masks(out_primed, in_primed).0,
        )
    }

    /// Queues the data returned by the next IN request of this kind, in place of a register value.
    pub fn queue_response(&mut self, request: VendorRequest, data: &[u8]) -> &mut Self {
        self.responses
            .entry(request)
            .or_default()
            .push_back(data.to_vec());
        self
    }

    pub fn queue_setup(&mut self, request: &SetupRequest) -> &mut Self {
        self.queue_response(VendorRequest::ReadSetup, &request.to_bytes())
    }

    /// Queues one completed non-blocking read carrying `data`.
    pub fn queue_read(&mut self, data: &[u8]) -> &mut Self {
        self.queue_register(VendorRequest::GetNonblockingLength, data.len() as u32);

        if !data.is_empty() {
            self.queue_response(VendorRequest::FinishNonblockingRead, data);
        }

        self
    }

    /// Queues a single USB interrupt carrying a setup packet on endpoint 0.
    pub fn queue_control(&mut self, request: &SetupRequest) -> &mut Self {
        self.queue_irq(IrqStatus::USB_INTERRUPT)
            .queue_setup_status(0b1)
            .queue_setup(request)
    }

    pub fn fail_on(&mut self, request: VendorRequest) -> &mut Self {
        self.failures.push(request);
        self
    }

    /// Cancels `token` as soon as the interrupt status queue runs dry.
    pub fn cancel_when_idle(&mut self, token: CancelToken) -> &mut Self {
        self.cancel_when_idle = Some(token);
        self
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn requests(&self) -> Vec<VendorRequest> {
        self.calls.iter().map(Call::request).collect()
    }

    pub fn count(&self, request: VendorRequest) -> usize {
        self.calls.iter().filter(|c| c.request() == request).count()
    }

    pub fn count_on(&self, request: VendorRequest, index: u16) -> usize {
        self.calls
            .iter()
            .filter(|c| c.request() == request && c.index() == index)
            .count()
    }

    /// Data of every OUT request of this kind, with the endpoint index it was sent to.
    pub fn sent(&self, request: VendorRequest) -> Vec<(u16, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Out {
                    request: r,
                    index,
                    data,
                    ..
                } if *r == request => Some((*index, data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Position of the first call matching `request` on `index`.
    pub fn position(&self, request: VendorRequest, index: u16) -> Option<usize> {
        self.calls
            .iter()
            .position(|c| c.request() == request && c.index() == index)
    }

    fn check_failure(&self, request: VendorRequest) -> Result<()> {
        if self.failures.contains(&request) {
            Err(UsbError::transport(format!("injected failure on {:?}", request)))
        } else {
            Ok(())
        }
    }
}

impl Transport for MockTransport {
    fn vendor_request_in(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        length: usize,
    ) -> Result<Vec<u8>> {
        self.calls.push(Call::In {
            request,
            value,
            index,
            length,
        });
        self.check_failure(request)?;

        if let Some(mut data) = self.responses.get_mut(&request).and_then(|q| q.pop_front()) {
            data.truncate(length);
            return Ok(data);
        }

        if REGISTERS.contains(&request) {
            let value = self
                .registers
                .get_mut(&request)
                .and_then(|q| q.pop_front());

            let value = match (value, request) {
                (Some(value), _) => value,
                (None, VendorRequest::GetStatus) => {
                    if let Some(token) = &self.cancel_when_idle {
                        token.cancel();
                    }
                    0
                }
                (None, _) => 0,
            };

            return Ok(value.to_le_bytes().to_vec());
        }

        Ok(Vec::new())
    }

    fn vendor_request_out(
        &mut self,
        request: VendorRequest,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()> {
        self.calls.push(Call::Out {
            request,
            value,
            index,
            data: data.to_vec(),
        });
        self.check_failure(request)
    }
}

pub type RequestHandler = Box<dyn FnMut(&mut Bus, &SetupRequest, &[u8]) -> Result<()>>;

/// Virtual device that records every callback. Requests are accepted unless a handler is set.
#[derive(Default)]
pub struct RecordingDevice {
    pub requests: Vec<(SetupRequest, Vec<u8>)>,
    pub data: Vec<(u8, Vec<u8>)>,
    pub buffer_available: Vec<u8>,
    pub resets: usize,
    pub on_request: Option<RequestHandler>,
}

impl RecordingDevice {
    pub fn new() -> RecordingDevice {
        RecordingDevice::default()
    }

    pub fn with_handler(
        handler: impl FnMut(&mut Bus, &SetupRequest, &[u8]) -> Result<()> + 'static,
    ) -> RecordingDevice {
        RecordingDevice {
            on_request: Some(Box::new(handler)),
            ..Default::default()
        }
    }
}

impl VirtualDevice for RecordingDevice {
    fn handle_request(&mut self, bus: &mut Bus, request: &SetupRequest, data: &[u8]) -> Result<()> {
        self.requests.push((*request, data.to_vec()));

        match &mut self.on_request {
            Some(handler) => handler(bus, request, data),
            None => Ok(()),
        }
    }

    fn handle_data_available(&mut self, _bus: &mut Bus, endpoint: u8, data: &[u8]) -> Result<()> {
        self.data.push((endpoint, data.to_vec()));
        Ok(())
    }

    fn handle_buffer_available(&mut self, _bus: &mut Bus, endpoint: u8) -> Result<()> {
        self.buffer_available.push(endpoint);
        Ok(())
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

pub fn dancer(transport: MockTransport) -> GreatDancer<MockTransport> {
    GreatDancerBuilder::new(transport)
        .busy_wait_limit(Some(BUSY_WAIT_LIMIT))
        .build()
}

pub fn setup(
    direction: Direction,
    request_type: RequestType,
    request: u8,
    value: u16,
    index: u16,
    length: u16,
) -> SetupRequest {
    SetupRequest {
        direction,
        request_type,
        recipient: Recipient::Device,
        request,
        value,
        index,
        length,
    }
}

pub fn standard_out(request: u8, value: u16) -> SetupRequest {
    setup(Direction::HostToDevice, RequestType::Standard, request, value, 0, 0)
}

pub fn standard_in(request: u8, value: u16, length: u16) -> SetupRequest {
    setup(Direction::DeviceToHost, RequestType::Standard, request, value, 0, length)
}

pub fn vendor_out(request: u8, length: u16) -> SetupRequest {
    setup(Direction::HostToDevice, RequestType::Vendor, request, 0, 0, length)
}

pub fn vendor_in(request: u8, length: u16) -> SetupRequest {
    setup(Direction::DeviceToHost, RequestType::Vendor, request, 0, 0, length)
}
