mod test_helpers;
use crate::test_helpers::*;

use greatdancer::board::{BoardEntry, BOARD_REGISTRY};
use greatdancer::descriptor::{descriptor_type, DescriptorWriter, DeviceDescriptor};
use greatdancer::device_prelude::*;
use greatdancer::endpoint::EndpointState;
use greatdancer::prelude::*;
use greatdancer::register::{decode_register, EndpointBitmap, IrqStatus};
use greatdancer::transport::VendorRequest::*;
use rand::prelude::*;

#[test]
fn register_is_little_endian() {
    assert_eq!(decode_register(&[1, 0, 0, 0]).unwrap(), 1);
    assert_eq!(decode_register(&[0x78, 0x56, 0x34, 0x12]).unwrap(), 0x1234_5678);

    let mut rng = rand::thread_rng();
    let value: u32 = rng.gen();
    assert_eq!(decode_register(&value.to_le_bytes()).unwrap(), value);
}

#[test]
fn short_register_is_rejected() {
    for len in 0..4 {
        match decode_register(&vec![0xff; len]) {
            Err(UsbError::MalformedRegister { expected: 4, actual }) => assert_eq!(actual, len),
            other => panic!("expected malformed register, got {:?}", other),
        }
    }
}

#[test]
fn irq_status_bits() {
    let status = IrqStatus(IrqStatus::USB_INTERRUPT | IrqStatus::BUS_RESET);
    assert!(status.usb_interrupt());
    assert!(status.bus_reset());

    let status = IrqStatus(1 << 2);
    assert!(!status.usb_interrupt());
    assert!(!status.bus_reset());
}

#[test]
fn endpoint_bitmap_splits_directions() {
    let bitmap = EndpointBitmap(0x0004_0003);

    assert_eq!(bitmap.out_endpoints().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(bitmap.in_endpoints().collect::<Vec<_>>(), vec![2]);
    assert_eq!(EndpointBitmap::from_masks(0b11, 0b100), bitmap);

    // Bits past the supported endpoints are not reported.
    let bitmap = EndpointBitmap::from_masks(1 << 5, 1 << 7);
    assert!(!bitmap.is_empty());
    assert_eq!(bitmap.out_endpoints().count(), 0);
    assert_eq!(bitmap.in_endpoints().count(), 0);
}

#[test]
fn readiness_bit_set_means_primed() {
    let readiness = EndpointBitmap::from_masks(0b10, 0b100);

    assert!(!readiness.out_ready(1));
    assert!(readiness.out_ready(2));
    assert!(!readiness.in_ready(2));
    assert!(readiness.in_ready(1));
}

#[test]
fn setup_packet_fields() {
    let req = SetupRequest::parse(&[0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00]).unwrap();

    assert_eq!(req.direction, Direction::DeviceToHost);
    assert_eq!(req.request_type, RequestType::Standard);
    assert_eq!(req.recipient, Recipient::Device);
    assert_eq!(req.request, SetupRequest::GET_DESCRIPTOR);
    assert_eq!(req.value, 0x0100);
    assert_eq!(req.index, 0);
    assert_eq!(req.length, 18);
    assert_eq!(req.descriptor_type_index(), (descriptor_type::DEVICE, 0));
    assert!(!req.has_out_data());

    let req = SetupRequest::parse(&[0x41, 0x03, 0xcd, 0xab, 0x34, 0x12, 0x40, 0x00]).unwrap();

    assert_eq!(req.direction, Direction::HostToDevice);
    assert_eq!(req.request_type, RequestType::Vendor);
    assert_eq!(req.recipient, Recipient::Interface);
    assert_eq!(req.value, 0xabcd);
    assert_eq!(req.index, 0x1234);
    assert_eq!(req.length, 64);
    assert!(req.has_out_data());
    assert_eq!(
        req.to_bytes(),
        [0x41, 0x03, 0xcd, 0xab, 0x34, 0x12, 0x40, 0x00]
    );
}

#[test]
fn setup_packet_must_be_eight_bytes() {
    assert!(matches!(
        SetupRequest::parse(&[0; 7]),
        Err(UsbError::InvalidSetupPacket)
    ));
    assert!(matches!(
        SetupRequest::parse(&[0; 9]),
        Err(UsbError::InvalidSetupPacket)
    ));
}

#[test]
fn endpoint_command() {
    assert_eq!(
        EndpointDescriptor::bulk_in(2, 512).to_command(),
        [0x82, 0x00, 0x02, 0x02]
    );
    assert_eq!(
        EndpointDescriptor::interrupt_out(3, 8, 10).to_command(),
        [0x03, 0x08, 0x00, 0x03]
    );

    let address = EndpointAddress::from_parts(1, UsbDirection::In);
    assert_eq!(u8::from(address), 0x81);
    assert!(address.is_in());
    assert_eq!(address.number(), 1);
}

#[test]
fn endpoint_table_follows_configuration_order() {
    let config = Configuration::new(1)
        .interface(Interface::new(0).endpoint(EndpointDescriptor::interrupt_in(3, 8, 10)))
        .interface(
            Interface::new(1)
                .endpoint(EndpointDescriptor::bulk_out(1, 64))
                .endpoint(EndpointDescriptor::bulk_in(1, 64)),
        );

    assert_eq!(
        config.endpoint_table(),
        vec![
            0x83, 0x08, 0x00, 0x03, //
            0x01, 0x40, 0x00, 0x02, //
            0x81, 0x40, 0x00, 0x02,
        ]
    );
    assert!(Configuration::new(1).endpoint_table().is_empty());
}

#[test]
fn endpoint_state_flags() {
    let mut state = EndpointState::new();

    state.mark_stalled(2).unwrap();
    assert!(state.is_stalled(2));
    assert!(!state.is_stalled(1));

    state.clear_stalled(2).unwrap();
    assert!(!state.is_stalled(2));

    assert!(matches!(
        state.mark_stalled(SUPPORTED_ENDPOINTS),
        Err(UsbError::InvalidEndpoint(4))
    ));
    assert!(!state.is_stalled(200));

    state.mark_stalled(0).unwrap();
    state.reset();
    assert!(!state.is_stalled(0));
}

#[test]
fn descriptor_writer_lengths() {
    let mut writer = DescriptorWriter::new();
    writer.device(&DeviceDescriptor::new(0x1d50, 0x60e7));
    assert_eq!(writer.position(), 18);

    let mut writer = DescriptorWriter::new();
    writer.configuration(
        &Configuration::new(1).interface(
            Interface::new(0)
                .class(0x03, 0x01, 0x01)
                .endpoint(EndpointDescriptor::interrupt_in(1, 8, 10)),
        ),
        50,
    );

    let bytes = writer.into_bytes();
    assert_eq!(bytes.len(), 9 + 9 + 7);
    assert_eq!(&bytes[..9], &[9, 2, 25, 0, 1, 1, 0, 0x80, 50]);
    assert_eq!(&bytes[9..18], &[9, 4, 0, 0, 1, 0x03, 0x01, 0x01, 0]);
    assert_eq!(&bytes[18..], &[7, 5, 0x81, 0x03, 8, 0, 10]);
}

#[test]
fn board_autodetect() {
    assert_eq!(Board::autodetect(0).unwrap(), Board::GreatFetOne);
    assert_eq!(Board::autodetect(1).unwrap(), Board::Azalea);
    assert!(matches!(
        Board::autodetect(7),
        Err(UsbError::InvalidBoard(7))
    ));
    assert_eq!(BOARD_REGISTRY.len(), 2);
}

#[test]
fn board_registry_first_match_wins() {
    let registry = [
        BoardEntry {
            board: Board::Azalea,
            handled_ids: &[3, 4],
        },
        BoardEntry {
            board: Board::GreatFetOne,
            handled_ids: &[4],
        },
    ];

    assert_eq!(Board::autodetect_in(&registry, 4).unwrap(), Board::Azalea);
    assert!(Board::autodetect_in(&[], 0).is_err());
}

#[test]
fn board_detect_reads_board_id() {
    let mut t = MockTransport::new();
    t.queue_response(ReadBoardId, &[0]);

    assert_eq!(Board::detect(&mut t).unwrap(), Board::GreatFetOne);
    assert_eq!(t.requests(), vec![ReadBoardId]);
    assert_eq!(Board::GreatFetOne.name(), "GreatFET One");

    let mut t = MockTransport::new();
    t.queue_response(ReadBoardId, &[9]);

    assert!(matches!(Board::detect(&mut t), Err(UsbError::InvalidBoard(9))));

    let mut t = MockTransport::new();
    t.queue_response(ReadBoardId, &[]);

    assert!(matches!(Board::detect(&mut t), Err(UsbError::MissingBoardId)));
}
