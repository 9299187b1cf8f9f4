//! Wire-format edge cases and exact byte layouts

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use recswitch_protocol::core::address::MacAddress;
use recswitch_protocol::core::codec;
use recswitch_protocol::core::command::{
    Command, CommandTag, GpioStatus, ModuleInfo, Response,
};
use recswitch_protocol::core::packet::{HeaderFlags, HEADER_LEN};
use recswitch_protocol::core::session::Session;
use recswitch_protocol::error::{InvalidPacket, ProtocolError};
use recswitch_protocol::utils::crypto::{CipherKeys, Crypto};

const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

fn plain_session() -> Session {
    Session::new(ADDRESS).unwrap().with_encryption(false)
}

#[test]
fn test_get_gpio_exact_bytes() {
    let session = plain_session().with_initial_message_id(0x1233);
    let (message_id, bytes) =
        codec::encode(&session, &Command::GetGpioStatus { flag: 0 }).unwrap();

    assert_eq!(message_id, 0x1234);
    assert_eq!(
        bytes,
        vec![
            0x01, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x10, // header
            0x00, 0x12, 0x34, 0xD1, 0xF1, 0x21, 0xB4, // payload header
            0x02, 0x00, 0x00, 0x00, 0xFF, // get-gpio
            0x04, 0x04, 0x04, 0x04, // padding
        ]
    );
}

#[test]
fn test_set_gpio_off_body() {
    let session = plain_session().with_initial_message_id(0);
    let (message_id, bytes) =
        codec::encode(&session, &Command::SetGpioStatus { flag: 3, state: false }).unwrap();

    assert_eq!(message_id, 1);
    assert_eq!(&bytes[HEADER_LEN + 7..HEADER_LEN + 12], &[0x01, 0x03, 0x00, 0x00, 0xFF]);
}

#[test]
fn test_encrypted_request_layout() {
    let session = Session::new(ADDRESS).unwrap().with_initial_message_id(0x0FFF);
    let (message_id, bytes) = codec::encode(&session, &Command::QueryModuleInfo).unwrap();

    assert_eq!(bytes[1], HeaderFlags::ENCRYPTED.bits());
    let payload = &bytes[HEADER_LEN..];
    assert_eq!(payload.len(), bytes[8] as usize);
    assert_eq!(payload.len() % 16, 0);

    let plain = Crypto::new(&CipherKeys::default()).decrypt(payload).unwrap();
    assert_eq!(&plain[..3], &[0x00, 0x10, 0x00]);
    assert_eq!(message_id, 0x1000);
    assert_eq!(plain[7], 0x62);
    assert!(plain[8..].iter().all(|&b| b == 0x04));
}

#[test]
fn test_message_id_wraps_to_one() {
    let session = plain_session().with_initial_message_id(u16::MAX - 1);
    assert_eq!(session.next_message_id(), u16::MAX);
    assert_eq!(session.next_message_id(), 1);
    assert_eq!(session.next_message_id(), 2);
}

#[test]
fn test_module_info_reply_fields() {
    let session = Session::new(ADDRESS).unwrap();
    let info = ModuleInfo {
        hw_version: "1.0".into(),
        sw_version: "2.1".into(),
        device_name: "SW01".into(),
        status: 0x03,
    };
    let bytes = codec::encode_response(
        &session,
        77,
        CommandTag::QueryModuleInfo,
        &Response::ModuleInfo(info.clone()),
        true,
    )
    .unwrap();

    let decoded = codec::decode(&bytes, &session).unwrap();
    assert!(decoded.is_reback());
    assert_eq!(decoded.message_id, 77);
    assert_eq!(decoded.response, Response::ModuleInfo(info));
}

#[test]
fn test_module_info_status_is_last_byte_read() {
    // len|hw|len|sw|len|name|status, then filler
    let mut payload = vec![0x00, 0x00, 0x2A, 0xD1, 0xF1, 0x21, 0xB4, 0x62];
    for field in ["1.0", "2.1", "SW01"] {
        payload.push(field.len() as u8);
        payload.extend_from_slice(field.as_bytes());
    }
    payload.push(0x07);
    payload.resize(32, 0x04);

    let mut datagram = vec![0x01, HeaderFlags::REBACK.bits(), 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
    datagram.push(payload.len() as u8);
    datagram.extend_from_slice(&payload);

    let decoded = codec::decode(&datagram, &CipherKeys::default()).unwrap();
    match decoded.response {
        Response::ModuleInfo(info) => {
            assert_eq!(info.hw_version, "1.0");
            assert_eq!(info.sw_version, "2.1");
            assert_eq!(info.device_name, "SW01");
            assert_eq!(info.status, 0x07);
        }
        other => panic!("expected module info, got {other:?}"),
    }
}

#[test]
fn test_unsolicited_report_decodes_as_gpio_status() {
    let session = plain_session();
    let bytes = codec::encode_response(
        &session,
        9,
        CommandTag::ReportGpioChange,
        &Response::GpioStatus(GpioStatus { flag: 2, state: true }),
        false,
    )
    .unwrap();

    let decoded = codec::decode(&bytes, &session).unwrap();
    assert!(!decoded.is_reback());
    assert_eq!(decoded.command, CommandTag::ReportGpioChange);
    assert_eq!(
        decoded.to_command(),
        Some(Command::ReportGpioChange { flag: 2, state: true })
    );
}

#[test]
fn test_empty_and_header_only_inputs() {
    let keys = CipherKeys::default();
    for len in 0..HEADER_LEN {
        let data = vec![0x01; len];
        assert!(matches!(
            codec::decode(&data, &keys),
            Err(ProtocolError::InvalidPacket(InvalidPacket::TooShort { len: l })) if l == len
        ));
    }

    let header_only = [0x01, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00];
    assert!(matches!(
        codec::decode(&header_only, &keys),
        Err(ProtocolError::InvalidPacket(InvalidPacket::TooShort { .. }))
    ));
}

#[test]
fn test_bad_version_rejected() {
    let (_, mut bytes) = codec::encode(&plain_session(), &Command::HeartBeat).unwrap();
    bytes[0] = 0x02;
    assert!(matches!(
        codec::decode(&bytes, &CipherKeys::default()),
        Err(ProtocolError::InvalidPacket(InvalidPacket::BadVersion(0x02)))
    ));
}

#[test]
fn test_declared_length_too_long() {
    let (_, mut bytes) = codec::encode(&plain_session(), &Command::HeartBeat).unwrap();
    bytes[8] = 0x20;
    assert!(matches!(
        codec::decode(&bytes, &CipherKeys::default()),
        Err(ProtocolError::InvalidPacket(InvalidPacket::LengthMismatch {
            declared: 0x20,
            available: 16
        }))
    ));
}

#[test]
fn test_unknown_command_tag() {
    let (_, mut bytes) = codec::encode(&plain_session(), &Command::HeartBeat).unwrap();
    bytes[HEADER_LEN + 7] = 0x55;
    assert!(matches!(
        codec::decode(&bytes, &CipherKeys::default()),
        Err(ProtocolError::InvalidPacket(InvalidPacket::UnknownCommand { tag: 0x55 }))
    ));
}

#[test]
fn test_encrypted_payload_not_block_aligned() {
    let mut datagram = vec![0x01, HeaderFlags::ENCRYPTED.bits(), 1, 2, 3, 4, 5, 6, 20];
    datagram.extend_from_slice(&[0u8; 20]);
    assert!(matches!(
        codec::decode(&datagram, &CipherKeys::default()),
        Err(ProtocolError::InvalidPacket(InvalidPacket::Undecryptable))
    ));
}

#[test]
fn test_session_rejects_malformed_addresses() {
    for bad in ["", "AA:BB:CC:DD:EE", "AA:BB:CC:DD:EE:GG", "AABBCCDDEEFF00", "AA:BB:CC:DD:EE:FF:00"] {
        assert!(
            matches!(Session::new(bad), Err(ProtocolError::InvalidAddressFormat(_))),
            "accepted {bad:?}"
        );
    }
    assert_eq!(
        Session::new("aa-bb-cc-dd-ee-ff").unwrap().address(),
        MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])
    );
}

#[test]
fn test_invalid_flag_leaves_counter_untouched() {
    let session = plain_session().with_initial_message_id(10);
    assert!(matches!(
        codec::encode(&session, &Command::GetGpioStatus { flag: 4 }),
        Err(ProtocolError::InvalidGpioFlag(4))
    ));
    assert_eq!(session.next_message_id(), 11);
}
