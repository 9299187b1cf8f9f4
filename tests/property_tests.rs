//! Property-based tests using proptest
//!
//! These tests check decoder robustness and encode/decode agreement across
//! randomly generated commands, addresses and byte strings.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use recswitch_protocol::core::address::MacAddress;
use recswitch_protocol::core::codec;
use recswitch_protocol::core::command::{Command, MAX_GPIO_FLAG};
use recswitch_protocol::core::packet::HEADER_LEN;
use recswitch_protocol::core::session::Session;
use recswitch_protocol::error::{InvalidPacket, ProtocolError};
use recswitch_protocol::utils::crypto::CipherKeys;

fn command_strategy() -> impl Strategy<Value = Command> {
    let flag = 0..=MAX_GPIO_FLAG;
    prop_oneof![
        (flag.clone(), any::<bool>())
            .prop_map(|(flag, state)| Command::SetGpioStatus { flag, state }),
        flag.clone().prop_map(|flag| Command::GetGpioStatus { flag }),
        (flag, any::<bool>()).prop_map(|(flag, state)| Command::ReportGpioChange { flag, state }),
        Just(Command::HeartBeat),
        Just(Command::QueryModuleInfo),
    ]
}

// Property: decoding recovers the command, id and address with encryption on or off
proptest! {
    #[test]
    fn prop_command_roundtrip(
        command in command_strategy(),
        address in any::<[u8; 6]>(),
        last_id in any::<u16>(),
        encrypted in any::<bool>(),
    ) {
        let session = Session::for_address(MacAddress::new(address))
            .with_encryption(encrypted)
            .with_initial_message_id(last_id);

        let (message_id, bytes) = codec::encode(&session, &command).expect("encode should succeed");
        let decoded = codec::decode(&bytes, &session).expect("decode should succeed");

        prop_assert_ne!(message_id, 0);
        prop_assert_eq!(decoded.message_id, message_id);
        prop_assert_eq!(decoded.address, session.address());
        prop_assert_eq!(decoded.command, command.tag());
        prop_assert_eq!(decoded.flags.is_encrypted(), encrypted);
        prop_assert_eq!(decoded.to_command(), Some(command));
    }
}

// Property: anything shorter than the header is "too short", never a panic
proptest! {
    #[test]
    fn prop_short_input_is_too_short(data in prop::collection::vec(any::<u8>(), 0..HEADER_LEN)) {
        let len = data.len();
        let result = codec::decode(&data, &CipherKeys::default());
        prop_assert!(matches!(
            result,
            Err(ProtocolError::InvalidPacket(InvalidPacket::TooShort { len: l })) if l == len
        ), "expected TooShort error");
    }
}

// Property: a declared payload length that disagrees with the buffer is rejected
proptest! {
    #[test]
    fn prop_length_mismatch_rejected(
        command in command_strategy(),
        declared in any::<u8>(),
        encrypted in any::<bool>(),
    ) {
        let session = Session::for_address(MacAddress::new([1, 2, 3, 4, 5, 6]))
            .with_encryption(encrypted);
        let (_, mut bytes) = codec::encode(&session, &command).unwrap();
        let actual = bytes.len() - HEADER_LEN;
        prop_assume!(declared as usize != actual);

        bytes[8] = declared;
        let result = codec::decode(&bytes, &session);
        prop_assert!(matches!(
            result,
            Err(ProtocolError::InvalidPacket(InvalidPacket::LengthMismatch { .. }))
        ), "expected LengthMismatch error");
    }
}

// Property: truncating a valid datagram past the header is a length mismatch
proptest! {
    #[test]
    fn prop_truncated_datagram_rejected(command in command_strategy(), cut in 1usize..16) {
        let session = Session::for_address(MacAddress::new([6, 5, 4, 3, 2, 1]));
        let (_, bytes) = codec::encode(&session, &command).unwrap();
        let truncated = &bytes[..bytes.len() - cut];

        prop_assert!(matches!(
            codec::decode(truncated, &session),
            Err(ProtocolError::InvalidPacket(InvalidPacket::LengthMismatch { .. }))
        ), "expected LengthMismatch error");
    }
}

// Property: the decoder never panics on arbitrary input
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..300)) {
        let _ = codec::decode(&data, &CipherKeys::default());
    }
}

// Property: ids from one session are distinct within a full cycle
proptest! {
    #[test]
    fn prop_ids_skip_zero(last_id in any::<u16>(), count in 1usize..2048) {
        let session = Session::for_address(MacAddress::new([0; 6])).with_initial_message_id(last_id);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..count {
            let id = session.next_message_id();
            prop_assert_ne!(id, 0);
            prop_assert!(seen.insert(id));
        }
    }
}
