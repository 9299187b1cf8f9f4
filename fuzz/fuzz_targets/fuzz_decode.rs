#![no_main]

use libfuzzer_sys::fuzz_target;
use recswitch_protocol::core::codec;
use recswitch_protocol::utils::crypto::CipherKeys;

fuzz_target!(|data: &[u8]| {
    // Arbitrary datagrams must be rejected cleanly, never panic
    let _ = codec::decode(data, &CipherKeys::default());
});
