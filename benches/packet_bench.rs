use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use recswitch_protocol::core::codec;
use recswitch_protocol::core::command::{Command, CommandTag, ModuleInfo, Response};
use recswitch_protocol::core::session::Session;

#[allow(clippy::unwrap_used)]
fn bench_packet_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode_decode");

    for encrypted in [false, true] {
        let label = if encrypted { "aes" } else { "plain" };
        let session = Session::new("AA:BB:CC:DD:EE:FF")
            .unwrap()
            .with_encryption(encrypted);

        group.bench_function(format!("encode_set_gpio_{label}"), |b| {
            b.iter_batched(
                || Command::SetGpioStatus { flag: 1, state: true },
                |command| codec::encode(&session, &command).unwrap(),
                BatchSize::SmallInput,
            )
        });

        let (_, request) = codec::encode(&session, &Command::GetGpioStatus { flag: 2 }).unwrap();
        group.bench_function(format!("decode_get_gpio_{label}"), |b| {
            b.iter(|| {
                let decoded = codec::decode(&request, &session);
                assert!(decoded.is_ok());
            })
        });

        let reply = codec::encode_response(
            &session,
            0x1234,
            CommandTag::QueryModuleInfo,
            &Response::ModuleInfo(ModuleInfo {
                hw_version: "1.0".into(),
                sw_version: "2.1".into(),
                device_name: "SW01".into(),
                status: 1,
            }),
            true,
        )
        .unwrap();
        group.bench_function(format!("decode_module_info_{label}"), |b| {
            b.iter(|| {
                let decoded = codec::decode(&reply, &session);
                assert!(decoded.is_ok());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_packet_encode_decode);
criterion_main!(benches);
