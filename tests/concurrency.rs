use recswitch_protocol::core::codec;
use recswitch_protocol::core::command::Command;
use recswitch_protocol::core::session::Session;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_encode_allocates_unique_ids() {
    use tokio::task::JoinSet;

    let session = Arc::new(Session::new("AA:BB:CC:DD:EE:FF").unwrap());
    let per_task = 4_000usize;

    let mut tasks = JoinSet::new();
    for flag in 0..8u8 {
        let session = Arc::clone(&session);
        tasks.spawn(async move {
            let mut ids = Vec::with_capacity(per_task);
            for i in 0..per_task {
                let command = Command::SetGpioStatus {
                    flag: flag % 4,
                    state: i % 2 == 0,
                };
                let (id, bytes) = codec::encode(&session, &command).unwrap();
                let decoded = codec::decode(&bytes, session.as_ref()).unwrap();
                assert_eq!(decoded.message_id, id);
                ids.push(id);
            }
            ids
        });
    }

    let mut seen = HashSet::new();
    while let Some(res) = tasks.join_next().await {
        for id in res.unwrap() {
            assert!(seen.insert(id), "id {id} allocated twice");
        }
    }
    assert_eq!(seen.len(), 8 * per_task);
}
