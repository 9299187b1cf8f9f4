//! Correlator under randomized reply ordering

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use rand::Rng;
use recswitch_protocol::core::address::MacAddress;
use recswitch_protocol::core::codec;
use recswitch_protocol::core::command::{Command, GpioStatus, Response};
use recswitch_protocol::core::session::Session;
use recswitch_protocol::error::Result;
use recswitch_protocol::protocol::correlator::{Correlator, Delivery};
use recswitch_protocol::transport::Transmit;
use recswitch_protocol::utils::crypto::{CipherKeys, KeyRing};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Answers every request from a spawned task after a random delay.
#[derive(Default)]
struct ScrambledEcho {
    correlator: OnceLock<Correlator>,
}

#[async_trait]
impl Transmit for ScrambledEcho {
    fn is_available(&self) -> bool {
        true
    }

    async fn send_to(&self, packet: &[u8], _destination: SocketAddr) -> Result<()> {
        let correlator = self.correlator.get().expect("correlator attached").clone();
        let request = codec::decode(packet, &CipherKeys::default())?;
        let delay = Duration::from_millis(rand::rng().random_range(0..20));

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let device = Session::for_address(request.address);
            let reply = codec::encode_response(
                &device,
                request.message_id,
                request.command,
                &request.response,
                true,
            )
            .unwrap();
            assert!(matches!(
                correlator.on_packet_received(&reply),
                Delivery::Fulfilled(_)
            ));
        });
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_replies_in_any_order() {
    let echo = Arc::new(ScrambledEcho::default());
    let keys = Arc::new(KeyRing::new(CipherKeys::default()));
    let correlator = Correlator::new(echo.clone(), keys, Duration::from_secs(5));
    assert!(echo.correlator.set(correlator.clone()).is_ok());

    let destination: SocketAddr = "127.0.0.1:18530".parse().unwrap();
    let sessions: Vec<Arc<Session>> = (0..8u8)
        .map(|i| Arc::new(Session::for_address(MacAddress::new([0x10, 0, 0, 0, 0, i]))))
        .collect();

    let mut tasks = tokio::task::JoinSet::new();
    for round in 0..500usize {
        let session = Arc::clone(&sessions[round % sessions.len()]);
        let correlator = correlator.clone();
        tasks.spawn(async move {
            let flag = (round % 4) as u8;
            let state = round % 3 == 0;
            let reply = correlator
                .send(&session, &Command::SetGpioStatus { flag, state }, destination)
                .await
                .unwrap();
            assert_eq!(
                reply.await.unwrap(),
                Response::GpioStatus(GpioStatus { flag, state })
            );
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    assert_eq!(correlator.pending_count(), 0);
}
