use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::{Peer, PeerState, PeerStats};
use crate::config::PeerRole;
use crate::tests::loopback_session;
use crate::transport::{Endpoint, Message, MessageKind};
use crate::utils::env::{Environment, ManualEnv};

const SOCKET_TIMEOUT: Duration = Duration::from_millis(50);

fn topics(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// A socket standing in for the broker, plus a peer pointed at it.
async fn setup(role: PeerRole) -> (UdpSocket, Peer<ManualEnv>, ManualEnv) {
    let broker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let broker_endpoint = Endpoint::try_from(broker.local_addr().unwrap()).unwrap();
    let env = ManualEnv::new();
    let session = loopback_session(SOCKET_TIMEOUT).await;
    let peer = Peer::with_session(session, broker_endpoint, role, env.clone());
    (broker, peer, env)
}

async fn recv_request(broker: &UdpSocket) -> (Message, std::net::SocketAddr) {
    let mut buf = [0u8; 1024];
    let (len, from) = timeout(Duration::from_secs(1), broker.recv_from(&mut buf))
        .await
        .expect("request within a second")
        .unwrap();
    (Message::from_bytes(&buf[..len]).unwrap(), from)
}

async fn reply(broker: &UdpSocket, to: std::net::SocketAddr, message: &Message) {
    broker.send_to(&message.to_bytes(), to).await.unwrap();
}

/// Answer one Subscribe request with its acknowledgment.
async fn acknowledge(broker: &UdpSocket, env: &ManualEnv) -> (Message, std::net::SocketAddr) {
    let (request, from) = recv_request(broker).await;
    assert_eq!(request.kind(), MessageKind::Subscribe);
    let ack = Message::subscribe(env.now(), request.fields().to_vec());
    reply(broker, from, &ack).await;
    (request, from)
}

#[tokio::test]
async fn test_subscribe_without_broker_reply_returns_false() {
    let (broker, mut peer, _env) = setup(PeerRole::Subscriber(topics(&["a", "b"]))).await;

    let subscribed = peer.subscribe().await.unwrap();
    assert!(!subscribed);
    assert_eq!(peer.state(), PeerState::Unsubscribed);

    let (request, _) = recv_request(&broker).await;
    assert_eq!(request.kind(), MessageKind::Subscribe);
    assert_eq!(request.fields(), topics(&["a", "b"]).as_slice());
    assert_eq!(peer.stats().requests_sent, 1);
    assert_eq!(peer.stats().responses_received, 0);
}

#[tokio::test]
async fn test_subscribe_acknowledged() {
    let (broker, mut peer, env) = setup(PeerRole::Subscriber(topics(&["t"]))).await;

    let (subscribed, _) = tokio::join!(peer.subscribe(), acknowledge(&broker, &env));

    assert!(subscribed.unwrap());
    assert_eq!(peer.state(), PeerState::Subscribed);
    assert_eq!(
        peer.stats(),
        PeerStats {
            requests_sent: 1,
            responses_received: 1,
            ..PeerStats::default()
        }
    );
}

#[tokio::test]
async fn test_publisher_subscribes_with_no_topics() {
    let (broker, mut peer, _env) = setup(PeerRole::Publisher(topics(&["t"]))).await;

    peer.subscribe().await.unwrap();
    let (request, _) = recv_request(&broker).await;
    assert!(request.fields().is_empty());
}

#[tokio::test]
async fn test_submit_sends_topic_and_fields() {
    let (broker, mut peer, env) = setup(PeerRole::Publisher(topics(&["t"]))).await;

    peer.submit("t", &topics(&["1.5", "x"])).await.unwrap();

    let (request, from) = recv_request(&broker).await;
    assert_eq!(request.kind(), MessageKind::Submit);
    assert_eq!(request.fields(), topics(&["t", "1.5", "x"]).as_slice());
    assert_eq!(request.timestamp(), env.now());
    assert_eq!(from, peer.local_endpoint().unwrap().socket_addr());
    assert_eq!(peer.stats().submissions_sent, 1);
}

#[tokio::test]
async fn test_step_retries_until_acknowledged() {
    let (broker, mut peer, env) = setup(PeerRole::Idle).await;

    let responder = async {
        // let the first attempt time out
        recv_request(&broker).await;
        acknowledge(&broker, &env).await;
    };
    let (stepped, _) = tokio::join!(peer.step(), responder);

    stepped.unwrap();
    assert_eq!(peer.state(), PeerState::Subscribed);
    assert_eq!(peer.stats().requests_sent, 2);
    assert_eq!(peer.stats().responses_received, 1);
}

#[tokio::test]
async fn test_idle_step_waits_one_socket_timeout() {
    let (broker, mut peer, env) = setup(PeerRole::Idle).await;

    let (stepped, _) = tokio::join!(peer.step(), acknowledge(&broker, &env));
    stepped.unwrap();
    assert_eq!(env.slept(), vec![SOCKET_TIMEOUT]);

    peer.step().await.unwrap();
    assert_eq!(env.slept(), vec![SOCKET_TIMEOUT, SOCKET_TIMEOUT]);
    assert_eq!(peer.stats().requests_sent, 1);
}

#[tokio::test]
async fn test_publisher_step_submits_random_fields_to_each_topic() {
    let (broker, mut peer, env) = setup(PeerRole::Publisher(topics(&["a", "b", "c"]))).await;

    let (stepped, _) = tokio::join!(peer.step(), acknowledge(&broker, &env));
    stepped.unwrap();

    for topic in ["a", "b", "c"] {
        let (submit, _) = recv_request(&broker).await;
        assert_eq!(submit.kind(), MessageKind::Submit);
        assert_eq!(submit.topic(), Some(topic));
        assert_eq!(submit.payload().len(), 3);
        for value in submit.payload() {
            let (_, decimals) = value.split_once('.').expect("decimal point");
            assert_eq!(decimals.len(), 6);
            let value: f64 = value.parse().unwrap();
            assert!((0.0..=1.0).contains(&value));
        }
    }
    assert_eq!(peer.stats().submissions_sent, 3);
}

#[tokio::test]
async fn test_publisher_sleeps_after_every_submission() {
    let (broker, mut peer, env) = setup(PeerRole::Publisher(topics(&["a", "b", "c"]))).await;
    let start = env.now();

    let (stepped, _) = tokio::join!(peer.step(), acknowledge(&broker, &env));
    stepped.unwrap();

    let slept = env.slept();
    assert_eq!(slept.len(), 3);
    for pause in &slept {
        assert!(*pause <= Duration::from_secs(10));
        assert_eq!(pause.subsec_nanos(), 0);
    }

    // each submission is stamped after the pauses that preceded it
    let mut expected = start;
    for (i, topic) in ["a", "b", "c"].into_iter().enumerate() {
        let (submit, _) = recv_request(&broker).await;
        assert_eq!(submit.topic(), Some(topic));
        assert_eq!(submit.timestamp(), expected);
        expected += chrono::TimeDelta::from_std(slept[i]).unwrap();
    }
}

#[tokio::test]
async fn test_acknowledgment_from_other_sender_is_ignored() {
    let (broker, mut peer, env) = setup(PeerRole::Subscriber(topics(&["t"]))).await;
    let impostor = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let responder = async {
        let (request, from) = recv_request(&broker).await;
        let ack = Message::subscribe(env.now(), request.fields().to_vec());
        reply(&impostor, from, &ack).await;
    };
    let (subscribed, _) = tokio::join!(peer.subscribe(), responder);

    assert!(!subscribed.unwrap());
    assert_eq!(peer.state(), PeerState::Unsubscribed);
    assert_eq!(peer.stats().responses_received, 0);
}

#[tokio::test]
async fn test_subscriber_step_counts_publications() {
    let (broker, mut peer, env) = setup(PeerRole::Subscriber(topics(&["t"]))).await;

    let responder = async {
        let (_, from) = acknowledge(&broker, &env).await;
        let publish = Message::publish(env.now(), "t", &topics(&["0.5"]));
        reply(&broker, from, &publish).await;
    };
    let (stepped, _) = tokio::join!(peer.step(), responder);

    stepped.unwrap();
    assert_eq!(peer.stats().publications_received, 1);
    assert_eq!(peer.stats().responses_received, 1);
}

#[tokio::test]
async fn test_subscriber_step_drops_malformed_and_unhandled() {
    let (broker, mut peer, env) = setup(PeerRole::Subscriber(topics(&["t"]))).await;

    let (stepped, (_, from)) = tokio::join!(peer.step(), async {
        let acked = acknowledge(&broker, &env).await;
        broker.send_to(b"publish,notatime,t", acked.1).await.unwrap();
        acked
    });
    stepped.unwrap();

    let stray = Message::submit(env.now(), "t", &topics(&["x"]));
    reply(&broker, from, &stray).await;
    peer.step().await.unwrap();

    assert_eq!(peer.state(), PeerState::Subscribed);
    assert_eq!(peer.stats().publications_received, 0);
    assert_eq!(peer.stats().responses_received, 1);
}
