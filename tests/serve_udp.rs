use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mxp_server::{Handler, Message, MessageCodec, MessageKind, Server, ServerError, TransportRef};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

type Seen = mpsc::UnboundedReceiver<(SocketAddr, Message)>;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Reports every message it sees; parks forever on a "block" payload.
#[derive(Clone)]
struct Recorder(mpsc::UnboundedSender<(SocketAddr, Message)>);

#[async_trait]
impl Handler<Message> for Recorder {
    async fn handle(&self, _: TransportRef, peer: SocketAddr, message: Message) {
        let blocks = message.payload().as_ref() == b"block";
        let _ = self.0.send((peer, message));
        if blocks {
            std::future::pending::<()>().await;
        }
    }
}

fn recording() -> (Recorder, Seen) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Recorder(tx), rx)
}

fn spawn_serve(server: &Arc<Server<MessageCodec>>) -> JoinHandle<Result<(), ServerError>> {
    let server = Arc::clone(server);
    tokio::spawn(async move { server.serve().await })
}

async fn client() -> UdpSocket {
    UdpSocket::bind(loopback()).await.unwrap()
}

fn encoded(kind: MessageKind, payload: &'static [u8]) -> Vec<u8> {
    Message::new(kind, payload).unwrap().encode()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_receives_ping_with_sender_address() {
    let (handler, mut seen) = recording();
    let server = Arc::new(Server::bind(loopback(), MessageCodec, handler).await.unwrap());
    let serving = spawn_serve(&server);

    let client = client().await;
    client
        .send_to(&encoded(MessageKind::Request, b"PING"), server.local_addr().unwrap())
        .await
        .unwrap();

    let (peer, message) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(message.payload().as_ref(), b"PING");
    assert_eq!(message.kind(), MessageKind::Request);
    assert_eq!(peer, client.local_addr().unwrap());

    server.close().unwrap();
    timeout(WAIT, serving).await.unwrap().unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_datagram_is_skipped() {
    let (handler, mut seen) = recording();
    let server = Arc::new(Server::bind(loopback(), MessageCodec, handler).await.unwrap());
    let serving = spawn_serve(&server);
    let addr = server.local_addr().unwrap();

    let client = client().await;
    client.send_to(&[0xFF, 0xFF], addr).await.unwrap();
    client
        .send_to(&encoded(MessageKind::Event, b"after"), addr)
        .await
        .unwrap();

    let (_, message) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(message.payload().as_ref(), b"after");
    assert!(seen.try_recv().is_err());

    let metrics = server.metrics();
    assert_eq!(metrics.datagrams_received, 2);
    assert_eq!(metrics.decode_errors, 1);
    assert_eq!(metrics.dispatched, 1);

    server.close().unwrap();
    timeout(WAIT, serving).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn close_unblocks_idle_serve() {
    let (handler, _seen) = recording();
    let server = Arc::new(Server::bind(loopback(), MessageCodec, handler).await.unwrap());
    let serving = spawn_serve(&server);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(server.is_serving());
    server.close().unwrap();

    let result = timeout(WAIT, serving).await.expect("serve did not return").unwrap();
    assert!(result.is_ok());
    assert!(!server.is_serving());
    assert!(matches!(server.close(), Err(ServerError::Close(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocked_handler_does_not_stall_dispatch() {
    let (handler, mut seen) = recording();
    let server = Arc::new(Server::bind(loopback(), MessageCodec, handler).await.unwrap());
    let serving = spawn_serve(&server);
    let addr = server.local_addr().unwrap();

    let first = client().await;
    let second = client().await;
    first
        .send_to(&encoded(MessageKind::Request, b"block"), addr)
        .await
        .unwrap();
    second
        .send_to(&encoded(MessageKind::Request, b"next"), addr)
        .await
        .unwrap();

    let (peer_a, a) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    let (peer_b, b) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(a.payload().as_ref(), b"block");
    assert_eq!(peer_a, first.local_addr().unwrap());
    assert_eq!(b.payload().as_ref(), b"next");
    assert_eq!(peer_b, second.local_addr().unwrap());

    server.close().unwrap();
    timeout(WAIT, serving).await.unwrap().unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_datagram_does_not_stop_loop() {
    let (handler, mut seen) = recording();
    let server = Arc::new(
        Server::builder(MessageCodec, handler)
            .buffer_size(64)
            .bind(loopback())
            .await
            .unwrap(),
    );
    let serving = spawn_serve(&server);
    let addr = server.local_addr().unwrap();

    let client = client().await;
    let large = Message::new(MessageKind::Event, vec![0xAB; 200]).unwrap();
    client.send_to(&large.encode(), addr).await.unwrap();
    client
        .send_to(&encoded(MessageKind::Event, b"small"), addr)
        .await
        .unwrap();

    let (_, message) = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
    assert_eq!(message.payload().as_ref(), b"small");

    let metrics = server.metrics();
    assert_eq!(metrics.truncated, 1);
    assert_eq!(metrics.decode_errors, 1);

    server.close().unwrap();
    timeout(WAIT, serving).await.unwrap().unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_replies_through_transport() {
    let echo = |transport: TransportRef, peer: SocketAddr, message: Message| async move {
        let reply = message.reply(message.payload().clone()).unwrap();
        transport.send_to(&reply.encode(), peer).await.unwrap();
    };
    let server = Arc::new(Server::bind(loopback(), MessageCodec, echo).await.unwrap());
    let serving = spawn_serve(&server);

    let client = client().await;
    let ping = Message::new(MessageKind::Ping, &b"are you there"[..]).unwrap();
    client
        .send_to(&ping.encode(), server.local_addr().unwrap())
        .await
        .unwrap();

    let mut buf = [0u8; 256];
    let (len, from) = timeout(WAIT, client.recv_from(&mut buf)).await.unwrap().unwrap();
    let pong = Message::decode(buf[..len].to_vec()).unwrap();
    assert_eq!(from, server.local_addr().unwrap());
    assert_eq!(pong.kind(), MessageKind::Pong);
    assert_eq!(pong.message_id(), ping.message_id());
    assert_eq!(pong.payload().as_ref(), b"are you there");

    server.close().unwrap();
    timeout(WAIT, serving).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn second_serve_is_rejected() {
    let (handler, _seen) = recording();
    let server = Arc::new(Server::bind(loopback(), MessageCodec, handler).await.unwrap());
    let serving = spawn_serve(&server);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(matches!(server.serve().await, Err(ServerError::AlreadyServing)));

    server.close().unwrap();
    timeout(WAIT, serving).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn bind_conflict_is_reported() {
    let taken = std::net::UdpSocket::bind(loopback()).unwrap();
    let addr = taken.local_addr().unwrap();
    let (handler, _seen) = recording();

    match Server::bind(addr, MessageCodec, handler).await {
        Err(ServerError::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
        other => panic!("expected bind error, got {other:?}"),
    }
}
