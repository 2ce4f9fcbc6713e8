//! End-to-end tests against an in-process mock router.

use std::time::Duration;

use bw2_client::protocol::{encode_frame, po, Command, Frame, FrameBuffer, PayloadObject, RoutingObject};
use bw2_client::{
    Bw2Error, Client, CreateDotChainParams, CreateDotParams, CreateEntityParams, ListParams,
    PublishParams, QueryParams, SubscribeParams,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const PROMPT: Duration = Duration::from_secs(2);

/// The router side of one connection.
struct RouterConn {
    stream: TcpStream,
    buffer: FrameBuffer,
}

impl RouterConn {
    async fn recv(&mut self) -> Frame {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(frame) = self.buffer.next_frame().unwrap() {
                return frame;
            }
            let n = timeout(PROMPT, self.stream.read(&mut chunk))
                .await
                .expect("client sent nothing")
                .unwrap();
            assert!(n > 0, "client closed the connection");
            self.buffer.extend(&chunk[..n]);
        }
    }

    async fn send(&mut self, frame: &Frame) {
        self.stream.write_all(&encode_frame(frame)).await.unwrap();
    }

    async fn send_status(&mut self, seqno: u32, status: &str, reason: Option<&str>) {
        let mut frame = Frame::new(Command::Response, seqno);
        frame.add_header("status", status);
        if let Some(reason) = reason {
            frame.add_header("reason", reason);
        }
        self.send(&frame).await;
    }
}

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

async fn accept(listener: &TcpListener) -> RouterConn {
    let (stream, _) = listener.accept().await.unwrap();
    let mut conn = RouterConn {
        stream,
        buffer: FrameBuffer::new(),
    };
    let mut hello = Frame::new(Command::Hello, 0);
    hello.add_header("version", "2.7.1");
    conn.send(&hello).await;
    conn
}

/// A connected client plus the router end of its socket.
async fn connected() -> (Client, RouterConn) {
    let (listener, addr) = listener().await;
    let (client, conn) = tokio::join!(Client::connect(&addr), accept(&listener));
    (client.unwrap(), conn)
}

fn chain_frame(seqno: u32, hash: &str) -> Frame {
    let mut frame = Frame::new(Command::Result, seqno);
    frame.add_header("hash", hash);
    frame.add_header("permissions", "PC");
    frame.add_header("to", "grantee");
    frame.add_header("uri", "a/b/*");
    frame.add_routing_object(RoutingObject::new(0x01, &b"chain"[..]));
    frame
}

fn finished(seqno: u32) -> Frame {
    let mut frame = Frame::new(Command::Result, seqno);
    frame.add_header("finished", "true");
    frame
}

#[tokio::test]
async fn test_connect_records_version() {
    let (client, _conn) = connected().await;
    assert_eq!(client.remote_version(), "2.7.1");
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_publish_okay() {
    let (client, mut conn) = connected().await;

    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "a/b/c".into(),
                    payload_objects: vec![PayloadObject::text("hello")],
                    ..Default::default()
                })
                .await
        }
    });

    let request = conn.recv().await;
    assert_eq!(request.command, Command::Publish);
    assert_eq!(request.first_header("uri"), Some("a/b/c"));
    assert_eq!(request.first_header("doverify"), Some("true"));
    assert_eq!(request.payload_objects()[0].po_num, po::TEXT);
    conn.send_status(request.seqno, "okay", None).await;

    publisher.await.unwrap().unwrap();
    assert_eq!(client.open_transactions(), 0);
}

#[tokio::test]
async fn test_publish_refused_with_reason() {
    let (client, mut conn) = connected().await;

    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "a/b/c".into(),
                    ..Default::default()
                })
                .await
        }
    });

    let request = conn.recv().await;
    conn.send_status(request.seqno, "error", Some("not authorized"))
        .await;

    let err = publisher.await.unwrap().unwrap_err();
    assert!(matches!(err, Bw2Error::Router(_)));
    assert_eq!(err.to_string(), "not authorized");
}

#[tokio::test]
async fn test_concurrent_requests_get_their_own_replies() {
    let (client, mut conn) = connected().await;
    const CALLERS: usize = 20;

    let callers: Vec<_> = (0..CALLERS)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let contact = format!("caller-{}", i);
                let params = CreateEntityParams {
                    contact: contact.clone(),
                    ..Default::default()
                };
                let (vk, entity) = client.create_entity(&params).await.unwrap();
                (contact, vk, entity)
            })
        })
        .collect();

    let mut requests = Vec::new();
    for _ in 0..CALLERS {
        requests.push(conn.recv().await);
    }
    let mut seqnos: Vec<u32> = requests.iter().map(|r| r.seqno).collect();
    seqnos.sort_unstable();
    seqnos.dedup();
    assert_eq!(seqnos.len(), CALLERS, "sequence numbers must be unique");

    // Answer in reverse order, echoing each caller's contact as its vk
    for request in requests.iter().rev() {
        let contact = request.first_header("contact").unwrap();
        let mut reply = Frame::new(Command::Result, request.seqno);
        reply.add_header("vk", contact);
        reply.add_payload_object(PayloadObject::new(0x0100_0102, contact.as_bytes().to_vec()));
        conn.send(&reply).await;
    }

    for caller in callers {
        let (contact, vk, entity) = caller.await.unwrap();
        assert_eq!(vk, contact);
        assert_eq!(&entity[..], contact.as_bytes());
    }
}

#[tokio::test]
async fn test_subscribe_yields_messages_until_disconnect() {
    let (client, mut conn) = connected().await;

    let subscriber = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .subscribe(&SubscribeParams {
                    uri: "a/b/*".into(),
                    ..Default::default()
                })
                .await
        }
    });

    let request = conn.recv().await;
    assert_eq!(request.command, Command::Subscribe);
    assert_eq!(request.first_header("unpack"), Some("true"));
    conn.send_status(request.seqno, "okay", None).await;

    let mut stream = subscriber.await.unwrap().unwrap();

    for i in 0..3 {
        let mut msg = Frame::new(Command::Result, request.seqno);
        msg.add_header("from", format!("sender-{}", i));
        msg.add_header("uri", format!("a/b/{}", i));
        msg.add_payload_object(PayloadObject::text(format!("payload {}", i)));
        conn.send(&msg).await;
    }
    drop(conn);

    let mut received = Vec::new();
    while let Some(msg) = timeout(PROMPT, stream.recv()).await.unwrap() {
        received.push(msg);
    }

    assert_eq!(received.len(), 3);
    for (i, msg) in received.iter().enumerate() {
        assert_eq!(msg.from, format!("sender-{}", i));
        assert_eq!(msg.uri, format!("a/b/{}", i));
        assert!(msg.payload_errors.is_empty());
    }
    assert!(!client.is_connected());
    assert!(matches!(stream.end_reason(), Some(Bw2Error::ConnectionLost(_))));
}

#[tokio::test]
async fn test_unread_subscription_does_not_stall_others() {
    let (client, mut conn) = connected().await;

    let subscriber = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .subscribe(&SubscribeParams {
                    uri: "busy/*".into(),
                    ..Default::default()
                })
                .await
        }
    });
    let subscription = conn.recv().await;
    conn.send_status(subscription.seqno, "okay", None).await;
    let mut stream = subscriber.await.unwrap().unwrap();

    // Far more than the subscription can buffer while nobody reads it
    for i in 0..30 {
        let mut msg = Frame::new(Command::Result, subscription.seqno);
        msg.add_header("uri", format!("busy/{}", i));
        conn.send(&msg).await;
    }

    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "quiet/topic".into(),
                    ..Default::default()
                })
                .await
        }
    });
    let publish = conn.recv().await;
    assert_eq!(publish.command, Command::Publish);
    conn.send_status(publish.seqno, "okay", None).await;
    timeout(PROMPT, publisher).await.unwrap().unwrap().unwrap();

    // The subscription was cut off rather than holding everyone up
    let mut received = 0;
    while timeout(PROMPT, stream.recv()).await.unwrap().is_some() {
        received += 1;
    }
    assert!(received > 0 && received < 30, "received {}", received);
    assert!(matches!(stream.end_reason(), Some(Bw2Error::Overflow(seqno)) if seqno == subscription.seqno));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_build_any_chain_does_not_block_connection() {
    let (client, mut conn) = connected().await;

    let builder = tokio::spawn({
        let client = client.clone();
        async move { client.build_any_chain("a/b/*", "PC", "grantee").await }
    });

    let request = conn.recv().await;
    assert_eq!(request.command, Command::BuildChain);
    assert_eq!(request.first_header("accesspermissions"), Some("PC"));
    conn.send_status(request.seqno, "okay", None).await;
    for i in 0..5 {
        conn.send(&chain_frame(request.seqno, &format!("chain-{}", i)))
            .await;
    }

    let chain = timeout(PROMPT, builder).await.unwrap().unwrap().unwrap();
    assert_eq!(chain.hash, "chain-0");
    assert_eq!(chain.permissions, "PC");

    // An unrelated request right away is still served promptly
    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "x/y".into(),
                    ..Default::default()
                })
                .await
        }
    });
    let publish = conn.recv().await;
    assert_eq!(publish.command, Command::Publish);
    conn.send_status(publish.seqno, "okay", None).await;
    timeout(PROMPT, publisher).await.unwrap().unwrap().unwrap();

    conn.send(&finished(request.seqno)).await;
}

#[tokio::test]
async fn test_build_any_chain_with_no_chain() {
    let (client, mut conn) = connected().await;

    let builder = tokio::spawn({
        let client = client.clone();
        async move { client.build_any_chain("a/b/*", "P", "grantee").await }
    });

    let request = conn.recv().await;
    conn.send_status(request.seqno, "okay", None).await;
    conn.send(&finished(request.seqno)).await;

    let err = builder.await.unwrap().unwrap_err();
    assert!(matches!(err, Bw2Error::NoResult));
}

#[tokio::test]
async fn test_build_chain_streams_until_finished() {
    let (client, mut conn) = connected().await;

    let builder = tokio::spawn({
        let client = client.clone();
        async move { client.build_chain("a/b/*", "PC", "grantee").await }
    });

    let request = conn.recv().await;
    conn.send_status(request.seqno, "okay", None).await;
    let stream = builder.await.unwrap().unwrap();

    conn.send(&chain_frame(request.seqno, "first")).await;
    let mut last = chain_frame(request.seqno, "last");
    last.add_header("finished", "true");
    conn.send(&last).await;

    let chains = timeout(PROMPT, stream.collect()).await.unwrap();
    let hashes: Vec<_> = chains.iter().map(|c| c.hash.as_str()).collect();
    assert_eq!(hashes, ["first", "last"]);
    assert_eq!(client.open_transactions(), 0);
}

#[tokio::test]
async fn test_finished_stream_has_no_end_reason() {
    let (client, mut conn) = connected().await;

    let builder = tokio::spawn({
        let client = client.clone();
        async move { client.build_chain("a/b/*", "PC", "grantee").await }
    });

    let request = conn.recv().await;
    conn.send_status(request.seqno, "okay", None).await;
    let mut stream = builder.await.unwrap().unwrap();
    conn.send(&finished(request.seqno)).await;

    assert!(timeout(PROMPT, stream.recv()).await.unwrap().is_none());
    assert!(stream.end_reason().is_none());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_streaming_refusal() {
    let (client, mut conn) = connected().await;

    let querier = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .query(&QueryParams {
                    uri: "a/b".into(),
                    ..Default::default()
                })
                .await
        }
    });

    let request = conn.recv().await;
    assert_eq!(request.command, Command::Query);
    conn.send_status(request.seqno, "error", Some("no permission"))
        .await;

    let err = querier.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "no permission");
    assert_eq!(client.open_transactions(), 0);
}

#[tokio::test]
async fn test_query_one_returns_first() {
    let (client, mut conn) = connected().await;

    let querier = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .query_one(&QueryParams {
                    uri: "a/b".into(),
                    leave_packed: true,
                    ..Default::default()
                })
                .await
        }
    });

    let request = conn.recv().await;
    assert_eq!(request.first_header("unpack"), None);
    conn.send_status(request.seqno, "okay", None).await;
    for i in 0..4 {
        let mut msg = Frame::new(Command::Result, request.seqno);
        msg.add_header("uri", format!("a/b/{}", i));
        conn.send(&msg).await;
    }
    conn.send(&finished(request.seqno)).await;

    let first = querier.await.unwrap().unwrap().unwrap();
    assert_eq!(first.uri, "a/b/0");
}

#[tokio::test]
async fn test_query_one_with_no_results() {
    let (client, mut conn) = connected().await;

    let querier = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .query_one(&QueryParams {
                    uri: "empty".into(),
                    ..Default::default()
                })
                .await
        }
    });

    let request = conn.recv().await;
    conn.send_status(request.seqno, "okay", None).await;
    conn.send(&finished(request.seqno)).await;

    assert!(timeout(PROMPT, querier).await.unwrap().unwrap().unwrap().is_none());
    assert_eq!(client.open_transactions(), 0);
}

#[tokio::test]
async fn test_query_one_after_connection_loss() {
    let (client, mut conn) = connected().await;

    let querier = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .query_one(&QueryParams {
                    uri: "a/b".into(),
                    ..Default::default()
                })
                .await
        }
    });

    let request = conn.recv().await;
    conn.send_status(request.seqno, "okay", None).await;
    drop(conn);

    let err = timeout(PROMPT, querier).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, Bw2Error::ConnectionLost(_)), "got {:?}", err);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_list_children() {
    let (client, mut conn) = connected().await;

    let lister = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .list(&ListParams {
                    uri: "a/b".into(),
                    ..Default::default()
                })
                .await
        }
    });

    let request = conn.recv().await;
    assert_eq!(request.command, Command::List);
    conn.send_status(request.seqno, "okay", None).await;
    let stream = lister.await.unwrap().unwrap();

    for child in ["a/b/c", "a/b/d"] {
        let mut frame = Frame::new(Command::Result, request.seqno);
        frame.add_header("child", child);
        conn.send(&frame).await;
    }
    conn.send(&finished(request.seqno)).await;

    let children = timeout(PROMPT, stream.collect()).await.unwrap();
    assert_eq!(children, ["a/b/c", "a/b/d"]);
}

#[tokio::test]
async fn test_create_dot_and_chain() {
    let (client, mut conn) = connected().await;

    let creator = tokio::spawn({
        let client = client.clone();
        async move {
            let dot = client
                .create_dot(&CreateDotParams {
                    to: "grantee".into(),
                    uri: "a/b/*".into(),
                    access_permissions: "PC".into(),
                    ttl: 2,
                    ..Default::default()
                })
                .await?;
            let chain = client
                .create_dot_chain(&CreateDotChainParams {
                    dots: vec![dot.0.clone()],
                    ..Default::default()
                })
                .await?;
            Ok::<_, Bw2Error>((dot, chain))
        }
    });

    let request = conn.recv().await;
    assert_eq!(request.command, Command::MakeDot);
    assert_eq!(request.first_header("ttl"), Some("2"));
    let mut reply = Frame::new(Command::Result, request.seqno);
    reply.add_header("hash", "dot-hash");
    reply.add_routing_object(RoutingObject::new(0x20, &b"dot"[..]));
    conn.send(&reply).await;

    let request = conn.recv().await;
    assert_eq!(request.command, Command::MakeChain);
    assert_eq!(request.first_header("dot"), Some("dot-hash"));
    let mut reply = Frame::new(Command::Result, request.seqno);
    reply.add_header("hash", "chain-hash");
    reply.add_routing_object(RoutingObject::new(0x01, &b"chain"[..]));
    conn.send(&reply).await;

    let ((dot_hash, dot), (chain_hash, chain)) = creator.await.unwrap().unwrap();
    assert_eq!(dot_hash, "dot-hash");
    assert!(!dot.is_permission());
    assert_eq!(chain_hash, "chain-hash");
    assert_eq!(&chain.content()[..], b"chain");
}

#[tokio::test]
async fn test_wrong_object_count_is_malformed() {
    let (client, mut conn) = connected().await;

    let creator = tokio::spawn({
        let client = client.clone();
        async move { client.create_entity(&CreateEntityParams::default()).await }
    });

    let request = conn.recv().await;
    conn.send(&Frame::new(Command::Result, request.seqno)).await;

    let err = creator.await.unwrap().unwrap_err();
    assert!(matches!(err, Bw2Error::MalformedResponse(_)));
}

#[tokio::test]
async fn test_permission_dot_fails_without_io() {
    let (client, mut conn) = connected().await;

    let err = client
        .create_dot(&CreateDotParams {
            is_permission: true,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Bw2Error::Unsupported(_)));

    // Nothing was sent: the next frame the router sees is this publish
    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "a".into(),
                    ..Default::default()
                })
                .await
        }
    });
    let request = conn.recv().await;
    assert_eq!(request.command, Command::Publish);
    assert_eq!(request.seqno, 1);
    conn.send_status(request.seqno, "okay", None).await;
    publisher.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_auto_chain_override() {
    let (client, mut conn) = connected().await;
    client.override_auto_chain(true);

    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "a".into(),
                    auto_chain: false,
                    ..Default::default()
                })
                .await
        }
    });
    let request = conn.recv().await;
    assert_eq!(request.first_header("autochain"), Some("true"));
    conn.send_status(request.seqno, "okay", None).await;
    publisher.await.unwrap().unwrap();

    client.override_auto_chain(false);
    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "a".into(),
                    auto_chain: true,
                    ..Default::default()
                })
                .await
        }
    });
    let request = conn.recv().await;
    assert_eq!(request.first_header("autochain"), None);
    conn.send_status(request.seqno, "okay", None).await;
    publisher.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_set_entity_file_strips_marker() {
    let (client, mut conn) = connected().await;

    let path = std::env::temp_dir().join(format!("bw2-client-test-{}.ent", std::process::id()));
    tokio::fs::write(&path, b"\x32entity-key").await.unwrap();

    let setter = tokio::spawn({
        let client = client.clone();
        let path = path.clone();
        async move { client.set_entity_file(&path).await }
    });

    let request = conn.recv().await;
    assert_eq!(request.command, Command::SetEntity);
    let key = &request.payload_objects()[0];
    assert_eq!(key.po_num, po::ENTITY_KEY);
    assert_eq!(&key.content[..], b"entity-key");

    let mut reply = Frame::new(Command::Response, request.seqno);
    reply.add_header("status", "okay");
    reply.add_header("vk", "my-vk");
    conn.send(&reply).await;

    assert_eq!(setter.await.unwrap().unwrap(), "my-vk");
    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn test_unknown_seqno_is_counted_not_fatal() {
    let (client, mut conn) = connected().await;

    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "a".into(),
                    ..Default::default()
                })
                .await
        }
    });
    let request = conn.recv().await;
    conn.send_status(9999, "okay", None).await;
    conn.send_status(request.seqno, "okay", None).await;

    publisher.await.unwrap().unwrap();
    assert_eq!(client.dropped_frames(), 1);
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_decode_error_fails_connection() {
    let (client, mut conn) = connected().await;

    let publisher = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .publish(&PublishParams {
                    uri: "a".into(),
                    ..Default::default()
                })
                .await
        }
    });
    let _request = conn.recv().await;
    conn.stream
        .write_all(b"garbage that is not a frame header\n")
        .await
        .unwrap();

    let err = timeout(PROMPT, publisher).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, Bw2Error::ConnectionLost(_)), "got {:?}", err);
    assert!(!client.is_connected());

    let err = client
        .publish(&PublishParams {
            uri: "a".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Bw2Error::ConnectionLost(_)));
}

#[tokio::test]
async fn test_dropping_stream_releases_registration() {
    let (client, mut conn) = connected().await;

    let subscriber = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .subscribe(&SubscribeParams {
                    uri: "a/*".into(),
                    ..Default::default()
                })
                .await
        }
    });
    let request = conn.recv().await;
    conn.send_status(request.seqno, "okay", None).await;
    let stream = subscriber.await.unwrap().unwrap();
    assert_eq!(client.open_transactions(), 1);

    drop(stream);
    assert_eq!(client.open_transactions(), 0);

    // Late deliveries are dropped, not fatal
    let mut late = Frame::new(Command::Result, request.seqno);
    late.add_header("uri", "a/late");
    conn.send(&late).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.is_connected());
    assert_eq!(client.dropped_frames(), 1);
}

#[tokio::test]
async fn test_handshake_timeout_closes_socket() {
    let (listener, addr) = listener().await;

    let connect = Client::builder()
        .address(addr)
        .handshake_timeout(Duration::from_millis(100))
        .connect();
    let (result, accepted) = tokio::join!(connect, listener.accept());

    assert!(matches!(result, Err(Bw2Error::HandshakeTimeout)));

    // The client's end is gone: the router reads end of stream
    let (mut stream, _) = accepted.unwrap();
    let mut buf = [0u8; 16];
    let n = timeout(PROMPT, stream.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_wrong_greeting_is_rejected() {
    let (listener, addr) = listener().await;

    let router = async {
        let (mut stream, _) = listener.accept().await.unwrap();
        let frame = Frame::new(Command::Result, 0);
        stream.write_all(&encode_frame(&frame)).await.unwrap();
        stream
    };
    let (result, _stream) = tokio::join!(Client::connect(&addr), router);

    assert!(matches!(result, Err(Bw2Error::BadHandshake(_))));
}
