//! End-to-end sessions against an in-process WebSocket device.

use std::time::Duration;

use acoustic_overlay::{
    Credentials, FRAME_COLS, FRAME_LEN, FRAME_ROWS, SessionConfig, SessionState, StreamSession,
    TargetSize, UpdateRate,
};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

const WAIT: Duration = Duration::from_secs(10);

type DeviceSocket = WebSocketStream<tokio::net::TcpStream>;

/// What the fake device saw during one handshake.
#[derive(Debug, Default)]
struct Handshake {
    authorization: Option<String>,
    protocol: Option<String>,
    path: String,
}

/// Accept one connection the way the camera does: answer the `subscribe`
/// sub-protocol and record the request headers.
async fn accept_device(listener: &TcpListener) -> anyhow::Result<(DeviceSocket, Handshake)> {
    let (stream, _) = listener.accept().await?;
    let mut seen = Handshake::default();

    let socket = accept_hdr_async(stream, |request: &Request, mut response: Response| {
        let text = |name: header::HeaderName| {
            request.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
        };
        seen.authorization = text(header::AUTHORIZATION);
        seen.protocol = text(header::SEC_WEBSOCKET_PROTOCOL);
        seen.path = request.uri().path().to_owned();
        response
            .headers_mut()
            .insert(header::SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("subscribe"));
        Ok(response)
    })
    .await?;

    Ok((socket, seen))
}

/// Next text message from the client, skipping control frames.
async fn next_text(socket: &mut DeviceSocket) -> anyhow::Result<String> {
    while let Some(message) = socket.next().await {
        if let Message::Text(text) = message? {
            return Ok(text.as_str().to_owned());
        }
    }
    anyhow::bail!("client went away before sending text")
}

fn frame_body(event_id: i32, row: usize, col: usize) -> String {
    let mut samples = vec![0.0f32; FRAME_LEN];
    samples[row * FRAME_COLS + col] = 1.0;
    serde_json::json!({ "event_id": event_id, "gain": 1, "bf": samples }).to_string()
}

async fn device_config(listener: &TcpListener) -> anyhow::Result<SessionConfig> {
    let mut config = SessionConfig::new("127.0.0.1", Credentials::new("admin", "admin"), 0);
    config.device.port = listener.local_addr()?.port();
    config.target = TargetSize::new(FRAME_COLS * 2, FRAME_ROWS * 2)?;
    Ok(config)
}

#[tokio::test]
async fn subscribes_with_credentials_and_renders_frames() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let config = device_config(&listener).await?;

    let device = tokio::spawn(async move {
        let (mut socket, handshake) = accept_device(&listener).await?;
        let subscribe = next_text(&mut socket).await?;
        socket.send(Message::text(frame_body(0, 12, 30))).await?;

        // Drain until the client closes
        while let Some(Ok(message)) = socket.next().await {
            if message.is_close() {
                break;
            }
        }
        anyhow::Ok((handshake, subscribe))
    });

    let session = StreamSession::start(&config)?;
    let mut frames = session.subscribe(UpdateRate::Native);

    let frame = tokio::time::timeout(WAIT, frames.next()).await?.expect("one frame");
    assert_eq!(frame.sequence, 1);
    assert_eq!(frame.matrix.rows(), FRAME_ROWS * 2);
    assert_eq!(frame.matrix.cols(), FRAME_COLS * 2);
    assert_eq!(frame.matrix.max(), 255);
    assert_eq!(session.state(), SessionState::Subscribed);

    session.close();
    tokio::time::timeout(WAIT, session.join()).await??;

    let (handshake, subscribe) = tokio::time::timeout(WAIT, device).await???;
    assert_eq!(handshake.authorization.as_deref(), Some("Basic YWRtaW46YWRtaW4="));
    assert_eq!(handshake.protocol.as_deref(), Some("subscribe"));
    assert_eq!(handshake.path, "/ws");
    assert_eq!(subscribe, r#"{"type":"subscribe","id":0}"#);
    Ok(())
}

#[tokio::test]
async fn reconnects_and_resubscribes_after_device_close() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let config = device_config(&listener).await?;

    let device = tokio::spawn(async move {
        let mut subscriptions = Vec::new();

        // First connection: one frame, then the device hangs up
        let (mut socket, _) = accept_device(&listener).await?;
        subscriptions.push(next_text(&mut socket).await?);
        socket.send(Message::text(frame_body(0, 3, 3))).await?;
        socket.close(None).await?;
        drop(socket);

        // Second connection: the client must subscribe again
        let (mut socket, _) = accept_device(&listener).await?;
        subscriptions.push(next_text(&mut socket).await?);
        socket.send(Message::text(frame_body(0, 20, 35))).await?;

        while let Some(Ok(message)) = socket.next().await {
            if message.is_close() {
                break;
            }
        }
        anyhow::Ok(subscriptions)
    });

    let session = StreamSession::start(&config)?;
    let mut frames = session.subscribe(UpdateRate::Native);

    let second = tokio::time::timeout(WAIT, async {
        while let Some(frame) = frames.next().await {
            if frame.sequence >= 2 {
                return Some(frame);
            }
        }
        None
    })
    .await?
    .expect("frame after reconnect");
    assert_eq!(second.matrix.max(), 255);
    assert!(session.stats().reconnects >= 1);

    session.close();
    tokio::time::timeout(WAIT, session.join()).await??;

    let subscriptions = tokio::time::timeout(WAIT, device).await???;
    assert_eq!(subscriptions.len(), 2);
    assert!(subscriptions.iter().all(|s| s == r#"{"type":"subscribe","id":0}"#));
    Ok(())
}

#[tokio::test]
async fn shutdown_request_stops_after_device_close() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let config = device_config(&listener).await?;

    let session = StreamSession::start(&config)?;

    let (mut socket, _) = tokio::time::timeout(WAIT, accept_device(&listener)).await??;
    next_text(&mut socket).await?;

    session.request_shutdown();
    assert_eq!(session.state(), SessionState::ClosingRequested);

    socket.close(None).await?;
    drop(socket);
    tokio::time::timeout(WAIT, session.join()).await??;

    // No second connection attempt reaches the device
    let reconnect = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(reconnect.is_err());
    Ok(())
}

#[tokio::test]
async fn unreadable_binary_message_is_counted_as_malformed() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let config = device_config(&listener).await?;

    let device = tokio::spawn(async move {
        let (mut socket, _) = accept_device(&listener).await?;
        next_text(&mut socket).await?;
        socket.send(Message::binary(vec![0xff, 0xfe, 0xfd])).await?;
        socket.send(Message::text(frame_body(0, 7, 9))).await?;

        while let Some(Ok(message)) = socket.next().await {
            if message.is_close() {
                break;
            }
        }
        anyhow::Ok(())
    });

    let session = StreamSession::start(&config)?;
    let mut frames = session.subscribe(UpdateRate::Native);

    let frame = tokio::time::timeout(WAIT, frames.next()).await?.expect("frame after junk");
    assert_eq!(frame.sequence, 2);
    assert_eq!(frame.matrix.max(), 255);

    let stats = session.stats();
    assert_eq!(stats.frames_received, 2);
    assert_eq!(stats.frames_malformed, 1);
    assert_eq!(stats.reconnects, 0);

    session.close();
    tokio::time::timeout(WAIT, session.join()).await??;
    tokio::time::timeout(WAIT, device).await???;
    Ok(())
}

#[tokio::test]
async fn follows_one_redirect_to_the_device() -> anyhow::Result<()> {
    let redirector = TcpListener::bind("127.0.0.1:0").await?;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let mut config = device_config(&listener).await?;
    let device_port = config.device.port;
    config.device.port = redirector.local_addr()?.port();

    let redirect = tokio::spawn(async move {
        let (mut stream, _) = redirector.accept().await?;
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let answer = format!(
            "HTTP/1.1 302 Found\r\nLocation: ws://127.0.0.1:{device_port}/ws\r\n\
             Content-Length: 0\r\n\r\n"
        );
        stream.write_all(answer.as_bytes()).await?;
        stream.shutdown().await?;
        anyhow::Ok(())
    });

    let device = tokio::spawn(async move {
        let (mut socket, handshake) = accept_device(&listener).await?;
        let subscribe = next_text(&mut socket).await?;
        socket.send(Message::text(frame_body(0, 1, 1))).await?;

        while let Some(Ok(message)) = socket.next().await {
            if message.is_close() {
                break;
            }
        }
        anyhow::Ok((handshake, subscribe))
    });

    let session = StreamSession::start(&config)?;
    let mut frames = session.subscribe(UpdateRate::Native);

    let frame = tokio::time::timeout(WAIT, frames.next()).await?.expect("frame via redirect");
    assert_eq!(frame.sequence, 1);
    assert_eq!(session.stats().connect_attempts, 1);

    session.close();
    tokio::time::timeout(WAIT, session.join()).await??;
    tokio::time::timeout(WAIT, redirect).await???;

    let (handshake, subscribe) = tokio::time::timeout(WAIT, device).await???;
    assert_eq!(handshake.authorization.as_deref(), Some("Basic YWRtaW46YWRtaW4="));
    assert_eq!(handshake.protocol.as_deref(), Some("subscribe"));
    assert_eq!(subscribe, r#"{"type":"subscribe","id":0}"#);
    Ok(())
}
