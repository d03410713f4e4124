//! WebSocket transport for beamforming devices
//!
//! A `3xx` answer to the handshake is followed once, to the `Location` it
//! names, with the same sub-protocol and credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request, Uri, header};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace};

use crate::config::{Credentials, SessionConfig};
use crate::transport::{LinkEvent, Transport};
use crate::{OverlayError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket link with preemptive HTTP Basic credentials.
pub struct WebSocketTransport {
    endpoint: String,
    protocol: Option<String>,
    credentials: Credentials,
    socket: Option<Socket>,
}

impl WebSocketTransport {
    pub fn new(
        endpoint: impl Into<String>,
        protocol: Option<String>,
        credentials: Credentials,
    ) -> Self {
        Self { endpoint: endpoint.into(), protocol, credentials, socket: None }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.endpoint(), config.device.protocol.clone(), config.credentials.clone())
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn request(&self) -> Result<Request<()>> {
        self.request_for(&self.endpoint)
    }

    /// Build the handshake request for `url` with protocol and credentials attached.
    fn request_for(&self, url: &str) -> Result<Request<()>> {
        let mut request = url.into_client_request().map_err(|e| {
            OverlayError::connect_failed_with_source(url.to_owned(), Box::new(e))
        })?;

        let headers = request.headers_mut();
        if let Some(protocol) = &self.protocol {
            let value = HeaderValue::from_str(protocol).map_err(|e| {
                OverlayError::config_error(format!("invalid sub-protocol '{protocol}': {e}"))
            })?;
            headers.insert(header::SEC_WEBSOCKET_PROTOCOL, value);
        }
        if !self.credentials.is_empty() {
            headers.insert(header::AUTHORIZATION, basic_authorization(&self.credentials)?);
        }
        Ok(request)
    }
}

/// Resolve a redirect `Location` against the endpoint that answered it.
fn redirect_target(endpoint: &str, location: &str) -> Option<String> {
    if location.starts_with("ws://") || location.starts_with("wss://") {
        return Some(location.to_owned());
    }
    if let Some(rest) = location.strip_prefix("http://") {
        return Some(format!("ws://{rest}"));
    }
    if let Some(rest) = location.strip_prefix("https://") {
        return Some(format!("wss://{rest}"));
    }
    if location.starts_with('/') {
        let uri: Uri = endpoint.parse().ok()?;
        return Some(format!("{}://{}{location}", uri.scheme_str()?, uri.authority()?));
    }
    None
}

/// `Basic base64(username:password)` header value.
fn basic_authorization(credentials: &Credentials) -> Result<HeaderValue> {
    let token = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
    let mut value = HeaderValue::from_str(&format!("Basic {token}"))
        .map_err(|e| OverlayError::config_error(format!("invalid credentials: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self) -> Result<()> {
        if let Some(mut old) = self.socket.take() {
            let _ = old.close(None).await;
        }

        let request = self.request()?;
        debug!(endpoint = %self.endpoint, "Opening WebSocket");
        let (socket, response) = match connect_async(request).await {
            Ok(opened) => opened,
            Err(WsError::Http(response)) if response.status().is_redirection() => {
                let target = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|location| redirect_target(&self.endpoint, location))
                    .ok_or_else(|| {
                        OverlayError::connect_failed(format!(
                            "{} (redirect without a usable Location)",
                            self.endpoint
                        ))
                    })?;
                info!(
                    endpoint = %self.endpoint,
                    %target,
                    status = %response.status(),
                    "Following redirect"
                );
                connect_async(self.request_for(&target)?).await.map_err(|e| {
                    OverlayError::connect_failed_with_source(target.clone(), Box::new(e))
                })?
            }
            Err(e) => {
                return Err(OverlayError::connect_failed_with_source(
                    self.endpoint.clone(),
                    Box::new(e),
                ));
            }
        };

        info!(endpoint = %self.endpoint, status = %response.status(), "WebSocket opened");
        self.socket = Some(socket);
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| OverlayError::link_closed("send on a closed link"))?;
        socket
            .send(Message::text(text))
            .await
            .map_err(|e| OverlayError::link_failed_with_source("send failed", Box::new(e)))
    }

    async fn next_event(&mut self) -> LinkEvent {
        let Some(socket) = self.socket.as_mut() else {
            return LinkEvent::Closed { reason: "not connected".to_string() };
        };

        match socket.next().await {
            Some(Ok(Message::Text(text))) => LinkEvent::Message(text.as_str().to_owned()),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => LinkEvent::Message(text),
                Err(_) => LinkEvent::Malformed(OverlayError::malformed_frame(format!(
                    "binary message of {} bytes is not UTF-8",
                    data.len()
                ))),
            },
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                trace!("Keepalive frame");
                LinkEvent::Ping
            }
            Some(Ok(Message::Frame(_))) => LinkEvent::Ping,
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| format!("{} {}", f.code, f.reason.as_str()))
                    .unwrap_or_else(|| "closed by peer".to_string());
                self.socket = None;
                LinkEvent::Closed { reason }
            }
            Some(Err(e)) => {
                // A receive error leaves the socket unusable; the next call reports the close.
                self.socket = None;
                let err = OverlayError::link_failed_with_source("receive failed", Box::new(e));
                LinkEvent::Error(err)
            }
            None => {
                self.socket = None;
                LinkEvent::Closed { reason: "stream ended".to_string() }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut socket) = self.socket.take() {
            debug!(endpoint = %self.endpoint, "Closing WebSocket");
            socket
                .close(None)
                .await
                .map_err(|e| OverlayError::link_failed_with_source("close failed", Box::new(e)))?;
        }
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}
