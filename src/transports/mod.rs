//! Concrete [`Transport`](crate::transport::Transport) implementations

pub mod websocket;

pub use websocket::WebSocketTransport;
