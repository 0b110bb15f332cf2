//! WebSocket transport for the probe server feed
//!
//! Each connection attempt runs in its own task and reports lifecycle events
//! back to the event loop over a channel, tagged with the attempt's
//! [`ConnectionId`]. Dropping an attempt aborts its task.

use futures_util::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::connection::{ConnectionId, Transport, TransportEvent};

/// Event stream produced by [`WsTransport`]
pub type TransportEvents = mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>;

/// tokio-tungstenite client transport
pub struct WsTransport {
    events_tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    tasks: HashMap<ConnectionId, JoinHandle<()>>,
}

impl WsTransport {
    /// Create a transport and the receiver its events arrive on
    pub fn new() -> (Self, TransportEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                events_tx,
                tasks: HashMap::new(),
            },
            events_rx,
        )
    }

    /// Number of connection tasks still tracked
    pub fn active(&self) -> usize {
        self.tasks.len()
    }
}

impl Transport for WsTransport {
    fn connect(&mut self, id: ConnectionId, address: &Url) {
        self.tasks.retain(|_, task| !task.is_finished());

        let url = address.to_string();
        let tx = self.events_tx.clone();
        let task = tokio::spawn(run_connection(id, url, tx));
        self.tasks.insert(id, task);
    }

    fn disconnect(&mut self, id: ConnectionId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

async fn run_connection(
    id: ConnectionId,
    url: String,
    tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
) {
    let mut ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            let _ = tx.send((id, TransportEvent::Error(e.to_string())));
            let _ = tx.send((id, TransportEvent::Close));
            return;
        }
    };

    if tx.send((id, TransportEvent::Open)).is_err() {
        return;
    }

    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if tx.send((id, TransportEvent::Message(text))).is_err() {
                    return;
                }
            }
            Ok(Message::Binary(data)) => {
                warn!("Dropping {} byte binary frame on {}", data.len(), id);
            }
            Ok(Message::Close(frame)) => {
                debug!("Server closed {}: {:?}", id, frame);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let _ = tx.send((id, TransportEvent::Error(e.to_string())));
                break;
            }
        }
    }

    let _ = tx.send((id, TransportEvent::Close));
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn next_event(events: &mut TransportEvents) -> (ConnectionId, TransportEvent) {
        tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("transport channel closed")
    }

    #[tokio::test]
    async fn test_receives_text_frames_then_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"http":[]}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let (mut transport, mut events) = WsTransport::new();
        let id = ConnectionId::new(1);
        transport.connect(id, &Url::parse(&format!("ws://{}", addr)).unwrap());

        assert_eq!(next_event(&mut events).await, (id, TransportEvent::Open));
        assert_eq!(
            next_event(&mut events).await,
            (id, TransportEvent::Message(r#"{"http":[]}"#.to_string()))
        );
        assert_eq!(next_event(&mut events).await, (id, TransportEvent::Close));
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error_then_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (mut transport, mut events) = WsTransport::new();
        let id = ConnectionId::new(7);
        transport.connect(id, &Url::parse(&format!("ws://{}", addr)).unwrap());

        let (event_id, event) = next_event(&mut events).await;
        assert_eq!(event_id, id);
        assert!(matches!(event, TransportEvent::Error(_)));
        assert_eq!(next_event(&mut events).await, (id, TransportEvent::Close));
    }

    #[tokio::test]
    async fn test_wss_attempt_reaches_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept the TCP connection, then hang up mid-handshake
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let (mut transport, mut events) = WsTransport::new();
        let id = ConnectionId::new(3);
        transport.connect(
            id,
            &Url::parse(&format!("wss://localhost:{}", addr.port())).unwrap(),
        );

        let (event_id, event) = next_event(&mut events).await;
        assert_eq!(event_id, id);
        match event {
            TransportEvent::Error(message) => {
                assert!(!message.contains("TLS support not compiled in"), "{}", message);
                assert!(!message.starts_with("URL error"), "{}", message);
            }
            other => panic!("expected an error, got {:?}", other),
        }
        assert_eq!(next_event(&mut events).await, (id, TransportEvent::Close));
    }
}
