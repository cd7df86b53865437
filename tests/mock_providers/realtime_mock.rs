//! WebSocket mock of the realtime service
//!
//! Accepts connections on an ephemeral port, echoes the `realtime`
//! subprotocol, records every client event and can play the server side of
//! the session handshake.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_util::sync::CancellationToken;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;

/// How much of the handshake the mock performs on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// `session.created` on connect, `session.updated` after `session.update`
    Full,
    /// `session.created` only; the session never becomes active
    CreatedOnly,
    /// Sends nothing unprompted
    Silent,
}

/// Recorded state of the mock server
pub struct RealtimeMockState {
    pub mode: HandshakeMode,
    pub session_id: String,
    pub connection_count: AtomicU64,
    pub received: Mutex<Vec<Value>>,
    pub request_headers: Mutex<Vec<(String, String)>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    reset: Mutex<Option<CancellationToken>>,
}

impl RealtimeMockState {
    fn new(mode: HandshakeMode) -> Self {
        Self {
            mode,
            session_id: "sess_mock_001".to_string(),
            connection_count: AtomicU64::new(0),
            received: Mutex::new(Vec::new()),
            request_headers: Mutex::new(Vec::new()),
            outbound: Mutex::new(None),
            reset: Mutex::new(None),
        }
    }
}

/// A running realtime mock server
pub struct RealtimeMockServer {
    pub state: Arc<RealtimeMockState>,
    port: u16,
    handle: JoinHandle<()>,
}

impl RealtimeMockServer {
    pub async fn start(mode: HandshakeMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind realtime mock");
        let port = listener.local_addr().expect("local addr").port();
        let state = Arc::new(RealtimeMockState::new(mode));

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        eprintln!("Realtime mock connection error: {}", e);
                    }
                });
            }
        });

        Self {
            state,
            port,
            handle,
        }
    }

    /// Base URL to configure as the realtime endpoint
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/v1/realtime", self.port)
    }

    pub fn connections(&self) -> u64 {
        self.state.connection_count.load(Ordering::SeqCst)
    }

    /// All client events received so far
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    /// Types of the client events received so far, in order
    pub fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|e| e.get("type").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.state
            .request_headers
            .lock()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Send a server event on the current connection
    pub fn push(&self, event: Value) -> bool {
        match self.state.outbound.lock().as_ref() {
            Some(tx) => tx.send(Message::Text(event.to_string().into())).is_ok(),
            None => false,
        }
    }

    /// Send raw text on the current connection
    pub fn push_raw(&self, text: &str) -> bool {
        match self.state.outbound.lock().as_ref() {
            Some(tx) => tx.send(Message::Text(text.to_string().into())).is_ok(),
            None => false,
        }
    }

    /// Close the current connection from the server side
    pub fn close(&self) -> bool {
        match self.state.outbound.lock().take() {
            Some(tx) => tx.send(Message::Close(None)).is_ok(),
            None => false,
        }
    }

    /// Drop the current TCP connection without a close handshake
    pub fn reset(&self) -> bool {
        self.state.outbound.lock().take();
        match self.state.reset.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn session_created() -> Value {
        json!({
            "type": "session.created",
            "event_id": "evt_created",
            "session": {"id": "sess_mock_001", "model": "gpt-4o-realtime-preview"}
        })
    }

    pub fn session_updated() -> Value {
        json!({
            "type": "session.updated",
            "event_id": "evt_updated",
            "session": {"id": "sess_mock_001"}
        })
    }
}

impl Drop for RealtimeMockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<RealtimeMockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let header_state = state.clone();
    let ws_stream = accept_hdr_async(stream, move |request: &Request, mut response: Response| {
        let mut headers = header_state.request_headers.lock();
        headers.clear();
        for (name, value) in request.headers() {
            headers.push((
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            ));
        }
        if request.headers().contains_key("sec-websocket-protocol") {
            response
                .headers_mut()
                .insert("sec-websocket-protocol", HeaderValue::from_static("realtime"));
        }
        Ok(response)
    })
    .await?;

    state.connection_count.fetch_add(1, Ordering::SeqCst);
    let (mut write, mut read) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    *state.outbound.lock() = Some(tx.clone());
    let reset = CancellationToken::new();
    *state.reset.lock() = Some(reset.clone());

    if state.mode != HandshakeMode::Silent {
        let created = RealtimeMockServer::session_created();
        write.send(Message::Text(created.to_string().into())).await?;
    }

    loop {
        tokio::select! {
            _ = reset.cancelled() => {
                // Returning drops both halves and the socket with them.
                return Ok(());
            }
            Some(msg) = rx.recv() => {
                let closing = matches!(msg, Message::Close(_));
                write.send(msg).await?;
                if closing {
                    // Give the client a moment to observe the close frame.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    break;
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(event) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let is_update = event.get("type").and_then(Value::as_str) == Some("session.update");
                    state.received.lock().push(event);

                    if is_update && state.mode == HandshakeMode::Full {
                        let updated = RealtimeMockServer::session_updated();
                        write.send(Message::Text(updated.to_string().into())).await?;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    write.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    eprintln!("Realtime mock read error: {}", e);
                    break;
                }
            }
        }
    }

    Ok(())
}
