#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use shelly_gen2::{ClientOptions, EventReceiver, ReconnectPolicy};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Answer for a request frame; `None` leaves the request unanswered
pub type Handler = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

#[derive(Debug, Clone)]
enum Command {
    Send(String),
    Close(u16),
    Drop,
}

/// In-process WebSocket device speaking the RPC frame format
pub struct MockDevice {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
    commands: broadcast::Sender<Command>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

impl MockDevice {
    /// Start a device that answers every request through `handler`
    pub async fn start(handler: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self::spawn(Some(Arc::new(handler))).await
    }

    /// Start a device that accepts connections but never reads from them,
    /// so pings go unanswered
    pub async fn silent() -> Self {
        Self::spawn(None).await
    }

    async fn spawn(handler: Option<Handler>) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (commands, _) = broadcast::channel(64);

        let device = Self {
            addr,
            requests: requests.clone(),
            connections: connections.clone(),
            commands: commands.clone(),
        };

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                connections.fetch_add(1, Ordering::SeqCst);
                let rx = commands.subscribe();
                match handler.clone() {
                    Some(handler) => {
                        tokio::spawn(serve(ws, handler, requests.clone(), rx));
                    }
                    None => {
                        tokio::spawn(hold(ws, rx));
                    }
                }
            }
        });

        device
    }

    /// `host:port` to hand to the client
    pub fn hostname(&self) -> String {
        self.addr.to_string()
    }

    /// Every request frame received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r["method"] == method)
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Push a frame to every open connection
    pub fn push(&self, frame: Value) {
        let _ = self.commands.send(Command::Send(frame.to_string()));
    }

    /// Close every open connection with a close frame
    pub fn close(&self, code: u16) {
        let _ = self.commands.send(Command::Close(code));
    }

    /// Drop every open connection without a close frame
    pub fn drop_connections(&self) {
        let _ = self.commands.send(Command::Drop);
    }

    pub async fn wait_for_requests(&self, count: usize) {
        wait_until(|| self.requests().len() >= count).await;
    }

    pub async fn wait_for_connections(&self, count: usize) {
        wait_until(|| self.connections() >= count).await;
    }
}

async fn serve(
    mut ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    handler: Handler,
    requests: Arc<Mutex<Vec<Value>>>,
    mut commands: broadcast::Receiver<Command>,
) {
    loop {
        tokio::select! {
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Ok(request) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    requests.lock().unwrap().push(request.clone());
                    if let Some(reply) = handler(&request) {
                        if ws.send(Message::Text(reply.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Ok(Command::Send(text)) => {
                    if ws.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Ok(Command::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    };
                    let _ = ws.close(Some(frame)).await;
                }
                Ok(Command::Drop) | Err(_) => return,
            },
        }
    }
}

async fn hold(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    mut commands: broadcast::Receiver<Command>,
) {
    loop {
        match commands.recv().await {
            Ok(Command::Drop) | Err(_) => break,
            Ok(_) => {}
        }
    }
    drop(ws);
}

/// A response frame for `request`
pub fn reply(request: &Value, result: Value) -> Value {
    json!({ "id": request["id"], "src": "mock", "dst": request["src"], "result": result })
}

/// An error frame for `request`
pub fn reply_error(request: &Value, code: i64, message: &str) -> Value {
    json!({
        "id": request["id"],
        "src": "mock",
        "dst": request["src"],
        "error": { "code": code, "message": message }
    })
}

/// Options with short timeouts and no keepalive
pub fn fast_options() -> ClientOptions {
    ClientOptions::default()
        .with_request_timeout(Duration::from_millis(500))
        .with_ping_interval(Duration::ZERO)
        .with_reconnect(ReconnectPolicy::disabled())
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// Next event matching `filter`, failing the test after five seconds
pub async fn next_event<T: Clone>(rx: &mut EventReceiver<T>, mut filter: impl FnMut(&T) -> bool) -> T {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if filter(&event) {
                return event;
            }
        }
    })
    .await
    .expect("no matching event in time")
}
