//! WebSocket transport with auto-reconnect.
//!
//! One [`Transport`] owns the socket to one device. It moves through
//! `Disconnected → Connecting → Open → Closing → Disconnected`, reconnects
//! after abnormal closes following the configured [`ReconnectPolicy`], keeps
//! the link alive with ping/pong, and demultiplexes inbound frames into
//! responses (handed to the pending-request table) and push notifications
//! (broadcast as [`TransportEvent`]s).

use crate::config::{ClientOptions, ReconnectPolicy};
use crate::error::{Result, ShellyError};
use crate::pending::PendingRequests;
use crate::protocol::{EventNotification, Inbound, Request, StatusNotification};
use crate::subscription::{EventReceiver, EVENT_CHANNEL_CAPACITY};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// Close code of an intentional, clean shutdown
pub const CLOSE_NORMAL: u16 = 1000;
/// Close frame without a status code
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Connection dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Ack = oneshot::Sender<Result<()>>;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Everything a transport reports to its subscribers
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The socket opened
    Connect,

    /// The socket closed
    Disconnect {
        /// WebSocket close code
        code: u16,
        /// Close reason or failure description
        reason: String,
        /// Wait before the next reconnect attempt, if one is scheduled
        reconnect_in: Option<Duration>,
    },

    /// A non-fatal socket error
    Error(String),

    /// `NotifyStatus` / `NotifyFullStatus` push
    StatusUpdate(StatusNotification),

    /// `NotifyEvent` push
    Event(EventNotification),

    /// A request was written to the socket
    Request(Request),
}

/// Per-connection mutable state
#[derive(Default)]
struct Link {
    reconnect_attempt: usize,
    outbound: Option<mpsc::UnboundedSender<(Message, Option<Ack>)>>,
    cancel: Option<CancellationToken>,
    intentional_close: bool,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Shared {
    url: String,
    client_id: String,
    request_timeout: Duration,
    ping_interval: Duration,
    reconnect: ReconnectPolicy,
    pending: PendingRequests,
    link: Mutex<Link>,
    status: watch::Sender<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    lifetime: CancellationToken,
    generation: AtomicU64,
}

/// Connection manager for a single device
#[derive(Clone)]
pub struct Transport {
    shared: Arc<Shared>,
}

impl Transport {
    /// Create a transport for the given URL. No socket is opened until
    /// [`connect`](Self::connect) or the first [`send`](Self::send).
    pub(crate) fn new(url: impl Into<String>, options: &ClientOptions, pending: PendingRequests) -> Self {
        let (status, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                client_id: options.client_id.clone(),
                request_timeout: options.request_timeout,
                ping_interval: options.ping_interval,
                reconnect: options.reconnect_interval.clone(),
                pending,
                link: Mutex::new(Link::default()),
                status,
                events,
                lifetime: CancellationToken::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Endpoint this transport connects to
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Identifier tagged onto every outbound request
    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Number of connections opened so far; changes every time the socket is replaced
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn bump_generation(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Index of the next reconnect attempt
    pub fn reconnect_attempt(&self) -> usize {
        self.shared.link().reconnect_attempt
    }

    /// Subscribe to transport events
    pub fn subscribe(&self) -> EventReceiver<TransportEvent> {
        EventReceiver::new(self.shared.events.subscribe())
    }

    /// Open the connection, or wait for the attempt already in flight
    pub async fn connect(&self) -> Result<()> {
        self.shared.connect().await
    }

    /// Close the connection cleanly; no reconnect is scheduled
    pub async fn disconnect(&self) -> Result<()> {
        self.shared.disconnect().await
    }

    /// Tag, serialize and send a request, connecting first if needed
    pub async fn send(&self, mut request: Request) -> Result<()> {
        self.connect().await?;

        request.src = self.shared.client_id.clone();
        let json = serde_json::to_string(&request)?;
        tracing::debug!("Sending: {}", json);

        let (ack_tx, ack_rx) = oneshot::channel();
        self.shared.push(Message::Text(json), Some(ack_tx))?;
        ack_rx.await.map_err(|_| ShellyError::ConnectionClosed)??;

        self.shared.emit(TransportEvent::Request(request));
        Ok(())
    }

    /// Stop reconnecting, reject pending requests and close the socket.
    ///
    /// The transport cannot be connected again afterwards.
    pub async fn destroy(&self) {
        let shared = &self.shared;
        if let Some(timer) = shared.link().reconnect_timer.take() {
            timer.abort();
        }

        let rejected = shared.pending.reject_all();
        if rejected > 0 {
            tracing::debug!("Rejected {} pending request(s) for {}", rejected, shared.url);
        }

        if let Err(e) = shared.disconnect().await {
            tracing::debug!("Disconnect during destroy failed: {}", e);
        }
        shared.lifetime.cancel();
        tracing::info!("Transport for {} destroyed", shared.url);
    }

    /// Stop every task of this transport without a close handshake
    pub(crate) fn abandon(&self) {
        if self.shared.lifetime.is_cancelled() {
            return;
        }
        if let Some(timer) = self.shared.link().reconnect_timer.take() {
            timer.abort();
        }
        self.shared.lifetime.cancel();
        tracing::debug!("Transport for {} abandoned", self.shared.url);
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, event: TransportEvent) {
        self.shared.emit(event);
    }

    #[cfg(test)]
    pub(crate) fn is_abandoned(&self) -> bool {
        self.shared.lifetime.is_cancelled()
    }
}

impl Shared {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ConnectionState {
        *self.status.borrow()
    }

    fn emit(&self, event: TransportEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Queue a frame for the writer task
    fn push(&self, message: Message, ack: Option<Ack>) -> Result<()> {
        let link = self.link();
        let outbound = link.outbound.as_ref().ok_or(ShellyError::ConnectionClosed)?;
        outbound
            .send((message, ack))
            .map_err(|_| ShellyError::ConnectionClosed)
    }

    async fn connect(self: &Arc<Self>) -> Result<()> {
        loop {
            let mut status_rx = self.status.subscribe();

            let waiting_on = {
                let mut link = self.link();
                if self.lifetime.is_cancelled() {
                    return Err(ShellyError::ConnectionClosed);
                }
                match self.state() {
                    ConnectionState::Open => return Ok(()),
                    ConnectionState::Disconnected => {
                        if let Some(timer) = link.reconnect_timer.take() {
                            timer.abort();
                        }
                        self.status.send_replace(ConnectionState::Connecting);
                        None
                    }
                    state => Some(state),
                }
            };

            let Some(waiting_on) = waiting_on else {
                return self.open().await;
            };

            let settled = status_rx
                .wait_for(|state| *state != waiting_on)
                .await
                .map(|state| *state)
                .map_err(|_| ShellyError::ConnectionClosed)?;

            match (waiting_on, settled) {
                (_, ConnectionState::Open) => return Ok(()),
                (ConnectionState::Connecting, ConnectionState::Disconnected) => {
                    return Err(ShellyError::ConnectFailed {
                        url: self.url.clone(),
                        reason: "connection attempt failed".to_string(),
                    });
                }
                _ => continue,
            }
        }
    }

    /// Dial the socket; the caller has already moved the state to `Connecting`
    async fn open(self: &Arc<Self>) -> Result<()> {
        tracing::info!("Connecting to {}", self.url);

        let attempt = tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => Err("transport destroyed".to_string()),
            result = tokio::time::timeout(self.request_timeout, connect_async(self.url.as_str())) => {
                match result {
                    Ok(Ok((stream, _response))) => Ok(stream),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("no handshake within {:?}", self.request_timeout)),
                }
            }
        };

        let ws_stream = match attempt {
            Ok(stream) => stream,
            Err(reason) => {
                tracing::warn!("Failed to connect to {}: {}", self.url, reason);
                self.emit(TransportEvent::Error(reason.clone()));
                self.handle_close(CLOSE_ABNORMAL, reason.clone());
                return Err(ShellyError::ConnectFailed {
                    url: self.url.clone(),
                    reason,
                });
            }
        };

        let (write, read) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = self.lifetime.child_token();

        {
            let mut link = self.link();
            link.outbound = Some(outbound_tx);
            link.cancel = Some(cancel.clone());
            link.reconnect_attempt = 0;
            link.intentional_close = false;
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.status.send_replace(ConnectionState::Open);
        }

        tracing::info!("Connected to {}", self.url);
        self.emit(TransportEvent::Connect);

        // Counts pongs received on this socket
        let (pong_tx, pong_rx) = watch::channel(0u64);
        tokio::spawn(self.clone().write_loop(write, outbound_rx, cancel.clone()));
        tokio::spawn(self.clone().read_loop(read, cancel.clone(), pong_tx));
        if !self.ping_interval.is_zero() {
            tokio::spawn(self.clone().keepalive(cancel, pong_rx));
        }

        Ok(())
    }

    async fn write_loop(
        self: Arc<Self>,
        mut write: SplitSink<WsStream, Message>,
        mut outbound: mpsc::UnboundedReceiver<(Message, Option<Ack>)>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = outbound.recv() => {
                    let Some((message, ack)) = next else { break };
                    match write.send(message).await {
                        Ok(()) => {
                            if let Some(ack) = ack {
                                let _ = ack.send(Ok(()));
                            }
                        }
                        Err(e) => {
                            tracing::error!("Failed to send message: {}", e);
                            self.emit(TransportEvent::Error(e.to_string()));
                            if let Some(ack) = ack {
                                let _ = ack.send(Err(ShellyError::WebSocket(e)));
                            }
                            cancel.cancel();
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn read_loop(
        self: Arc<Self>,
        mut read: SplitStream<WsStream>,
        cancel: CancellationToken,
        pong: watch::Sender<u64>,
    ) {
        let (code, reason) = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break (CLOSE_ABNORMAL, "connection terminated".to_string()),
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    Some(Ok(Message::Pong(_))) => {
                        tracing::trace!("Pong from {}", self.url);
                        pong.send_modify(|count| *count += 1);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                            None => (CLOSE_NO_STATUS, String::new()),
                        };
                    }
                    Some(Ok(_)) => {
                        // Binary, Ping (answered by tungstenite) and raw frames
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error on {}: {}", self.url, e);
                        self.emit(TransportEvent::Error(e.to_string()));
                        break (CLOSE_ABNORMAL, e.to_string());
                    }
                    None => break (CLOSE_ABNORMAL, "connection lost".to_string()),
                }
            }
        };

        cancel.cancel();
        self.handle_close(code, reason);
    }

    async fn keepalive(self: Arc<Self>, cancel: CancellationToken, mut pong: watch::Receiver<u64>) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.ping_interval) => {}
            }

            // Pongs that arrived while idle do not answer this ping
            pong.borrow_and_update();

            tracing::trace!("Ping to {}", self.url);
            if self.push(Message::Ping(Vec::new()), None).is_err() {
                return;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                changed = pong.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(self.request_timeout) => {
                    tracing::warn!(
                        "No pong from {} within {:?}, terminating connection",
                        self.url,
                        self.request_timeout
                    );
                    cancel.cancel();
                    return;
                }
            }
        }
    }

    /// Route one inbound text frame
    fn handle_frame(&self, text: &str) {
        tracing::debug!("Received: {}", text);

        match Inbound::parse(text) {
            Ok(Inbound::Response(response)) => {
                let id = response.id;
                if !self.pending.resolve(response) {
                    tracing::debug!(id, "Dropping response without a pending request");
                }
            }
            Ok(Inbound::Status(status)) => self.emit(TransportEvent::StatusUpdate(status)),
            Ok(Inbound::Event(events)) => self.emit(TransportEvent::Event(events)),
            Ok(Inbound::Ignored) => tracing::trace!("Ignoring frame from {}", self.url),
            Err(e) => tracing::warn!("Failed to parse frame from {}: {}", self.url, e),
        }
    }

    /// Move to `Disconnected` and decide whether to reconnect
    fn handle_close(self: &Arc<Self>, code: u16, reason: String) {
        let reconnect_in = {
            let mut link = self.link();
            link.outbound = None;
            if let Some(cancel) = link.cancel.take() {
                cancel.cancel();
            }
            let intentional = std::mem::take(&mut link.intentional_close);
            self.status.send_replace(ConnectionState::Disconnected);

            if intentional || code == CLOSE_NORMAL || self.lifetime.is_cancelled() {
                None
            } else {
                let delay = self.reconnect.delay(link.reconnect_attempt);
                if let Some(delay) = delay {
                    link.reconnect_attempt += 1;
                    link.reconnect_timer = Some(self.schedule_reconnect(delay));
                }
                delay
            }
        };

        match reconnect_in {
            Some(delay) => tracing::info!(
                code,
                reason = %reason,
                delay_ms = delay.as_millis() as u64,
                "Disconnected from {}, reconnecting",
                self.url
            ),
            None => tracing::info!(code, reason = %reason, "Disconnected from {}", self.url),
        }

        self.emit(TransportEvent::Disconnect {
            code,
            reason,
            reconnect_in,
        });
    }

    fn schedule_reconnect(self: &Arc<Self>, delay: Duration) -> JoinHandle<()> {
        let shared = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shared.lifetime.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            // Detach our own handle so connect() does not abort this task
            shared.link().reconnect_timer.take();

            if let Err(e) = shared.connect().await {
                tracing::debug!("Reconnect to {} failed: {}", shared.url, e);
            }
        })
    }

    async fn disconnect(self: &Arc<Self>) -> Result<()> {
        let mut status_rx = self.status.subscribe();

        loop {
            let state = {
                let mut link = self.link();
                if let Some(timer) = link.reconnect_timer.take() {
                    timer.abort();
                }
                let state = self.state();
                if state == ConnectionState::Open {
                    link.intentional_close = true;
                    self.status.send_replace(ConnectionState::Closing);
                    if let Some(outbound) = &link.outbound {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        let _ = outbound.send((Message::Close(Some(frame)), None));
                    }
                }
                state
            };

            match state {
                ConnectionState::Disconnected => return Ok(()),
                ConnectionState::Connecting => {
                    let _ = status_rx
                        .wait_for(|state| *state != ConnectionState::Connecting)
                        .await;
                }
                ConnectionState::Open | ConnectionState::Closing => break,
            }
        }

        tracing::info!("Disconnecting from {}", self.url);

        let closed = tokio::time::timeout(
            self.request_timeout,
            status_rx.wait_for(|state| *state == ConnectionState::Disconnected),
        )
        .await
        .is_ok();

        if !closed {
            tracing::warn!("Close handshake with {} timed out, dropping socket", self.url);
            if let Some(cancel) = self.link().cancel.clone() {
                cancel.cancel();
            }
            status_rx
                .wait_for(|state| *state == ConnectionState::Disconnected)
                .await
                .map_err(|_| ShellyError::ConnectionClosed)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(reconnect: &[u64]) -> Transport {
        let options = ClientOptions::default()
            .with_client_id("test-client")
            .with_reconnect(ReconnectPolicy::new(
                reconnect.iter().copied().map(Duration::from_secs),
            ));
        Transport::new("ws://127.0.0.1:9/rpc", &options, PendingRequests::default())
    }

    fn next_disconnect(rx: &mut EventReceiver<TransportEvent>) -> Option<Duration> {
        match rx.try_recv().unwrap() {
            Some(TransportEvent::Disconnect { reconnect_in, .. }) => reconnect_in,
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    fn abort_timer(transport: &Transport) {
        if let Some(timer) = transport.shared.link().reconnect_timer.take() {
            timer.abort();
        }
    }

    #[tokio::test]
    async fn reconnect_schedule_clamps_at_last_interval() {
        let transport = transport(&[5, 10, 30]);
        let mut rx = transport.subscribe();

        let mut delays = Vec::new();
        for _ in 0..4 {
            transport.shared.handle_close(CLOSE_ABNORMAL, "lost".to_string());
            abort_timer(&transport);
            delays.push(next_disconnect(&mut rx));
        }

        assert_eq!(
            delays,
            vec![
                Some(Duration::from_secs(5)),
                Some(Duration::from_secs(10)),
                Some(Duration::from_secs(30)),
                Some(Duration::from_secs(30)),
            ]
        );
        assert_eq!(transport.reconnect_attempt(), 4);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn normal_close_does_not_reconnect() {
        let transport = transport(&[5]);
        let mut rx = transport.subscribe();

        transport.shared.handle_close(CLOSE_NORMAL, String::new());
        assert_eq!(next_disconnect(&mut rx), None);
        assert!(transport.shared.link().reconnect_timer.is_none());
    }

    #[tokio::test]
    async fn disabled_policy_does_not_reconnect() {
        let transport = transport(&[]);
        let mut rx = transport.subscribe();

        transport.shared.handle_close(CLOSE_ABNORMAL, "lost".to_string());
        assert_eq!(next_disconnect(&mut rx), None);
        assert_eq!(transport.reconnect_attempt(), 0);
    }

    #[tokio::test]
    async fn status_and_event_frames_are_broadcast() {
        let transport = transport(&[5]);
        let mut rx = transport.subscribe();

        transport.shared.handle_frame(
            &json!({ "method": "NotifyStatus", "params": { "ts": 100, "switch:0": { "output": true } } })
                .to_string(),
        );
        transport.shared.handle_frame(
            &json!({ "method": "NotifyEvent", "params": { "ts": 1, "events": [
                { "component": "input:0", "id": 0, "event": "single_push", "ts": 1 }
            ] } })
            .to_string(),
        );
        transport.shared.handle_frame("garbage");
        transport.shared.handle_frame(r#"{"method":"Shelly.Unknown"}"#);

        match rx.try_recv().unwrap() {
            Some(TransportEvent::StatusUpdate(status)) => {
                assert_eq!(status.components["switch:0"]["output"], json!(true));
            }
            other => panic!("unexpected {other:?}"),
        }
        match rx.try_recv().unwrap() {
            Some(TransportEvent::Event(batch)) => assert_eq!(batch.events[0].event, "single_push"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn responses_go_to_the_pending_table() {
        let pending = PendingRequests::default();
        let transport = Transport::new("ws://127.0.0.1:9/rpc", &ClientOptions::default(), pending.clone());
        let rx = pending.insert(
            42,
            "Shelly.GetDeviceInfo",
            tokio::time::Instant::now() + Duration::from_secs(5),
        );

        transport.shared.handle_frame(r#"{"id":42,"result":{"id":"shellyplus1-abc"}}"#);

        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.result, Some(json!({ "id": "shellyplus1-abc" })));
        assert_eq!(pending.len(), 0);
    }

    /// Run the keepalive task against a channel standing in for the writer
    fn keepalive_harness() -> (
        watch::Sender<u64>,
        mpsc::UnboundedReceiver<(Message, Option<Ack>)>,
        CancellationToken,
    ) {
        let options = ClientOptions::default()
            .with_ping_interval(Duration::from_secs(1))
            .with_request_timeout(Duration::from_secs(2));
        let transport = Transport::new("ws://127.0.0.1:9/rpc", &options, PendingRequests::default());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        transport.shared.link().outbound = Some(outbound_tx);

        let cancel = CancellationToken::new();
        let (pong_tx, pong_rx) = watch::channel(0u64);
        tokio::spawn(transport.shared.clone().keepalive(cancel.clone(), pong_rx));
        (pong_tx, outbound_rx, cancel)
    }

    async fn expect_ping(outbound: &mut mpsc::UnboundedReceiver<(Message, Option<Ack>)>) {
        match outbound.recv().await {
            Some((Message::Ping(_), None)) => {}
            other => panic!("expected a ping, got {:?}", other.map(|(message, _)| message)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pong_while_idle_does_not_answer_next_ping() {
        let (pong, mut outbound, cancel) = keepalive_harness();

        // Unsolicited pong before any ping went out
        pong.send_modify(|count| *count += 1);

        expect_ping(&mut outbound).await;
        tokio::time::timeout(Duration::from_secs(10), cancel.cancelled())
            .await
            .expect("connection was not terminated");
    }

    #[tokio::test(start_paused = true)]
    async fn answered_ping_keeps_connection() {
        let (pong, mut outbound, cancel) = keepalive_harness();

        expect_ping(&mut outbound).await;
        pong.send_modify(|count| *count += 1);
        expect_ping(&mut outbound).await;
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn abandoned_transport_refuses_to_connect() {
        let transport = transport(&[5]);
        transport.abandon();
        assert!(matches!(transport.connect().await, Err(ShellyError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn destroyed_transport_refuses_to_connect() {
        let transport = transport(&[5]);
        transport.destroy().await;
        assert!(matches!(transport.connect().await, Err(ShellyError::ConnectionClosed)));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }
}
