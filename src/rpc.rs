use crate::auth::{AuthChallenge, AuthContext};
use crate::config::ClientOptions;
use crate::error::{Result, ShellyError};
use crate::pending::PendingRequests;
use crate::protocol::{AuthParams, Request};
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Cap for deadlines that would not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Auth context together with the connection generation it belongs to
#[derive(Debug, Clone)]
struct StoredAuth {
    generation: u64,
    context: AuthContext,
}

struct RpcInner {
    transport: Transport,
    pending: PendingRequests,
    next_id: AtomicU64,
    password: Option<String>,
    request_timeout: Duration,
    auth: Mutex<Option<StoredAuth>>,
}

impl Drop for RpcInner {
    // Reader, writer and reconnect timer hold the transport, not this client
    fn drop(&mut self) {
        self.pending.reject_all();
        self.transport.abandon();
    }
}

/// Authenticated RPC client for one device.
///
/// Correlates requests with responses, enforces per-request deadlines, and
/// answers at most one digest challenge per call. Dropping the last clone
/// tears the connection down as if [`destroy`](Self::destroy) had been called,
/// minus the close handshake.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<RpcInner>,
}

impl RpcClient {
    /// Create a client for the given WebSocket URL. Nothing is dialled until
    /// the first request.
    pub fn new(url: impl Into<String>, options: &ClientOptions) -> Self {
        let pending = PendingRequests::default();
        let transport = Transport::new(url, options, pending.clone());

        Self {
            inner: Arc::new(RpcInner {
                transport,
                pending,
                next_id: AtomicU64::new(1),
                password: options.password.clone(),
                request_timeout: options.request_timeout,
                auth: Mutex::new(None),
            }),
        }
    }

    /// Create a client for a device's local RPC endpoint (`ws://<hostname>/rpc`)
    pub fn for_host(hostname: &str, options: &ClientOptions) -> Self {
        Self::new(format!("ws://{}/rpc", hostname), options)
    }

    /// The transport carrying this client's requests
    pub fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    /// Number of requests currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Send a request with the configured timeout
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.request_with_timeout(method, params, self.inner.request_timeout)
            .await
    }

    /// Send a request and deserialize its result
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let result = self.request(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a request, answering an authentication challenge if the device
    /// raises one
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let auth = self.current_auth();
        let carried_auth = auth.is_some();

        let error = match self.send_once(method, params.clone(), auth, timeout).await {
            Err(e) if e.is_auth_challenge() => e,
            other => return other,
        };

        let Some(password) = self.inner.password.as_deref() else {
            tracing::warn!("{} requires authentication but no password is configured", method);
            return Err(ShellyError::Unauthorized);
        };
        if carried_auth {
            return Err(ShellyError::InvalidPassword);
        }

        let message = match error {
            ShellyError::Rpc { message, .. } => message,
            other => return Err(other),
        };
        let challenge = AuthChallenge::parse(&message)?;
        let auth = self.store_auth(AuthContext::answer(&challenge, password));

        tracing::debug!("Answering authentication challenge for {}", method);
        match self.send_once(method, params, Some(auth), timeout).await {
            Err(e) if e.is_auth_challenge() => Err(ShellyError::InvalidPassword),
            other => other,
        }
    }

    /// Reject every pending request and tear the connection down
    pub async fn destroy(&self) {
        let rejected = self.inner.pending.reject_all();
        if rejected > 0 {
            tracing::debug!("Rejected {} pending request(s)", rejected);
        }
        self.inner.transport.destroy().await;
    }

    /// One request/response exchange, without any challenge handling
    async fn send_once(
        &self,
        method: &str,
        params: Option<Value>,
        auth: Option<AuthParams>,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let deadline = deadline_after(timeout);
        let rx = self.inner.pending.insert(id, method, deadline);

        let request = Request::new(id, method)
            .with_params(params)
            .with_auth(auth);

        let exchange = async {
            self.inner.transport.send(request).await?;
            match rx.await {
                Ok(response) => response,
                Err(_) => Err(ShellyError::ConnectionClosed),
            }
        };

        match timeout_at(deadline, exchange).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(e)) => {
                self.inner.pending.remove(id);
                Err(e)
            }
            Err(_) => {
                self.inner.pending.remove(id);
                tracing::debug!(id, "Request {} timed out", method);
                Err(ShellyError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    /// Auth block for the current connection, if a challenge was answered on it
    fn current_auth(&self) -> Option<AuthParams> {
        let generation = self.inner.transport.generation();
        let mut auth = self.inner.auth.lock().unwrap_or_else(PoisonError::into_inner);
        // The connection was replaced since the challenge
        if auth.as_ref().is_some_and(|stored| stored.generation != generation) {
            *auth = None;
        }
        auth.as_ref().map(|stored| stored.context.params().clone())
    }

    fn store_auth(&self, context: AuthContext) -> AuthParams {
        let params = context.params().clone();
        let generation = self.inner.transport.generation();
        *self.inner.auth.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(StoredAuth { generation, context });
        params
    }
}
