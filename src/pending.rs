use crate::error::{Result, ShellyError};
use crate::protocol::Response;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A request waiting for its response
#[derive(Debug)]
struct PendingRequest {
    method: String,
    deadline: Instant,
    tx: oneshot::Sender<Result<Response>>,
}

/// Table of in-flight requests keyed by correlation id.
///
/// Shared between the RPC client (which inserts and expires entries) and the
/// transport's reader task (which resolves them).
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingRequests {
    inner: Arc<Mutex<HashMap<u64, PendingRequest>>>,
}

impl PendingRequests {
    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PendingRequest>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request; the receiver completes with its response
    pub fn insert(
        &self,
        id: u64,
        method: impl Into<String>,
        deadline: Instant,
    ) -> oneshot::Receiver<Result<Response>> {
        let (tx, rx) = oneshot::channel();
        self.table().insert(
            id,
            PendingRequest {
                method: method.into(),
                deadline,
                tx,
            },
        );
        rx
    }

    /// Hand a response to its waiting caller.
    ///
    /// Returns `false` when no request with that id is pending (e.g. it
    /// already timed out).
    pub fn resolve(&self, response: Response) -> bool {
        let Some(pending) = self.table().remove(&response.id) else {
            return false;
        };
        tracing::trace!(
            id = response.id,
            method = %pending.method,
            remaining_ms = pending.deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            "Resolving request"
        );
        pending.tx.send(Ok(response)).is_ok()
    }

    /// Drop a request, returning its method name if it was still pending
    pub fn remove(&self, id: u64) -> Option<String> {
        self.table().remove(&id).map(|pending| pending.method)
    }

    /// Reject every pending request with `ConnectionClosed`
    pub fn reject_all(&self) -> usize {
        let drained: Vec<_> = self.table().drain().collect();
        let count = drained.len();
        for (id, pending) in drained {
            tracing::debug!(id, method = %pending.method, "Rejecting pending request");
            let _ = pending.tx.send(Err(ShellyError::ConnectionClosed));
        }
        count
    }

    #[cfg(test)]
    pub fn contains(&self, id: u64) -> bool {
        self.table().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn response(id: u64) -> Response {
        Response {
            id,
            result: Some(json!({ "ok": true })),
            error: None,
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[tokio::test]
    async fn resolves_matching_request() {
        let pending = PendingRequests::default();
        let rx = pending.insert(1, "Shelly.GetStatus", deadline());

        assert!(pending.resolve(response(1)));
        assert!(!pending.contains(1));
        assert_eq!(rx.await.unwrap().unwrap().id, 1);
    }

    #[test]
    fn stale_response_is_a_no_op() {
        let pending = PendingRequests::default();
        let _rx = pending.insert(5, "Switch.Toggle", deadline());

        assert_eq!(pending.remove(5).as_deref(), Some("Switch.Toggle"));
        assert!(!pending.resolve(response(5)));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn unknown_id_is_ignored() {
        let pending = PendingRequests::default();
        let _rx = pending.insert(1, "Sys.GetStatus", deadline());
        assert!(!pending.resolve(response(2)));
        assert!(pending.contains(1));
    }

    #[tokio::test]
    async fn reject_all_fails_every_caller() {
        let pending = PendingRequests::default();
        let a = pending.insert(1, "A.B", deadline());
        let b = pending.insert(2, "C.D", deadline());

        assert_eq!(pending.reject_all(), 2);
        assert_eq!(pending.len(), 0);
        assert!(matches!(a.await.unwrap(), Err(ShellyError::ConnectionClosed)));
        assert!(matches!(b.await.unwrap(), Err(ShellyError::ConnectionClosed)));
    }
}
