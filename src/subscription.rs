use crate::error::{Result, ShellyError};
use tokio::sync::broadcast;

/// Broadcast channel capacity used for every event stream
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Receiver for a stream of events (transport, component or collection)
pub struct EventReceiver<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> EventReceiver<T> {
    /// Create a new event receiver
    pub(crate) fn new(rx: broadcast::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Receive the next event
    ///
    /// Fails with `ConnectionClosed` once the sender is gone, and with
    /// `ChannelError` if this receiver fell behind and events were dropped.
    pub async fn recv(&mut self) -> Result<T> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => ShellyError::ConnectionClosed,
            broadcast::error::RecvError::Lagged(n) => {
                ShellyError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is available.
    pub fn try_recv(&mut self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(ShellyError::ConnectionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(ShellyError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }

    /// Drain every event that is already queued
    pub fn drain(&mut self) -> Vec<T> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}
