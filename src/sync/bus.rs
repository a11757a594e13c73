//! Runtime bus: page context → background context.
//!
//! At-most-once, fire-and-forget. The sender only learns whether the bus
//! accepted the message locally (a listener exists and has room); it never
//! learns whether the message was handled. A message the bus cannot take is
//! dropped on the spot.

use super::protocol::RuntimeMessage;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("no background listener is registered")]
    Closed,
    #[error("background listener is backed up; message dropped")]
    Full,
    #[error("failed to encode runtime message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Constructor for a bus sender/listener pair.
pub struct RuntimeBus;

impl RuntimeBus {
    /// Create a bus buffering at most `capacity` undelivered messages.
    pub fn channel(capacity: usize) -> (BusSender, BusListener) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (BusSender { tx }, BusListener { rx })
    }
}

/// Page-side handle. Cheap to clone.
#[derive(Clone)]
pub struct BusSender {
    tx: mpsc::Sender<String>,
}

impl BusSender {
    /// Post a message without waiting for the listener.
    pub fn send(&self, msg: &RuntimeMessage) -> Result<(), BusError> {
        let json = msg.to_json()?;
        self.tx.try_send(json).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BusError::Full,
            mpsc::error::TrySendError::Closed(_) => BusError::Closed,
        })
    }

    /// Whether a listener is still attached.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Background-side handle. Dropping it disconnects every sender.
pub struct BusListener {
    rx: mpsc::Receiver<String>,
}

impl BusListener {
    /// Next raw message, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::protocol::SyncMessage;

    #[tokio::test]
    async fn delivers_json_to_listener() {
        let (tx, mut rx) = RuntimeBus::channel(4);
        tx.send(&RuntimeMessage::AuthSync(SyncMessage::login("t1", None)))
            .unwrap();

        let raw = rx.recv().await.unwrap();
        assert_eq!(
            RuntimeMessage::from_json(&raw).unwrap(),
            RuntimeMessage::AuthSync(SyncMessage::login("t1", None))
        );
    }

    #[test]
    fn send_without_listener_fails_closed() {
        let (tx, rx) = RuntimeBus::channel(4);
        drop(rx);

        assert!(!tx.is_connected());
        let err = tx
            .send(&RuntimeMessage::AuthSync(SyncMessage::logout()))
            .unwrap_err();
        assert!(matches!(err, BusError::Closed));
    }

    #[test]
    fn full_bus_drops_message() {
        let (tx, _rx) = RuntimeBus::channel(1);
        let msg = RuntimeMessage::AuthSync(SyncMessage::logout());

        tx.send(&msg).unwrap();
        assert!(matches!(tx.send(&msg).unwrap_err(), BusError::Full));
    }

    #[tokio::test]
    async fn listener_ends_when_senders_drop() {
        let (tx, mut rx) = RuntimeBus::channel(1);
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
