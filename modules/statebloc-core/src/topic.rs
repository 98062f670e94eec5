//! Closable multicast topics backing the state, error, event and model streams.

use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Boxed stream handed to subscribers.
pub type Subscription<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// A broadcast topic that can be closed once, permanently.
///
/// Publishing with no subscribers is not an error; values are simply dropped.
/// Closing drops the sender so every open subscription ends.
pub struct Topic<T> {
    sender: Mutex<Option<broadcast::Sender<T>>>,
}

impl<T: Clone + Send + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Deliver `value` to current subscribers. Returns `false` once closed.
    pub fn publish(&self, value: T) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => {
                // Err only means nobody is listening right now.
                let _ = sender.send(value);
                true
            }
            None => false,
        }
    }

    /// Raw receiver, or `None` once closed.
    pub fn receiver(&self) -> Option<broadcast::Receiver<T>> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        sender.as_ref().map(|s| s.subscribe())
    }

    /// Stream of values published from now on. Empty once closed.
    pub fn subscribe(&self) -> Subscription<T> {
        match self.receiver() {
            Some(rx) => receiver_stream(rx),
            None => Box::pin(futures::stream::empty()),
        }
    }

    /// Close the topic. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        sender.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Adapt a broadcast receiver into a stream that ends when the topic closes.
/// A subscriber that falls behind skips the values it missed.
pub fn receiver_stream<T: Clone + Send + 'static>(rx: broadcast::Receiver<T>) -> Subscription<T> {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(value) => return Some((value, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged behind, skipping values");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }))
}
