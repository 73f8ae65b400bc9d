//! Live event subscriptions.

use futures::Stream;
use log::warn;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::domain::Event;

/// One subscriber's view of the live feed.
///
/// Starts at the moment of subscription (no replay). If the subscriber falls
/// more than the buffer behind, the oldest missed events are skipped and
/// counted in `missed()`.
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
    missed: u64,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<Event>) -> Self {
        Self { rx, missed: 0 }
    }

    /// Wait for the next event. `None` once the log is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} events", skipped);
                    self.missed += skipped;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already buffered
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.missed += skipped,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events dropped because this subscriber was too slow
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Adapt into a `Stream` of events
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            Some((event, sub))
        })
    }
}
