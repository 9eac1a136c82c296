//! Actors and the channels between them.
//!
//! Every message carries the span that was current when it was sent, so the
//! receiving actor can log under the caller's context.

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::Span;

pub mod broadcast;
pub mod config_watcher;
pub mod grouper;

pub struct Sender<Event>(UnboundedSender<(Span, Event)>);
pub type Receiver<Event> = UnboundedReceiver<(Span, Event)>;

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = unbounded_channel();
    (Sender(tx), rx)
}

impl<Event> Sender<Event> {
    pub fn send(&self, event: Event) {
        // A closed channel means the receiving actor has shut down.
        _ = self.try_send(event)
    }

    pub fn try_send(&self, event: Event) -> Result<(), SendError<(Span, Event)>> {
        self.0.send((Span::current(), event))
    }

    pub fn is_closed(&self) -> bool { self.0.is_closed() }

    /// Resolves once the receiving actor has shut down.
    pub async fn closed(&self) { self.0.closed().await }
}

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_after_shutdown_are_dropped() {
        let (tx, rx) = channel::<u32>();
        let clone = tx.clone();
        assert!(tx.try_send(1).is_ok());
        drop(rx);
        assert!(clone.is_closed());
        assert!(clone.try_send(2).is_err());
        tx.send(3);
    }
}
