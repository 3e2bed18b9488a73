//! Event channel implementation using crossbeam-channel.
//!
//! Capture and trimming are single-threaded, but the CLI renders progress on
//! its own thread, so the sink is a cloneable channel sender.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Cloneable handle the guard and the tail walk report decisions through.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Fire and forget; a closed receiver just drops the event.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Consumer side, held by the CLI renderer or by a test.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Blocks until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }

    /// Take every event that is already queued, without blocking
    pub fn drain(&self) -> Vec<Event> {
        self.inner.try_iter().collect()
    }
}

pub struct EventChannel;

impl EventChannel {
    /// Connected unbounded sender/receiver pair
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender whose receiver is already gone; every event is dropped.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TailEvent;
    use std::path::PathBuf;
    use std::thread;

    #[test]
    fn events_can_be_sent_across_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Tail(TailEvent::FileRemoved {
                path: PathBuf::from("/captures/page_0009.png"),
            }));
        });

        handle.join().unwrap();

        match receiver.recv().unwrap() {
            Event::Tail(TailEvent::FileRemoved { path }) => {
                assert_eq!(path, PathBuf::from("/captures/page_0009.png"));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn null_sender_does_not_panic() {
        let sender = null_sender();
        sender.send(Event::Tail(TailEvent::FloorReached { min_pages: 2 }));
    }

    #[test]
    fn drain_returns_queued_events_in_order() {
        let (sender, receiver) = EventChannel::new();
        sender.send(Event::Tail(TailEvent::FloorReached { min_pages: 2 }));
        sender.send(Event::Tail(TailEvent::LimitReached { max_remove: 1 }));

        let events = receiver.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Tail(TailEvent::FloorReached { .. })));
        assert!(matches!(events[1], Event::Tail(TailEvent::LimitReached { .. })));
        assert!(receiver.drain().is_empty());
    }
}
