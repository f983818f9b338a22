//! Single-slot topic publisher.
//!
//! One [`TopicPublisher`] owns at most one live transport channel. The topic
//! can be rebound at runtime; rebinding tears the old channel down before
//! opening the new one (teardown-first), so a rebind has a bounded
//! message-loss window and never a dual-delivery window.

pub mod transport;

use std::mem;
use std::sync::{Mutex, PoisonError, TryLockError};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::message::Message;

pub use transport::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publisher is not bound to a topic")]
    NotBound,

    #[error("publisher is already bound to \"{0}\"")]
    AlreadyBound(String),

    #[error("binding is busy, retry later")]
    BindingBusy,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

enum Binding<C> {
    Unbound,
    Bound { topic: String, channel: C },
}

/// Publisher bound to at most one topic at a time.
///
/// Lock policy: `publish` fail-fasts with [`PublishError::BindingBusy`] when
/// it cannot take the binding immediately; `bind`/`rebind`/`unbind` block
/// until any in-flight publish finishes. No two sends ever overlap on the
/// same channel.
pub struct TopicPublisher<T: Transport> {
    transport: T,
    binding: Mutex<Binding<T::Channel>>,
}

impl<T: Transport> TopicPublisher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            binding: Mutex::new(Binding::Unbound),
        }
    }

    /// Establish the initial channel. Fails if already bound.
    pub fn bind(&self, topic: &str) -> Result<(), PublishError> {
        let mut binding = self.lock_binding();
        if let Binding::Bound { topic, .. } = &*binding {
            return Err(PublishError::AlreadyBound(topic.clone()));
        }
        let channel = self.transport.open_channel(topic)?;
        *binding = Binding::Bound {
            topic: topic.to_owned(),
            channel,
        };
        info!(topic, "publisher bound");
        Ok(())
    }

    /// Move the binding to a new topic.
    ///
    /// Rebinding to the currently-bound topic keeps the existing channel
    /// untouched. Otherwise the old channel is closed first, then the new
    /// one is opened; if the open fails the publisher is left unbound and
    /// the caller must bind again explicitly.
    pub fn rebind(&self, new_topic: &str) -> Result<(), PublishError> {
        let mut binding = self.lock_binding();

        match mem::replace(&mut *binding, Binding::Unbound) {
            Binding::Bound { topic, channel } if topic == new_topic => {
                debug!(%topic, "rebind to current topic, keeping channel");
                *binding = Binding::Bound { topic, channel };
                return Ok(());
            }
            Binding::Bound { topic, channel } => {
                // Teardown-first: sends attempted from here until the new
                // channel is up are lost, never delivered twice.
                self.transport.close_channel(channel)?;
                info!(old = %topic, new = new_topic, "rebinding publisher");
            }
            Binding::Unbound => {}
        }

        let channel = self.transport.open_channel(new_topic)?;
        *binding = Binding::Bound {
            topic: new_topic.to_owned(),
            channel,
        };
        Ok(())
    }

    /// Send one message through the bound channel.
    pub fn publish(&self, message: &Message) -> Result<(), PublishError> {
        let mut binding = match self.binding.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(PublishError::BindingBusy),
        };
        match &mut *binding {
            Binding::Unbound => Err(PublishError::NotBound),
            Binding::Bound { channel, .. } => {
                self.transport.send(channel, &message.to_bytes())?;
                Ok(())
            }
        }
    }

    /// Tear down the channel and return to the unbound state.
    pub fn unbind(&self) -> Result<(), PublishError> {
        let mut binding = self.lock_binding();
        match mem::replace(&mut *binding, Binding::Unbound) {
            Binding::Bound { topic, channel } => {
                self.transport.close_channel(channel)?;
                info!(%topic, "publisher unbound");
                Ok(())
            }
            Binding::Unbound => Ok(()),
        }
    }

    /// Currently bound topic, if any.
    pub fn topic(&self) -> Option<String> {
        match &*self.lock_binding() {
            Binding::Bound { topic, .. } => Some(topic.clone()),
            Binding::Unbound => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(&*self.lock_binding(), Binding::Bound { .. })
    }

    fn lock_binding(&self) -> std::sync::MutexGuard<'_, Binding<T::Channel>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Drop for TopicPublisher<T> {
    fn drop(&mut self) {
        let mut binding = self.lock_binding();
        if let Binding::Bound { topic, channel } = mem::replace(&mut *binding, Binding::Unbound) {
            if let Err(e) = self.transport.close_channel(channel) {
                warn!(%topic, "channel close on drop failed: {e}");
            }
        }
    }
}

/// Join an optional namespace onto a topic as `namespace/topic`.
pub fn effective_topic(namespace: Option<&str>, topic: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}/{topic}"),
        _ => topic.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{EncodedPayload, ImageFormat};
    use crate::stamp::Timestamp;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Open(String),
        Close(String),
        Send(String),
    }

    #[derive(Clone, Default)]
    struct MockTransport {
        events: Arc<Mutex<Vec<Event>>>,
        fail_open: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        type Channel = String;

        fn open_channel(&self, topic: &str) -> Result<String, TransportError> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(TransportError::msg("open refused"));
            }
            self.events
                .lock()
                .unwrap()
                .push(Event::Open(topic.to_owned()));
            Ok(topic.to_owned())
        }

        fn close_channel(&self, channel: String) -> Result<(), TransportError> {
            self.events.lock().unwrap().push(Event::Close(channel));
            Ok(())
        }

        fn send(&self, channel: &mut String, _bytes: &[u8]) -> Result<(), TransportError> {
            self.events
                .lock()
                .unwrap()
                .push(Event::Send(channel.clone()));
            Ok(())
        }
    }

    fn message() -> Message {
        Message::build(
            "cam",
            Timestamp { sec: 1, nanosec: 0 },
            &EncodedPayload {
                data: Bytes::from_static(b"\xffpayload"),
                format: ImageFormat::Jpeg,
                quality: 80,
                scale: 1.0,
            },
        )
    }

    #[test]
    fn publish_while_unbound_never_touches_transport() {
        let transport = MockTransport::default();
        let publisher = TopicPublisher::new(transport.clone());
        match publisher.publish(&message()) {
            Err(PublishError::NotBound) => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert!(transport.events().is_empty());
    }

    #[test]
    fn bind_twice_is_refused() {
        let publisher = TopicPublisher::new(MockTransport::default());
        publisher.bind("a").unwrap();
        match publisher.bind("b") {
            Err(PublishError::AlreadyBound(t)) => assert_eq!(t, "a"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(publisher.topic().as_deref(), Some("a"));
    }

    #[test]
    fn rebind_to_same_topic_keeps_channel() {
        let transport = MockTransport::default();
        let publisher = TopicPublisher::new(transport.clone());
        publisher.bind("compressed").unwrap();
        let before = transport.events();
        publisher.rebind("compressed").unwrap();
        assert_eq!(transport.events(), before);
    }

    #[test]
    fn rebind_closes_old_then_opens_new() {
        let transport = MockTransport::default();
        let publisher = TopicPublisher::new(transport.clone());
        publisher.bind("old").unwrap();
        publisher.publish(&message()).unwrap();
        publisher.rebind("new").unwrap();
        publisher.publish(&message()).unwrap();
        drop(publisher);

        assert_eq!(
            transport.events(),
            vec![
                Event::Open("old".into()),
                Event::Send("old".into()),
                Event::Close("old".into()),
                Event::Open("new".into()),
                Event::Send("new".into()),
                Event::Close("new".into()),
            ]
        );
    }

    #[test]
    fn failed_rebind_leaves_publisher_unbound() {
        let transport = MockTransport::default();
        let publisher = TopicPublisher::new(transport.clone());
        publisher.bind("old").unwrap();

        transport.fail_open.store(true, Ordering::SeqCst);
        assert!(publisher.rebind("new").is_err());
        assert!(!publisher.is_bound());
        match publisher.publish(&message()) {
            Err(PublishError::NotBound) => {}
            other => panic!("unexpected: {other:?}"),
        }

        // Explicit re-bind recovers
        transport.fail_open.store(false, Ordering::SeqCst);
        publisher.bind("new").unwrap();
        publisher.publish(&message()).unwrap();
    }

    #[test]
    fn unbind_is_idempotent() {
        let transport = MockTransport::default();
        let publisher = TopicPublisher::new(transport.clone());
        publisher.bind("t").unwrap();
        publisher.unbind().unwrap();
        publisher.unbind().unwrap();
        drop(publisher);
        let closes = transport
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Close(_)))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn concurrent_publishes_never_interleave_with_rebind() {
        let transport = MockTransport::default();
        let publisher = Arc::new(TopicPublisher::new(transport.clone()));
        publisher.bind("t0").unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::new();
        for _ in 0..4 {
            let publisher = publisher.clone();
            let stop = stop.clone();
            workers.push(std::thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    match publisher.publish(&message()) {
                        Ok(()) | Err(PublishError::BindingBusy) => {}
                        Err(PublishError::NotBound) => {}
                        Err(e) => panic!("unexpected publish error: {e}"),
                    }
                }
            }));
        }

        for i in 1..=8 {
            publisher.rebind(&format!("t{i}")).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        stop.store(true, Ordering::SeqCst);
        for w in workers {
            w.join().unwrap();
        }

        // Every send must target the channel that was open at that moment,
        // and nothing may land inside a close→open gap.
        let mut open: Option<String> = None;
        for event in transport.events() {
            match event {
                Event::Open(t) => {
                    assert!(open.is_none(), "dual channels live");
                    open = Some(t);
                }
                Event::Close(t) => {
                    assert_eq!(open.take().as_deref(), Some(t.as_str()));
                }
                Event::Send(t) => {
                    assert_eq!(open.as_deref(), Some(t.as_str()), "send outside binding");
                }
            }
        }
    }

    #[test]
    fn namespace_prefixes_topic() {
        assert_eq!(
            effective_topic(Some("device42"), "compressed"),
            "device42/compressed"
        );
        assert_eq!(effective_topic(None, "compressed"), "compressed");
        assert_eq!(effective_topic(Some(""), "compressed"), "compressed");
    }
}
