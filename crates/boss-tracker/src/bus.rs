//! Notification bus.
//!
//! Three channels, each with an ordered list of subscribers. Delivery is
//! synchronous on the caller's thread. A failing subscriber is reported to
//! the error sink and never stops delivery to the ones after it.

use boss_events::{BossNotification, Channel};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::sink::ErrorSink;

/// Error type subscribers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of a subscriber.
pub type HandlerResult = Result<(), HandlerError>;

type Handler = Box<dyn FnMut(&BossNotification) -> HandlerResult + Send>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

/// Publish/subscribe hub for Spawn, Kill and Despawn.
#[derive(Default)]
pub struct EventBus {
    spawn: Vec<Subscriber>,
    kill: Vec<Subscriber>,
    despawn: Vec<Subscriber>,
    next_id: u64,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self, channel: Channel) -> &Vec<Subscriber> {
        match channel {
            Channel::Spawn => &self.spawn,
            Channel::Kill => &self.kill,
            Channel::Despawn => &self.despawn,
        }
    }

    fn subscribers_mut(&mut self, channel: Channel) -> &mut Vec<Subscriber> {
        match channel {
            Channel::Spawn => &mut self.spawn,
            Channel::Kill => &mut self.kill,
            Channel::Despawn => &mut self.despawn,
        }
    }

    /// Adds a subscriber at the end of a channel's list.
    pub fn subscribe<F>(&mut self, channel: Channel, handler: F) -> SubscriptionId
    where
        F: FnMut(&BossNotification) -> HandlerResult + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers_mut(channel).push(Subscriber {
            id,
            handler: Box::new(handler),
        });
        id
    }

    /// Removes a subscriber. Returns false if it was not on that channel.
    pub fn unsubscribe(&mut self, channel: Channel, id: SubscriptionId) -> bool {
        let subscribers = self.subscribers_mut(channel);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Number of subscribers on a channel.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.subscribers(channel).len()
    }

    /// Removes every subscriber from every channel.
    pub fn clear(&mut self) {
        self.spawn.clear();
        self.kill.clear();
        self.despawn.clear();
    }

    /// Delivers a notification to every subscriber of its channel, in
    /// registration order.
    ///
    /// Returns the number of subscribers that failed.
    pub fn publish(&mut self, notification: &BossNotification, sink: &dyn ErrorSink) -> usize {
        let channel = notification.channel;
        let mut failures = 0;

        for subscriber in self.subscribers_mut(channel).iter_mut() {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(notification)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            failures += 1;
            sink.report(&format!(
                "{} subscriber {:?} failed for slot {} at tick {}: {}",
                channel, subscriber.id, notification.entity.index, notification.tick, message
            ));
        }

        failures
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("spawn", &self.spawn.len())
            .field("kill", &self.kill.len())
            .field("despawn", &self.despawn.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use boss_events::EntitySlot;
    use std::sync::{Arc, Mutex};

    fn notification(channel: Channel) -> BossNotification {
        BossNotification::new(channel, 5, EntitySlot::new(3, 4))
    }

    fn recorder(
        log: &Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    ) -> impl FnMut(&BossNotification) -> HandlerResult + Send + 'static {
        let log = log.clone();
        move |_| {
            log.lock().unwrap().push(tag);
            Ok(())
        }
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let mut bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Channel::Spawn, recorder(&log, "first"));
        bus.subscribe(Channel::Spawn, recorder(&log, "second"));
        bus.subscribe(Channel::Kill, recorder(&log, "kill"));

        let failures = bus.publish(&notification(Channel::Spawn), &MemorySink::new());

        assert_eq!(failures, 0);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.subscribe(Channel::Despawn, recorder(&log, "gone"));

        // Wrong channel leaves it in place
        assert!(!bus.unsubscribe(Channel::Spawn, id));
        assert!(bus.unsubscribe(Channel::Despawn, id));
        assert!(!bus.unsubscribe(Channel::Despawn, id));

        bus.publish(&notification(Channel::Despawn), &MemorySink::new());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failing_subscriber_does_not_stop_delivery() {
        let mut bus = EventBus::new();
        let sink = MemorySink::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(Channel::Kill, |_| Err("boom".into()));
        bus.subscribe(Channel::Kill, |_| panic!("handler exploded"));
        bus.subscribe(Channel::Kill, recorder(&log, "survivor"));

        let failures = bus.publish(&notification(Channel::Kill), &sink);

        assert_eq!(failures, 2);
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("boom"));
        assert!(messages[1].contains("handler exploded"));
    }

    #[test]
    fn test_subscriber_ids_are_unique() {
        let mut bus = EventBus::new();
        let a = bus.subscribe(Channel::Spawn, |_| Ok(()));
        let b = bus.subscribe(Channel::Kill, |_| Ok(()));

        assert_ne!(a, b);
        assert_eq!(bus.subscriber_count(Channel::Spawn), 1);
        assert_eq!(bus.subscriber_count(Channel::Kill), 1);
    }

    #[test]
    fn test_clear() {
        let mut bus = EventBus::new();
        for &channel in Channel::all() {
            bus.subscribe(channel, |_| Ok(()));
        }

        bus.clear();

        for &channel in Channel::all() {
            assert_eq!(bus.subscriber_count(channel), 0);
        }
    }
}
