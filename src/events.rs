//! Typed change notifications and the bus that delivers them.
//!
//! Every state transition of the configuration core is described by one
//! [`ChangeEvent`]. Observers subscribe to an [`EventBus`] and receive events
//! synchronously, in subscription order, on the thread that published them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

use serde::Serialize;

use crate::models::{ServerDefinition, TokenKind};

/// Broad area an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventGroup {
    Configuration,
    Server,
    Connection,
    Permission,
}

/// What happened, independent of the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventName {
    Load,
    Add,
    Remove,
    Change,
    Connected,
}

/// Server attribute touched by a [`ChangeEvent::ServerChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerProperty {
    Includes,
    Environments,
    Username,
    BuildVersion,
    PatchGenerateDir,
    SmartclientBin,
}

impl ServerProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerProperty::Includes => "includes",
            ServerProperty::Environments => "environments",
            ServerProperty::Username => "username",
            ServerProperty::BuildVersion => "buildVersion",
            ServerProperty::PatchGenerateDir => "patchGenerateDir",
            ServerProperty::SmartclientBin => "smartclientBin",
        }
    }
}

/// One state transition. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    ServersLoaded {
        file: PathBuf,
        count: usize,
    },
    ServerAdded {
        server: ServerDefinition,
    },
    ServerRemoved {
        server: ServerDefinition,
    },
    ServerRenamed {
        id: String,
        old: String,
        new: String,
    },
    ServerChanged {
        server: ServerDefinition,
        property: ServerProperty,
    },
    IncludesChanged {
        old: Vec<String>,
        new: Vec<String>,
    },
    /// Ids of the previous and new current server.
    CurrentServerChanged {
        old: Option<String>,
        new: Option<String>,
    },
    /// Authorization token strings before and after the change.
    TokenChanged {
        kind: TokenKind,
        old: Option<String>,
        new: Option<String>,
    },
    LocationChanged {
        old: PathBuf,
        new: PathBuf,
    },
}

impl ChangeEvent {
    pub fn group(&self) -> EventGroup {
        match self {
            ChangeEvent::ServersLoaded { .. }
            | ChangeEvent::IncludesChanged { .. }
            | ChangeEvent::LocationChanged { .. } => EventGroup::Configuration,
            ChangeEvent::ServerAdded { .. }
            | ChangeEvent::ServerRemoved { .. }
            | ChangeEvent::ServerRenamed { .. }
            | ChangeEvent::ServerChanged { .. } => EventGroup::Server,
            ChangeEvent::CurrentServerChanged { .. } => EventGroup::Connection,
            ChangeEvent::TokenChanged { .. } => EventGroup::Permission,
        }
    }

    pub fn name(&self) -> EventName {
        match self {
            ChangeEvent::ServersLoaded { .. } => EventName::Load,
            ChangeEvent::ServerAdded { .. } => EventName::Add,
            ChangeEvent::ServerRemoved { .. } => EventName::Remove,
            ChangeEvent::CurrentServerChanged { .. } => EventName::Connected,
            ChangeEvent::ServerRenamed { .. }
            | ChangeEvent::ServerChanged { .. }
            | ChangeEvent::IncludesChanged { .. }
            | ChangeEvent::TokenChanged { .. }
            | ChangeEvent::LocationChanged { .. } => EventName::Change,
        }
    }

    pub fn property(&self) -> &'static str {
        match self {
            ChangeEvent::ServersLoaded { .. }
            | ChangeEvent::ServerAdded { .. }
            | ChangeEvent::ServerRemoved { .. } => "servers",
            ChangeEvent::ServerRenamed { .. } => "name",
            ChangeEvent::ServerChanged { property, .. } => property.as_str(),
            ChangeEvent::IncludesChanged { .. } => "includes",
            ChangeEvent::CurrentServerChanged { .. } => "currentServer",
            ChangeEvent::TokenChanged {
                kind: TokenKind::CompileKey,
                ..
            } => "compileKey",
            ChangeEvent::TokenChanged {
                kind: TokenKind::RpoToken,
                ..
            } => "rpoToken",
            ChangeEvent::LocationChanged { .. } => "location",
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&ChangeEvent)>;

/// Single-threaded publish/subscribe channel for [`ChangeEvent`]s.
///
/// A subscriber that panics is logged and skipped; the remaining subscribers
/// still see the event. Events published from inside a subscriber are queued
/// and delivered once the current event has reached everyone.
pub struct EventBus {
    subscribers: RefCell<Vec<(SubscriptionId, Handler)>>,
    // Ids in `subscribers`, readable while a dispatch holds the list
    active: RefCell<Vec<SubscriptionId>>,
    // Subscribe/unsubscribe calls made while a dispatch holds `subscribers`
    joining: RefCell<Vec<(SubscriptionId, Handler)>>,
    leaving: RefCell<Vec<SubscriptionId>>,
    queue: RefCell<VecDeque<ChangeEvent>>,
    dispatching: Cell<bool>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            active: RefCell::new(Vec::new()),
            joining: RefCell::new(Vec::new()),
            leaving: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            next_id: Cell::new(1),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let entry: (SubscriptionId, Handler) = (id, Box::new(handler));
        match self.subscribers.try_borrow_mut() {
            Ok(mut subscribers) => {
                subscribers.push(entry);
                self.active.borrow_mut().push(id);
            }
            Err(_) => self.joining.borrow_mut().push(entry),
        }
        id
    }

    /// Remove a subscriber. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscribers.try_borrow_mut() {
            Ok(mut subscribers) => {
                self.active.borrow_mut().retain(|sid| *sid != id);
                let before = subscribers.len();
                subscribers.retain(|(sid, _)| *sid != id);
                before != subscribers.len()
            }
            Err(_) => {
                let mut joining = self.joining.borrow_mut();
                let before = joining.len();
                joining.retain(|(sid, _)| *sid != id);
                if before != joining.len() {
                    return true;
                }
                let mut leaving = self.leaving.borrow_mut();
                if !self.active.borrow().contains(&id) || leaving.contains(&id) {
                    return false;
                }
                leaving.push(id);
                true
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.active.borrow().len() - self.leaving.borrow().len() + self.joining.borrow().len()
    }

    /// Deliver `event` to every subscriber.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            group = ?event.group(),
            name = ?event.name(),
            property = event.property(),
            "publishing change event"
        );
        self.queue.borrow_mut().push_back(event);
        if self.dispatching.get() {
            return;
        }

        self.dispatching.set(true);
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            self.dispatch(&event);
        }
        self.dispatching.set(false);
    }

    fn dispatch(&self, event: &ChangeEvent) {
        let mut subscribers = self.subscribers.borrow_mut();
        for (id, handler) in subscribers.iter_mut() {
            if self.leaving.borrow().contains(id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                tracing::error!(
                    subscriber = id.0,
                    property = event.property(),
                    "change event subscriber panicked"
                );
            }
        }

        let leaving: Vec<SubscriptionId> = self.leaving.borrow_mut().drain(..).collect();
        let joining: Vec<(SubscriptionId, Handler)> = self.joining.borrow_mut().drain(..).collect();
        let mut active = self.active.borrow_mut();
        if !leaving.is_empty() {
            subscribers.retain(|(sid, _)| !leaving.contains(sid));
            active.retain(|sid| !leaving.contains(sid));
        }
        active.extend(joining.iter().map(|(sid, _)| *sid));
        subscribers.extend(joining);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("queued", &self.queue.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn current(old: Option<&str>, new: Option<&str>) -> ChangeEvent {
        ChangeEvent::CurrentServerChanged {
            old: old.map(str::to_string),
            new: new.map(str::to_string),
        }
    }

    fn recorder(bus: &EventBus) -> Rc<RefCell<Vec<ChangeEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let order = Rc::clone(&order);
            bus.subscribe(move |_| order.borrow_mut().push(n));
        }
        bus.publish(current(None, Some("a")));
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let bus = EventBus::new();
        bus.subscribe(|_| panic!("boom"));
        let seen = recorder(&bus);

        bus.publish(current(None, Some("a")));
        bus.publish(current(Some("a"), None));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let id = bus.subscribe(move |_| counter.set(counter.get() + 1));

        bus.publish(current(None, Some("a")));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(current(Some("a"), None));
        assert_eq!(seen.get(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let bus = Rc::new(EventBus::new());
        let later = Rc::new(Cell::new(0));
        let counter = Rc::clone(&later);
        let results = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&bus);
        let log = Rc::clone(&results);
        let target = Rc::new(Cell::new(None));
        let target_id = Rc::clone(&target);
        bus.subscribe(move |_| {
            let (Some(bus), Some(id)) = (weak.upgrade(), target_id.get()) else {
                return;
            };
            let mut log = log.borrow_mut();
            log.push(bus.unsubscribe(SubscriptionId(999)));
            log.push(bus.unsubscribe(id));
            log.push(bus.unsubscribe(id));
            log.push(bus.subscriber_count() == 1);
        });
        target.set(Some(bus.subscribe(move |_| counter.set(counter.get() + 1))));

        bus.publish(current(None, Some("a")));
        assert_eq!(*results.borrow(), vec![false, true, false, true]);
        assert_eq!(later.get(), 0);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_from_subscriber_is_queued() {
        let bus = Rc::new(EventBus::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let inner_bus = Rc::downgrade(&bus);
        let log = Rc::clone(&order);
        bus.subscribe(move |event| {
            log.borrow_mut().push(format!("first:{}", event.property()));
            if let ChangeEvent::CurrentServerChanged { new: Some(_), .. } = event {
                if let Some(bus) = inner_bus.upgrade() {
                    bus.publish(ChangeEvent::IncludesChanged {
                        old: vec![],
                        new: vec!["/inc".to_string()],
                    });
                }
            }
        });
        let log = Rc::clone(&order);
        bus.subscribe(move |event| log.borrow_mut().push(format!("second:{}", event.property())));

        bus.publish(current(None, Some("a")));
        assert_eq!(
            *order.borrow(),
            vec![
                "first:currentServer",
                "second:currentServer",
                "first:includes",
                "second:includes",
            ]
        );
    }

    #[test]
    fn test_subscribe_during_dispatch_takes_effect_next_event() {
        let bus = Rc::new(EventBus::new());
        let late = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&bus);
        let late_counter = Rc::clone(&late);
        let mut registered = false;
        bus.subscribe(move |_| {
            if !registered {
                registered = true;
                let counter = Rc::clone(&late_counter);
                if let Some(bus) = weak.upgrade() {
                    bus.subscribe(move |_| counter.set(counter.get() + 1));
                }
            }
        });

        bus.publish(current(None, Some("a")));
        assert_eq!(late.get(), 0);
        bus.publish(current(Some("a"), None));
        assert_eq!(late.get(), 1);
    }

    #[test]
    fn test_event_triple() {
        let event = ChangeEvent::TokenChanged {
            kind: TokenKind::RpoToken,
            old: None,
            new: Some("x".to_string()),
        };
        assert_eq!(event.group(), EventGroup::Permission);
        assert_eq!(event.name(), EventName::Change);
        assert_eq!(event.property(), "rpoToken");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "token_changed");
        assert_eq!(json["kind"], "rpo_token");
    }
}
