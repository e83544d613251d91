//! Publish/subscribe hub for external listeners (UI, audio, VFX).
//!
//! Subscriptions are keyed by the event's dotted name, or registered as a
//! wildcard. Every subscription belongs to a [`ListenerOwner`]; the bus only
//! keeps a weak reference to it, so dropping the owner retires all of its
//! listeners. Dead listeners are pruned lazily, the next time an event with
//! that name is published.
//!
//! Dispatch is synchronous and re-entrant: a handler may publish, subscribe
//! or unsubscribe through a shared `&EventBus`. Each dispatch iterates over
//! a snapshot of the listener list taken when it started.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use crate::event::SimEvent;

pub type SubscriptionId = u64;

pub type Callback = Rc<dyn Fn(&SimEvent)>;

/// Liveness token for a group of subscriptions.
#[derive(Debug, Default)]
pub struct ListenerOwner {
    token: Rc<()>,
}

impl ListenerOwner {
    pub fn new() -> Self {
        Self::default()
    }

    fn downgrade(&self) -> Weak<()> {
        Rc::downgrade(&self.token)
    }

    fn is(&self, weak: &Weak<()>) -> bool {
        std::ptr::eq(weak.as_ptr(), Rc::as_ptr(&self.token))
    }
}

struct Listener {
    id:       SubscriptionId,
    owner:    Weak<()>,
    callback: Callback,
}

impl Listener {
    fn alive(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

const WILDCARD: &str = "*";

#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<BTreeMap<String, Vec<Listener>>>,
    next_id:   Cell<SubscriptionId>,
    published: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to every event named `name` (e.g. `"thing.returned"`).
    pub fn subscribe(
        &self,
        name: &str,
        owner: &ListenerOwner,
        callback: impl Fn(&SimEvent) + 'static,
    ) -> SubscriptionId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.listeners
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(Listener { id, owner: owner.downgrade(), callback: Rc::new(callback) });
        id
    }

    /// Listen to every event regardless of name.
    pub fn subscribe_all(
        &self,
        owner: &ListenerOwner,
        callback: impl Fn(&SimEvent) + 'static,
    ) -> SubscriptionId {
        self.subscribe(WILDCARD, owner, callback)
    }

    /// Remove one subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.listeners.borrow_mut();
        for list in table.values_mut() {
            if let Some(pos) = list.iter().position(|l| l.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove every subscription held by `owner`. Returns how many went.
    pub fn unsubscribe_all(&self, owner: &ListenerOwner) -> usize {
        let mut removed = 0;
        let mut table = self.listeners.borrow_mut();
        for list in table.values_mut() {
            let before = list.len();
            list.retain(|l| !owner.is(&l.owner));
            removed += before - list.len();
        }
        table.retain(|_, list| !list.is_empty());
        removed
    }

    /// Deliver `event` to every live listener for its name, then to the
    /// wildcard listeners. Returns the number of callbacks invoked.
    pub fn publish(&self, event: &SimEvent) -> usize {
        self.published.set(self.published.get() + 1);
        let name = event.name();
        let mut snapshot = self.snapshot(name);
        snapshot.extend(self.snapshot(WILDCARD));
        for callback in &snapshot {
            callback(event);
        }
        snapshot.len()
    }

    /// Number of registered listeners for `name`, dead ones included until
    /// they are pruned.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.borrow().get(name).map_or(0, Vec::len)
    }

    pub fn published_count(&self) -> u64 {
        self.published.get()
    }

    /// Prune dead listeners for `name` and clone out the live callbacks.
    fn snapshot(&self, name: &str) -> Vec<Callback> {
        let mut table = self.listeners.borrow_mut();
        let Some(list) = table.get_mut(name) else {
            return Vec::new();
        };
        let before = list.len();
        list.retain(Listener::alive);
        if list.len() != before {
            log::debug!("event bus: pruned {} dead listener(s) for '{name}'", before - list.len());
        }
        list.iter().map(|l| Rc::clone(&l.callback)).collect()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.listeners.borrow();
        f.debug_struct("EventBus")
            .field("names", &table.keys().collect::<Vec<_>>())
            .field("published", &self.published.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shake() -> SimEvent {
        SimEvent::ScreenShakeRequested { intensity: 1.0, duration: 0.2 }
    }

    #[test]
    fn dropped_owner_is_pruned_on_next_publish() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let owner = ListenerOwner::new();
        let h = Rc::clone(&hits);
        bus.subscribe("screen.shake_requested", &owner, move |_| h.set(h.get() + 1));

        bus.publish(&shake());
        assert_eq!(hits.get(), 1);

        drop(owner);
        assert_eq!(bus.listener_count("screen.shake_requested"), 1, "no eager collection");
        bus.publish(&shake());
        assert_eq!(hits.get(), 1);
        assert_eq!(bus.listener_count("screen.shake_requested"), 0);
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_publish() {
        let bus = Rc::new(EventBus::new());
        let owner = Rc::new(ListenerOwner::new());
        let late_hits = Rc::new(Cell::new(0));

        let (b, o, lh) = (Rc::clone(&bus), Rc::clone(&owner), Rc::clone(&late_hits));
        bus.subscribe("screen.shake_requested", &owner, move |_| {
            let lh = Rc::clone(&lh);
            b.subscribe("screen.shake_requested", &o, move |_| lh.set(lh.get() + 1));
        });

        bus.publish(&shake());
        assert_eq!(late_hits.get(), 0);
        bus.publish(&shake());
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn nested_publish_runs_depth_first() {
        let bus = Rc::new(EventBus::new());
        let owner = ListenerOwner::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let (b, o) = (Rc::clone(&bus), Rc::clone(&order));
        bus.subscribe("guy.longing", &owner, move |_| {
            o.borrow_mut().push("longing:start");
            b.publish(&shake());
            o.borrow_mut().push("longing:end");
        });
        let o2 = Rc::clone(&order);
        bus.subscribe("screen.shake_requested", &owner, move |_| o2.borrow_mut().push("shake"));

        bus.publish(&SimEvent::GuyLonging { guy: 1 });
        assert_eq!(*order.borrow(), vec!["longing:start", "shake", "longing:end"]);
    }

    #[test]
    fn unsubscribe_all_only_touches_that_owner() {
        let bus = EventBus::new();
        let a = ListenerOwner::new();
        let b = ListenerOwner::new();
        bus.subscribe("guy.longing", &a, |_| {});
        bus.subscribe_all(&a, |_| {});
        bus.subscribe("guy.longing", &b, |_| {});

        assert_eq!(bus.unsubscribe_all(&a), 2);
        assert_eq!(bus.publish(&SimEvent::GuyLonging { guy: 3 }), 1);
    }

    #[test]
    fn unknown_names_are_harmless() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&shake()), 0);
        assert!(!bus.unsubscribe(42));
    }
}
