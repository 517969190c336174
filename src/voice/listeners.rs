//! Listener sets with RAII de-registration handles

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;

struct Slots<T: ?Sized> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A set of independent subscribers for one kind of event.
///
/// Listeners may subscribe or unsubscribe while a notification is being
/// delivered; such changes take effect from the next notification.
pub struct ListenerSet<T: ?Sized> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: ?Sized> Clone for ListenerSet<T> {
    fn clone(&self) -> Self {
        ListenerSet { slots: self.slots.clone() }
    }
}

impl<T: ?Sized + 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> ListenerSet<T> {
    pub fn new() -> Self {
        ListenerSet {
            slots: Rc::new(RefCell::new(Slots { next_id: 0, listeners: Vec::new() })),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push((id, Rc::new(listener)));
            id
        };

        let weak: Weak<RefCell<Slots<T>>> = Rc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = weak.upgrade() {
                slots.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    pub fn notify(&self, payload: &T) {
        let snapshot: Vec<Listener<T>> = self
            .slots
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for listener in snapshot {
            listener(payload);
        }
    }

    pub fn clear(&self) {
        self.slots.borrow_mut().listeners.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.borrow().listeners.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// De-registration handle returned by every `subscribe`.
///
/// The listener is removed when the handle is dropped or `unsubscribe` is
/// called, whichever comes first.
#[must_use = "dropping a Subscription removes the listener immediately"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(remove: impl FnOnce() + 'static) -> Self {
        Subscription { remove: Some(Box::new(remove)) }
    }

    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_multiple_subscribers_receive_payload() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));

        let a2 = a.clone();
        let _sa = set.subscribe(move |v| a2.set(a2.get() + *v));
        let b2 = b.clone();
        let _sb = set.subscribe(move |v| b2.set(b2.get() + *v));

        set.notify(&5);
        assert_eq!(a.get(), 5);
        assert_eq!(b.get(), 5);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_listener() {
        let set: ListenerSet<()> = ListenerSet::new();
        let hits = Rc::new(Cell::new(0));

        let h1 = hits.clone();
        let first = set.subscribe(move |_| h1.set(h1.get() + 1));
        let h2 = hits.clone();
        let _second = set.subscribe(move |_| h2.set(h2.get() + 10));

        first.unsubscribe();
        set.notify(&());
        assert_eq!(hits.get(), 10);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let set: ListenerSet<()> = ListenerSet::new();
        {
            let _sub = set.subscribe(|_| {});
            assert_eq!(set.len(), 1);
        }
        assert!(set.is_empty());
    }

    #[test]
    fn test_subscribe_during_notify_is_deferred() {
        let set: ListenerSet<()> = ListenerSet::new();
        let hits = Rc::new(Cell::new(0));
        let held: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let inner_set = set.clone();
        let inner_hits = hits.clone();
        let inner_held = held.clone();
        let _outer = set.subscribe(move |_| {
            let h = inner_hits.clone();
            let sub = inner_set.subscribe(move |_| h.set(h.get() + 1));
            inner_held.borrow_mut().push(sub);
        });

        set.notify(&());
        assert_eq!(hits.get(), 0);

        set.notify(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_clear_then_unsubscribe_is_harmless() {
        let set: ListenerSet<()> = ListenerSet::new();
        let sub = set.subscribe(|_| {});
        set.clear();
        sub.unsubscribe();
        assert!(set.is_empty());
    }

    #[test]
    fn test_handle_outliving_set() {
        let sub = {
            let set: ListenerSet<()> = ListenerSet::new();
            set.subscribe(|_| {})
        };
        drop(sub);
    }
}
