//! Named multi-listener dispatcher with fire/handled counters.
//!
//! Dispatch is synchronous and single-threaded: `dispatch` calls every
//! registered listener in registration order before returning, with no
//! queueing or async hand-off.

/// A single named event channel with zero or more listeners.
///
/// `fired` counts every call to `dispatch`; `handled` counts the number of
/// listener invocations that resulted from those dispatches (fired *
/// listener count, accumulated). Both are exposed for diagnostics and for
/// `SystemManager::stats()`.
pub struct EventBus<E> {
    name: &'static str,
    listeners: Vec<Box<dyn FnMut(&E)>>,
    fired: u64,
    handled: u64,
}

impl<E> EventBus<E> {
    pub fn new(name: &'static str) -> Self {
        EventBus {
            name,
            listeners: Vec::new(),
            fired: 0,
            handled: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registers a new listener. Returns its index for later bookkeeping.
    pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) -> usize {
        self.listeners.push(Box::new(listener));
        self.listeners.len() - 1
    }

    /// Fires `event` to every listener in registration order.
    pub fn dispatch(&mut self, event: &E) {
        self.fired += 1;
        for listener in &mut self.listeners {
            listener(event);
            self.handled += 1;
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn handled(&self) -> u64 {
        self.handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn dispatch_reaches_all_listeners() {
        let mut bus = EventBus::<i32>::new("test");
        let calls = Rc::new(RefCell::new(Vec::new()));

        let c1 = calls.clone();
        bus.subscribe(move |e| c1.borrow_mut().push(("a", *e)));
        let c2 = calls.clone();
        bus.subscribe(move |e| c2.borrow_mut().push(("b", *e)));

        bus.dispatch(&7);

        assert_eq!(*calls.borrow(), vec![("a", 7), ("b", 7)]);
        assert_eq!(bus.fired(), 1);
        assert_eq!(bus.handled(), 2);
    }

    #[test]
    fn counters_accumulate_across_dispatches() {
        let mut bus = EventBus::<()>::new("test");
        bus.subscribe(|_| {});
        bus.dispatch(&());
        bus.dispatch(&());
        bus.dispatch(&());
        assert_eq!(bus.fired(), 3);
        assert_eq!(bus.handled(), 3);
    }
}
