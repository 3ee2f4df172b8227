//! Typed listener lists.
//!
//! Listeners run in registration order. A listener that returns
//! [`Handled::Stop`] ends propagation and its value is handed back to the
//! caller of [`Event::trigger`].

use std::fmt;

/// Listener verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled<R = ()> {
    Continue,
    Stop(R),
}

/// Token returned by [`Event::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<A, R> = Box<dyn FnMut(&A) -> Handled<R>>;

/// An event with argument `A` whose listeners may stop propagation with an `R`.
pub struct Event<A, R = ()> {
    listeners: Vec<(ListenerId, Listener<A, R>)>,
    next_id: u64,
}

impl<A, R> Event<A, R> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&A) -> Handled<R> + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Call listeners in order until one stops propagation.
    pub fn trigger(&mut self, arg: &A) -> Option<R> {
        for (_, listener) in self.listeners.iter_mut() {
            if let Handled::Stop(value) = listener(arg) {
                return Some(value);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl<A, R> Default for Event<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> fmt::Debug for Event<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
