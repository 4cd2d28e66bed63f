//! Listener table and dispatch.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{Event, EventFilter, ListenerId, ListenerResult};

type Callback<E> = Box<dyn Fn(&E) + Send + Sync>;

trait ErasedListener: Send + Sync {
    /// `None` if `event` is not this listener's event type.
    fn invoke(&self, event: &dyn Any) -> Option<ListenerResult>;
}

struct Listener<E, F> {
    filter: F,
    callback: Callback<E>,
}

impl<E: Event, F: EventFilter<E>> ErasedListener for Listener<E, F> {
    fn invoke(&self, event: &dyn Any) -> Option<ListenerResult> {
        let event = event.downcast_ref::<E>()?;
        Some(self.filter.handle(&*self.callback, event))
    }
}

type ListenerList = Vec<(ListenerId, Arc<dyn ErasedListener>)>;

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<TypeId, ListenerList>>,
}

/// Shared registry of typed listeners.
///
/// Cloning is cheap; clones share the same listener table.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events of type `E`, gated by `filter`.
    pub fn listen<E, F>(&self, filter: F, callback: impl Fn(&E) + Send + Sync + 'static) -> ListenerId
    where
        E: Event,
        F: EventFilter<E>,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<dyn ErasedListener> = Arc::new(Listener {
            filter,
            callback: Box::new(callback),
        });

        self.inner
            .listeners
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, listener));

        crate::debug_event!(
            "events",
            "listen",
            "{id:?} for {}",
            std::any::type_name::<E>()
        );
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        for list in listeners.values_mut() {
            if let Some(pos) = list.iter().position(|(existing, _)| *existing == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Offer `event` to every listener of its type.
    ///
    /// Returns how many listeners handled it. The listener list is
    /// snapshotted first, so callbacks may register or remove listeners;
    /// such changes apply from the next post.
    pub fn post<E: Event>(&self, event: &E) -> usize {
        let snapshot: Vec<Arc<dyn ErasedListener>> = match self.inner.listeners.read().get(&TypeId::of::<E>()) {
            Some(list) => list.iter().map(|(_, listener)| listener.clone()).collect(),
            None => return 0,
        };

        snapshot
            .iter()
            .filter(|listener| listener.invoke(event) == Some(ListenerResult::Handled))
            .count()
    }

    /// Number of listeners registered for `E`.
    pub fn listener_count<E: Event>(&self) -> usize {
        self.inner
            .listeners
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.inner.listeners.read();
        f.debug_struct("EventDispatcher")
            .field("event_types", &listeners.len())
            .field("listeners", &listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
