//! Typed event dispatch with per-listener filters.
//!
//! Listeners register for one concrete event type together with a filter.
//! When an event is posted, each listener's filter decides whether its
//! callback runs for that event and reports the outcome as a
//! [`ListenerResult`]. Neither outcome stops the remaining listeners from
//! being evaluated.
//!
//! Listeners run synchronously on the thread that calls
//! [`EventDispatcher::post`], in registration order.

mod dispatcher;

pub use dispatcher::EventDispatcher;

/// Marker for values that can be posted through an [`EventDispatcher`].
pub trait Event: Send + Sync + 'static {}

/// Outcome of one filter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerResult {
    /// The filter matched and the callback ran.
    Handled,
    /// The filter did not match; the callback did not run.
    PassThrough,
}

/// Decides, per event, whether a listener's callback fires.
pub trait EventFilter<E: Event>: Send + Sync + 'static {
    fn handle(&self, callback: &dyn Fn(&E), event: &E) -> ListenerResult;
}

/// Filter that accepts every event of its type.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyFilter;

impl<E: Event> EventFilter<E> for AnyFilter {
    fn handle(&self, callback: &dyn Fn(&E), event: &E) -> ListenerResult {
        callback(event);
        ListenerResult::Handled
    }
}

/// Token returned by [`EventDispatcher::listen`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);
