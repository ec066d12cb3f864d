//! Synchronous publish/subscribe with reentrancy-safe subscription changes.
//!
//! A [`Subject`] calls its observers in subscription order, synchronously,
//! from inside [`Subject::notify`]. Observers may subscribe or unsubscribe
//! (themselves or others) while a broadcast is in flight: such calls are
//! queued and applied in FIFO order as soon as the outermost broadcast loop
//! finishes. A drop guard performs that flush, so it also runs when an
//! observer panics.
//!
//! # Invariants
//!
//! 1. Each observer subscribed when a broadcast starts is called exactly once
//!    for that broadcast.
//! 2. Subscribing a present observer, or unsubscribing an absent one, is a
//!    silent no-op.
//! 3. A failing observer does not stop the remaining ones; its error goes to
//!    the subject's [`ErrorReporter`].
//! 4. A `notify` nested inside another `notify` on the same subject does not
//!    flush; the outermost call owns the flush.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::drawable::{DrawableId, ModelId};
use crate::error::ObserverError;
use crate::transform::MapId;
use crate::view::ViewId;

/// A notification delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A point series dropped all of its samples.
    SeriesReset(ModelId),
    /// A drawable joined a scene graph.
    DrawableAdded(DrawableId),
    /// A drawable left a scene graph.
    DrawableRemoved(DrawableId),
    /// The z-order of a scene graph changed.
    Reordered,
    /// A view replaced its coordinate mapping.
    MapChanged(MapId),
    /// A view joined the compositor.
    ViewAdded(ViewId),
    /// A view left the compositor.
    ViewRemoved(ViewId),
    /// The compositor's on-screen surface changed size.
    SizeChanged {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// Application-defined event.
    Named(Cow<'static, str>),
}

impl Event {
    /// Short name of the event, used for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::SeriesReset(_) => "series-reset",
            Self::DrawableAdded(_) => "drawable-added",
            Self::DrawableRemoved(_) => "drawable-removed",
            Self::Reordered => "reordered",
            Self::MapChanged(_) => "map-changed",
            Self::ViewAdded(_) => "view-added",
            Self::ViewRemoved(_) => "view-removed",
            Self::SizeChanged { .. } => "size-changed",
            Self::Named(name) => name,
        }
    }
}

/// Receiver of subject notifications.
pub trait Observer {
    /// Handle one event.
    fn observe(&self, event: &Event) -> Result<(), ObserverError>;
}

impl<F> Observer for F
where
    F: Fn(&Event) -> Result<(), ObserverError>,
{
    fn observe(&self, event: &Event) -> Result<(), ObserverError> {
        self(event)
    }
}

/// Wrap a closure as a shareable observer.
pub fn observer_fn(
    f: impl Fn(&Event) -> Result<(), ObserverError> + 'static,
) -> Rc<dyn Observer> {
    Rc::new(f)
}

/// Sink for observer failures.
pub trait ErrorReporter {
    /// Report a failure raised while delivering `event`.
    fn report(&self, subject: &str, event: &Event, error: &ObserverError);
}

/// Reporter that logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, subject: &str, event: &Event, error: &ObserverError) {
        tracing::warn!(subject, event = event.name(), %error, "observer failed");
    }
}

enum Command {
    Subscribe(Rc<dyn Observer>),
    Unsubscribe(Rc<dyn Observer>),
}

struct Inner {
    name: Cow<'static, str>,
    observers: RefCell<Vec<Rc<dyn Observer>>>,
    pending: RefCell<VecDeque<Command>>,
    broadcasting: Cell<bool>,
    reporter: RefCell<Rc<dyn ErrorReporter>>,
}

impl Inner {
    fn apply(&self, command: Command) {
        let mut observers = self.observers.borrow_mut();
        match command {
            Command::Subscribe(observer) => {
                if !observers.iter().any(|existing| same(existing, &observer)) {
                    observers.push(observer);
                    tracing::debug!(subject = %self.name, count = observers.len(), "subscribed");
                }
            }
            Command::Unsubscribe(observer) => {
                if let Some(index) = observers.iter().position(|existing| same(existing, &observer))
                {
                    observers.remove(index);
                    tracing::debug!(subject = %self.name, count = observers.len(), "unsubscribed");
                }
            }
        }
    }

    fn flush(&self) {
        loop {
            let command = self.pending.borrow_mut().pop_front();
            let Some(command) = command else {
                break;
            };
            self.apply(command);
        }
    }
}

struct FlushGuard<'a> {
    inner: &'a Inner,
    outermost: bool,
}

impl<'a> FlushGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let outermost = !inner.broadcasting.replace(true);
        Self { inner, outermost }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if self.outermost {
            self.inner.broadcasting.set(false);
            self.inner.flush();
        }
    }
}

fn same(a: &Rc<dyn Observer>, b: &Rc<dyn Observer>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Shared handle to an observer list.
///
/// Clones refer to the same subject, so an observer can hold a handle and
/// mutate subscriptions from inside its own callback.
#[derive(Clone)]
pub struct Subject {
    inner: Rc<Inner>,
}

impl Subject {
    /// Create a subject with a diagnostic name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: Rc::new(Inner {
                name: name.into(),
                observers: RefCell::new(Vec::new()),
                pending: RefCell::new(VecDeque::new()),
                broadcasting: Cell::new(false),
                reporter: RefCell::new(Rc::new(LogReporter)),
            }),
        }
    }

    /// Access the diagnostic name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Replace the sink for observer failures.
    pub fn set_reporter(&self, reporter: Rc<dyn ErrorReporter>) {
        *self.inner.reporter.borrow_mut() = reporter;
    }

    /// Add an observer; deferred while a broadcast is in flight.
    pub fn subscribe(&self, observer: Rc<dyn Observer>) {
        self.submit(Command::Subscribe(observer));
    }

    /// Remove an observer; deferred while a broadcast is in flight.
    pub fn unsubscribe(&self, observer: &Rc<dyn Observer>) {
        self.submit(Command::Unsubscribe(Rc::clone(observer)));
    }

    /// Check whether the observer is in the applied list.
    pub fn is_subscribed(&self, observer: &Rc<dyn Observer>) -> bool {
        self.inner
            .observers
            .borrow()
            .iter()
            .any(|existing| same(existing, observer))
    }

    /// Number of observers in the applied list.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    /// Check whether a broadcast is in flight.
    pub fn is_broadcasting(&self) -> bool {
        self.inner.broadcasting.get()
    }

    /// Deliver an event to every subscribed observer, in order.
    pub fn notify(&self, event: &Event) {
        let _flush = FlushGuard::enter(&self.inner);
        let mut index = 0;
        loop {
            let observer = match self.inner.observers.borrow().get(index) {
                Some(observer) => Rc::clone(observer),
                None => break,
            };
            if let Err(error) = observer.observe(event) {
                let reporter = Rc::clone(&self.inner.reporter.borrow());
                reporter.report(&self.inner.name, event, &error);
            }
            index += 1;
        }
    }

    /// Broadcast an application-defined event by name.
    pub fn broadcast_named(&self, name: impl Into<Cow<'static, str>>) {
        self.notify(&Event::Named(name.into()));
    }

    fn submit(&self, command: Command) {
        if self.inner.broadcasting.get() {
            self.inner.pending.borrow_mut().push_back(command);
        } else {
            self.inner.apply(command);
        }
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("name", &self.inner.name)
            .field("observers", &self.observer_count())
            .field("pending", &self.inner.pending.borrow().len())
            .field("broadcasting", &self.is_broadcasting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log, tag: &'static str) -> Rc<dyn Observer> {
        let log = Rc::clone(log);
        observer_fn(move |event| {
            log.borrow_mut().push(format!("{tag}:{}", event.name()));
            Ok(())
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[derive(Default)]
    struct CollectingReporter {
        failures: RefCell<Vec<String>>,
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, subject: &str, event: &Event, error: &ObserverError) {
            self.failures
                .borrow_mut()
                .push(format!("{subject}/{}/{error}", event.name()));
        }
    }

    #[test]
    fn notifies_in_subscription_order() {
        let subject = Subject::new("test");
        let log = Log::default();
        subject.subscribe(recorder(&log, "a"));
        subject.subscribe(recorder(&log, "b"));
        subject.broadcast_named("ping");
        assert_eq!(entries(&log), ["a:ping", "b:ping"]);
    }

    #[test]
    fn subscribe_and_unsubscribe_are_idempotent() {
        let subject = Subject::new("test");
        let log = Log::default();
        let a = recorder(&log, "a");
        subject.subscribe(Rc::clone(&a));
        subject.subscribe(Rc::clone(&a));
        assert_eq!(subject.observer_count(), 1);
        subject.unsubscribe(&a);
        subject.unsubscribe(&a);
        assert_eq!(subject.observer_count(), 0);
        subject.broadcast_named("ping");
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn self_unsubscribe_during_notify_skips_nobody() {
        let subject = Subject::new("test");
        let log = Log::default();
        subject.subscribe(recorder(&log, "a"));

        let slot: Rc<RefCell<Option<Rc<dyn Observer>>>> = Rc::default();
        let quitter = {
            let log = Rc::clone(&log);
            let slot = Rc::clone(&slot);
            let handle = subject.clone();
            observer_fn(move |event| {
                log.borrow_mut().push(format!("quitter:{}", event.name()));
                if let Some(me) = slot.borrow().as_ref() {
                    handle.unsubscribe(me);
                    // A second removal of an already-queued observer is harmless.
                    handle.unsubscribe(me);
                }
                Ok(())
            })
        };
        *slot.borrow_mut() = Some(Rc::clone(&quitter));
        subject.subscribe(Rc::clone(&quitter));
        subject.subscribe(recorder(&log, "c"));

        subject.broadcast_named("one");
        assert_eq!(entries(&log), ["a:one", "quitter:one", "c:one"]);
        assert!(!subject.is_subscribed(&quitter));

        subject.broadcast_named("two");
        assert_eq!(
            entries(&log),
            ["a:one", "quitter:one", "c:one", "a:two", "c:two"]
        );
        slot.borrow_mut().take();
    }

    #[test]
    fn subscriptions_made_during_broadcast_apply_afterwards() {
        let subject = Subject::new("test");
        let log = Log::default();
        let late = recorder(&log, "late");
        let adder = {
            let handle = subject.clone();
            let late = Rc::clone(&late);
            observer_fn(move |_| {
                handle.subscribe(Rc::clone(&late));
                assert!(handle.is_broadcasting());
                assert!(!handle.is_subscribed(&late));
                Ok(())
            })
        };
        subject.subscribe(adder);
        subject.broadcast_named("one");
        assert!(entries(&log).is_empty());
        assert!(subject.is_subscribed(&late));
        assert_eq!(subject.observer_count(), 2);

        subject.broadcast_named("two");
        assert_eq!(entries(&log), ["late:two"]);
    }

    #[test]
    fn failing_observer_does_not_block_others() {
        let subject = Subject::new("bus");
        let reporter = Rc::new(CollectingReporter::default());
        subject.set_reporter(Rc::clone(&reporter) as Rc<dyn ErrorReporter>);
        let log = Log::default();
        let late = recorder(&log, "late");
        let failing = {
            let handle = subject.clone();
            let late = Rc::clone(&late);
            observer_fn(move |_| {
                handle.subscribe(Rc::clone(&late));
                Err(ObserverError::new("boom"))
            })
        };
        subject.subscribe(failing);
        subject.subscribe(recorder(&log, "b"));
        subject.broadcast_named("ping");

        assert_eq!(entries(&log), ["b:ping"]);
        assert_eq!(*reporter.failures.borrow(), ["bus/ping/boom"]);
        assert!(subject.is_subscribed(&late));
        assert!(!subject.is_broadcasting());
    }

    #[test]
    fn panicking_observer_still_flushes_queue() {
        let subject = Subject::new("test");
        let log = Log::default();
        let late = recorder(&log, "late");
        let panicking = {
            let handle = subject.clone();
            let late = Rc::clone(&late);
            observer_fn(move |_| {
                handle.subscribe(Rc::clone(&late));
                panic!("observer bug");
            })
        };
        subject.subscribe(Rc::clone(&panicking));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            subject.broadcast_named("ping");
        }));
        assert!(result.is_err());
        assert!(!subject.is_broadcasting());
        assert!(subject.is_subscribed(&late));
        subject.unsubscribe(&panicking);
    }

    #[test]
    fn nested_notify_defers_flush_to_outermost_call() {
        let subject = Subject::new("test");
        let log = Log::default();
        let b = recorder(&log, "b");
        let a = {
            let handle = subject.clone();
            let log = Rc::clone(&log);
            let b = Rc::clone(&b);
            observer_fn(move |event| {
                log.borrow_mut().push(format!("a:{}", event.name()));
                if event.name() == "outer" {
                    handle.broadcast_named("inner");
                    handle.unsubscribe(&b);
                    assert!(handle.is_subscribed(&b));
                }
                Ok(())
            })
        };
        subject.subscribe(a);
        subject.subscribe(Rc::clone(&b));
        subject.broadcast_named("outer");

        assert_eq!(entries(&log), ["a:outer", "a:inner", "b:inner", "b:outer"]);
        assert!(!subject.is_subscribed(&b));
    }
}
