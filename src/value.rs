use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Subscriber callback. Receives the payload of every set/notify.
pub(crate) type Callback<T> = Rc<dyn Fn(&T)>;

struct ValueInner<T> {
    /// `None` is the NoValue marker.
    stored: RefCell<Option<T>>,
    /// Append-only, notification order = subscription order.
    subscribers: RefCell<Vec<Callback<T>>>,
}

/// Reactive cell holding an optional current value and a subscriber list
///
/// A `Value` is a cheap, shared handle: cloning it yields another handle to
/// the same cell. It can be used in two ways:
///
/// - **continuous**: [`set`](Value::set) stores the new value and notifies
///   subscribers, so [`read`](Value::read) always returns the latest value.
/// - **instantaneous**: [`notify`](Value::notify) only fires the subscribers,
///   leaving the stored value untouched (usually NoValue, i.e. `None`).
///
/// Subscribers run synchronously, in subscription order, and may themselves
/// set other values; such cascades complete depth-first before the outer
/// `set`/`notify` returns. Building a cycle of subscriptions that keeps
/// setting values forever is the caller's problem.
///
/// There is no way to unsubscribe.
///
/// # Usage
/// ```
/// use yarpl::Value;
///
/// let celsius = Value::new(20.0);
/// let fahrenheit = Value::empty();
///
/// let out = fahrenheit.clone();
/// celsius.subscribe(move |c: &f64| out.set(c * 9.0 / 5.0 + 32.0));
///
/// celsius.set(100.0);
/// assert_eq!(fahrenheit.read(), Some(212.0));
/// ```
pub struct Value<T> {
    inner: Rc<ValueInner<T>>,
}

/// Non-owning handle to a [`Value`], used by subscriber closures so the
/// subscription graph never keeps its own upstream alive.
pub struct WeakValue<T> {
    inner: Weak<ValueInner<T>>,
}

impl<T: Clone + 'static> Value<T> {
    /// Create a continuous value holding `initial`
    pub fn new(initial: T) -> Self {
        Self::with_stored(Some(initial))
    }

    /// Create a value holding NoValue
    ///
    /// This is the usual starting point for an instantaneous value.
    pub fn empty() -> Self {
        Self::with_stored(None)
    }

    pub(crate) fn with_stored(stored: Option<T>) -> Self {
        Value {
            inner: Rc::new(ValueInner {
                stored: RefCell::new(stored),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Current stored value, `None` if NoValue
    ///
    /// Reading never has side effects.
    pub fn read(&self) -> Option<T> {
        self.inner.stored.borrow().clone()
    }

    /// Whether a continuous value is currently stored
    pub fn is_set(&self) -> bool {
        self.inner.stored.borrow().is_some()
    }

    /// Continuous update: store `value`, then notify every subscriber with it
    pub fn set(&self, value: T) {
        self.replace(Some(value.clone()));
        self.notify(value);
    }

    /// Instantaneous update: notify every subscriber with `value` without
    /// touching the stored value
    pub fn notify(&self, value: T) {
        // Snapshot so subscribers added during dispatch only see later events,
        // and so a subscriber may subscribe without a RefCell conflict.
        let subscribers: Vec<Callback<T>> = self.inner.subscribers.borrow().clone();
        for subscriber in &subscribers {
            subscriber(&value);
        }
    }

    /// Store `stored` (possibly NoValue) and notify with a different
    /// `instantaneous` payload
    ///
    /// This lets a derived value mirror another value exactly: the stored
    /// part tracks the source's continuous state while subscribers receive
    /// whatever payload the source fired with.
    pub fn update(&self, stored: Option<T>, instantaneous: T) {
        self.replace(stored);
        self.notify(instantaneous);
    }

    fn replace(&self, stored: Option<T>) {
        *self.inner.stored.borrow_mut() = stored;
    }

    /// Register a callback invoked on every set/notify
    ///
    /// Callbacks are never removed.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&T) + 'static,
    {
        self.inner.subscribers.borrow_mut().push(Rc::new(callback));
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Create a non-owning handle to this value
    pub fn downgrade(&self) -> WeakValue<T> {
        WeakValue {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same cell
    pub fn ptr_eq(&self, other: &Value<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> WeakValue<T> {
    /// Get a strong handle back, if the value is still alive
    pub fn upgrade(&self) -> Option<Value<T>> {
        self.inner.upgrade().map(|inner| Value { inner })
    }
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Value {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Clone for WeakValue<T> {
    fn clone(&self) -> Self {
        WeakValue {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stored = self.inner.stored.borrow();
        f.debug_struct("Value")
            .field("stored", &*stored)
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Value<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Plain data becomes a continuous value
impl<T: Clone + 'static> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Value::new(value)
    }
}

/// Coerce plain data (or an existing [`Value`]) into a [`Value`]
///
/// An existing `Value` is passed through unchanged, anything else is wrapped
/// in a new continuous value. Containers are wrapped whole; their elements are
/// not turned into values of their own.
pub fn ensure_value<T, V>(value: V) -> Value<T>
where
    T: Clone + 'static,
    V: Into<Value<T>>,
{
    value.into()
}

/// Turn a continuous value into an instantaneous one that fires whenever the
/// source changes
///
/// The returned value always holds NoValue.
pub fn make_instantaneous<T: Clone + 'static>(source: &Value<T>) -> Value<T> {
    let output = Value::empty();
    let target = output.clone();
    source.subscribe(move |value: &T| target.notify(value.clone()));
    output
}

/// Turn an instantaneous value into a continuous one which keeps the last
/// payload it saw
///
/// Starts out holding `initial` (`None` for NoValue).
pub fn make_persistent<T: Clone + 'static>(source: &Value<T>, initial: Option<T>) -> Value<T> {
    let output = Value::with_stored(initial);
    let target = output.clone();
    source.subscribe(move |value: &T| target.set(value.clone()));
    output
}
