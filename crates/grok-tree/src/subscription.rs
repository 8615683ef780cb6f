use std::fmt;
use std::sync::{Arc, Mutex};

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle to an attached observer.
///
/// The only capability is [`unsubscribe`](Self::unsubscribe), which runs the
/// teardown at most once; later calls, from any clone, do nothing. Dropping
/// the handle does not unsubscribe.
#[derive(Clone)]
pub struct Subscription {
    teardown: Arc<Mutex<Option<Teardown>>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Arc::new(Mutex::new(Some(Box::new(teardown)))),
        }
    }

    /// A handle that is already inactive.
    pub fn noop() -> Self {
        Self {
            teardown: Arc::new(Mutex::new(None)),
        }
    }

    /// Compose several handles behind one.
    pub fn merge(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let subscriptions: Vec<Subscription> = subscriptions.into_iter().collect();
        Self::new(move || {
            for subscription in subscriptions {
                subscription.unsubscribe();
            }
        })
    }

    /// Detach the observer. Idempotent.
    pub fn unsubscribe(&self) {
        let teardown = self.teardown.lock().expect("lock poisoned").take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    pub fn is_active(&self) -> bool {
        self.teardown.lock().expect("lock poisoned").is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
