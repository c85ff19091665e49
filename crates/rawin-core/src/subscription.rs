//! Lock-free subscriber lists and the registry that ties them to raw input
//! registration.
//!
//! Lists are immutable snapshots swapped atomically: dispatch reads one
//! snapshot and never blocks or observes a half-applied change. The first
//! subscriber of a class registers the class with the platform and the last
//! one leaving unregisters it. Registration always happens on the pump thread.

use crate::config::RegistrationOptions;
use crate::device::{DeviceClass, DeviceScope};
use crate::error::{ReceiverError, ReceiverResult};
use crate::event::{KeyboardEvent, MouseEvent};
use crate::platform::{MessageWindowHost, RawInputRegistrar};
use crate::pump::PumpHost;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handle returned by a subscribe call, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Subscriber<E> {
    id: SubscriptionId,
    callback: Callback<E>,
}

impl<E> Clone for Subscriber<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Ordered, copy-on-write list of callbacks.
pub struct SubscriberList<E> {
    list: ArcSwap<Vec<Subscriber<E>>>,
}

impl<E> Default for SubscriberList<E> {
    fn default() -> Self {
        Self {
            list: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl<E> SubscriberList<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback. Returns its id and whether the list was empty before.
    pub fn add(&self, callback: Callback<E>) -> (SubscriptionId, bool) {
        let id = SubscriptionId::next();
        let subscriber = Subscriber { id, callback };
        let mut current = self.list.load_full();
        loop {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(subscriber.clone());

            let prev = self.list.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*prev, &current) {
                return (id, current.is_empty());
            }
            current = arc_swap::Guard::into_inner(prev);
        }
    }

    /// Remove a callback. Returns `None` if `id` is not in the list, otherwise
    /// whether the list is now empty.
    pub fn remove(&self, id: SubscriptionId) -> Option<bool> {
        let mut current = self.list.load_full();
        loop {
            let position = current.iter().position(|s| s.id == id)?;
            let mut next = Vec::clone(&current);
            next.remove(position);
            let now_empty = next.is_empty();

            let prev = self.list.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*prev, &current) {
                return Some(now_empty);
            }
            current = arc_swap::Guard::into_inner(prev);
        }
    }

    /// Invoke every callback of the current snapshot, in subscription order.
    pub fn dispatch(&self, event: &E) -> usize {
        let snapshot = self.list.load_full();
        for subscriber in snapshot.iter() {
            (subscriber.callback)(event);
        }
        snapshot.len()
    }

    /// Drop all callbacks. Returns whether the list had any.
    pub fn clear(&self) -> bool {
        !self.list.swap(Arc::new(Vec::new())).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.list.load().is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.load().len()
    }
}

/// Mouse and keyboard subscriber lists of one receiver.
#[derive(Default)]
pub struct Subscribers {
    pub mouse: SubscriberList<MouseEvent>,
    pub keyboard: SubscriberList<KeyboardEvent>,
}

impl Subscribers {
    pub fn has_any(&self, class: DeviceClass) -> bool {
        match class {
            DeviceClass::Mouse => !self.mouse.is_empty(),
            DeviceClass::Keyboard => !self.keyboard.is_empty(),
        }
    }
}

/// Registration state of both classes, only touched on the pump thread.
#[derive(Default)]
struct Registrations {
    mouse: AtomicBool,
    keyboard: AtomicBool,
}

impl Registrations {
    fn flag(&self, class: DeviceClass) -> &AtomicBool {
        match class {
            DeviceClass::Mouse => &self.mouse,
            DeviceClass::Keyboard => &self.keyboard,
        }
    }
}

/// Subscriber bookkeeping plus the matching platform registrations.
pub struct SubscriptionRegistry<P: MessageWindowHost + RawInputRegistrar> {
    scope: DeviceScope,
    options: RegistrationOptions,
    subscribers: Arc<Subscribers>,
    registered: Arc<Registrations>,
    disposed: Arc<AtomicBool>,
    platform: Arc<P>,
}

impl<P: MessageWindowHost + RawInputRegistrar> SubscriptionRegistry<P> {
    pub fn new(
        platform: Arc<P>,
        scope: DeviceScope,
        options: RegistrationOptions,
        subscribers: Arc<Subscribers>,
    ) -> Self {
        Self {
            scope,
            options,
            subscribers,
            registered: Arc::default(),
            disposed: Arc::new(AtomicBool::new(false)),
            platform,
        }
    }

    pub fn subscribers(&self) -> &Arc<Subscribers> {
        &self.subscribers
    }

    fn check(&self, class: DeviceClass) -> ReceiverResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ReceiverError::Disposed);
        }
        if !self.scope.includes(class) {
            return Err(ReceiverError::ClassNotEnabled(class));
        }
        Ok(())
    }

    pub fn subscribe_mouse(
        &self,
        host: &PumpHost<P>,
        callback: Callback<MouseEvent>,
    ) -> ReceiverResult<SubscriptionId> {
        self.check(DeviceClass::Mouse)?;
        let (id, was_empty) = self.subscribers.mouse.add(callback);
        if was_empty {
            self.reconcile(host, DeviceClass::Mouse);
        }
        debug!(?id, "Mouse subscriber added");
        Ok(id)
    }

    pub fn subscribe_keyboard(
        &self,
        host: &PumpHost<P>,
        callback: Callback<KeyboardEvent>,
    ) -> ReceiverResult<SubscriptionId> {
        self.check(DeviceClass::Keyboard)?;
        let (id, was_empty) = self.subscribers.keyboard.add(callback);
        if was_empty {
            self.reconcile(host, DeviceClass::Keyboard);
        }
        debug!(?id, "Keyboard subscriber added");
        Ok(id)
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, host: &PumpHost<P>, class: DeviceClass, id: SubscriptionId) -> bool {
        let removed = match class {
            DeviceClass::Mouse => self.subscribers.mouse.remove(id),
            DeviceClass::Keyboard => self.subscribers.keyboard.remove(id),
        };
        match removed {
            Some(now_empty) => {
                if now_empty && !self.disposed.load(Ordering::SeqCst) {
                    self.reconcile(host, class);
                }
                debug!(?id, ?class, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Queue a pump-thread check that brings the platform registration of
    /// `class` in line with the current subscriber list.
    ///
    /// Transitions observed out of order by different threads all converge:
    /// whichever check runs last sees the final list.
    fn reconcile(&self, host: &PumpHost<P>, class: DeviceClass) {
        let platform = Arc::clone(&self.platform);
        let subscribers = Arc::clone(&self.subscribers);
        let registered = Arc::clone(&self.registered);
        let disposed = Arc::clone(&self.disposed);
        let options = self.options;

        let queued = host.invoke(move |window| {
            let wanted = subscribers.has_any(class) && !disposed.load(Ordering::SeqCst);
            let flag = registered.flag(class);
            if wanted == flag.load(Ordering::SeqCst) {
                return Ok(());
            }
            let result = if wanted {
                platform.register(class, window, &options)
            } else {
                platform.unregister(class)
            };
            match &result {
                Ok(()) => {
                    flag.store(wanted, Ordering::SeqCst);
                    info!(?class, registered = wanted, "Raw input registration changed");
                }
                Err(err) => {
                    warn!(?class, registered = wanted, error = %err, "Raw input registration failed");
                }
            }
            result
        });
        if let Err(err) = queued {
            debug!(?class, error = %err, "Registration change not queued");
        }
    }

    /// Drop every subscriber and unregister both classes. Returns `false` if
    /// already disposed.
    pub fn dispose_all(&self, host: &PumpHost<P>) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.subscribers.mouse.clear();
        self.subscribers.keyboard.clear();

        let platform = Arc::clone(&self.platform);
        let registered = Arc::clone(&self.registered);
        let queued = host.invoke(move |_window| {
            for class in DeviceClass::ALL {
                let flag = registered.flag(class);
                if !flag.swap(false, Ordering::SeqCst) {
                    continue;
                }
                if let Err(err) = platform.unregister(class) {
                    warn!(?class, error = %err, "Failed to unregister raw input");
                }
            }
            Ok(())
        });
        if let Err(err) = queued {
            debug!(error = %err, "Unregistration not queued");
        }
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Whether `class` is currently registered with the platform.
    pub fn is_registered(&self, class: DeviceClass) -> bool {
        self.registered.flag(class).load(Ordering::SeqCst)
    }
}
