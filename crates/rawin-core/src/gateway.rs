//! Routing from the single static window procedure to per-window handlers.
//!
//! The native window procedure knows nothing about receivers. Each window is
//! created with a [`WindowToken`]; the procedure hands every message to
//! [`route`], which looks the token up in a process-wide table of weak handler
//! references. A window whose owner has gone away gets the platform default.

use crate::event::RawEventEnvelope;
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Native window identity (an `HWND` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub usize);

/// Routing key stored alongside a native window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowToken(NonZeroU64);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl WindowToken {
    pub fn next() -> Self {
        let raw = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and cannot realistically wrap.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Recover a token from the pointer-sized value kept in window storage.
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroU64::new(raw as u64).map(Self)
    }

    pub fn into_raw(self) -> usize {
        self.0.get() as usize
    }
}

/// Window notifications, already translated out of their native encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The window is being created; delivered before creation returns.
    Create,
    /// The window is being destroyed.
    Destroy,
    /// Ask the pump loop to end.
    Quit,
    /// Drain the pump's command queue.
    Wake,
    /// A raw input packet arrived.
    Input(RawEventEnvelope),
    /// A device was attached or removed.
    DeviceChange,
    /// Anything else, passed through untouched.
    Other { id: u32, wparam: usize, lparam: isize },
}

/// Whether a handler fully processed a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Processed; the platform default must not run.
    Yes,
    /// Fall through to the platform default.
    No,
}

/// Per-window message behaviour.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, window: WindowId, message: &Message) -> Handled;
}

type Routes = HashMap<WindowToken, Weak<dyn MessageHandler>>;

static ROUTES: Lazy<ArcSwap<Routes>> = Lazy::new(|| ArcSwap::from_pointee(HashMap::new()));

/// Associate a token with its handler. The table only holds a weak reference.
pub fn register(token: WindowToken, handler: Weak<dyn MessageHandler>) {
    ROUTES.rcu(|routes| {
        let mut next = Routes::clone(routes);
        next.insert(token, handler.clone());
        next
    });
}

pub fn unregister(token: WindowToken) {
    ROUTES.rcu(|routes| {
        let mut next = Routes::clone(routes);
        next.remove(&token);
        next
    });
}

/// Dispatch one message to the handler registered for `token`.
pub fn route(token: WindowToken, window: WindowId, message: &Message) -> Handled {
    let handler = ROUTES.load().get(&token).and_then(Weak::upgrade);
    match handler {
        Some(handler) => handler.handle(window, message),
        None => {
            trace!(?token, ?message, "No live handler for window");
            Handled::No
        }
    }
}

/// Number of windows currently routed.
pub fn route_count() -> usize {
    ROUTES.load().len()
}

pub(crate) fn register_arc<H: MessageHandler + 'static>(token: WindowToken, handler: &Arc<H>) {
    let weak: Weak<H> = Arc::downgrade(handler);
    register(token, weak);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    impl MessageHandler for Counter {
        fn handle(&self, _window: WindowId, message: &Message) -> Handled {
            self.0.fetch_add(1, Ordering::SeqCst);
            if *message == Message::Wake {
                Handled::Yes
            } else {
                Handled::No
            }
        }
    }

    #[test]
    fn test_token_raw_conversion() {
        let token = WindowToken::next();
        assert_eq!(WindowToken::from_raw(token.into_raw()), Some(token));
        assert_eq!(WindowToken::from_raw(0), None);
        assert_ne!(WindowToken::next(), token);
    }

    #[test]
    fn test_route_to_registered_handler() {
        let token = WindowToken::next();
        let handler = Arc::new(Counter(AtomicUsize::new(0)));
        register_arc(token, &handler);

        assert_eq!(route(token, WindowId(1), &Message::Wake), Handled::Yes);
        assert_eq!(route(token, WindowId(1), &Message::DeviceChange), Handled::No);
        assert_eq!(handler.0.load(Ordering::SeqCst), 2);

        unregister(token);
        assert_eq!(route(token, WindowId(1), &Message::Wake), Handled::No);
        assert_eq!(handler.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_handler_falls_through() {
        let token = WindowToken::next();
        let handler = Arc::new(Counter(AtomicUsize::new(0)));
        register_arc(token, &handler);
        drop(handler);

        assert_eq!(route(token, WindowId(1), &Message::Wake), Handled::No);
        unregister(token);
    }
}
