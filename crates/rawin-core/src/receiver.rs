//! The public receiver: owns a pump host, the subscriber registry and the
//! device metadata cache, and turns window messages into subscriber calls.

use crate::cache::DeviceMetadataCache;
use crate::config::ReceiverConfig;
use crate::decoder;
use crate::device::{DeviceClass, DeviceScope};
use crate::error::{PumpFault, ReceiverResult};
use crate::event::{InputEvent, KeyboardEvent, MouseEvent, RawEventEnvelope};
use crate::gateway::{Handled, Message, MessageHandler, WindowId};
use crate::platform::Platform;
use crate::pump::PumpHost;
use crate::subscription::{SubscriptionId, SubscriptionRegistry, Subscribers};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Message handling of the receiver's window.
struct InputWindow<P: Platform> {
    platform: Arc<P>,
    scope: DeviceScope,
    subscribers: Arc<Subscribers>,
    cache: Arc<DeviceMetadataCache>,
}

impl<P: Platform> InputWindow<P> {
    fn on_input(&self, envelope: &RawEventEnvelope) {
        if !self.scope.includes(envelope.class) || !self.subscribers.has_any(envelope.class) {
            trace!(class = ?envelope.class, "Ignoring input without subscribers");
            return;
        }
        let platform = self.platform.as_ref();
        let event = decoder::decode(
            envelope,
            |handle| self.cache.resolve(handle, platform),
            platform,
            platform,
        );
        match event {
            Some(InputEvent::Mouse(event)) => {
                self.subscribers.mouse.dispatch(&event);
            }
            Some(InputEvent::Keyboard(event)) => {
                self.subscribers.keyboard.dispatch(&event);
            }
            None => {}
        }
    }

    fn on_device_change(&self) {
        let attached = self.platform.attached_devices();
        let removed = self.cache.invalidate_removed(&attached);
        debug!(attached = attached.len(), removed = removed.len(), "Device change");
    }
}

impl<P: Platform> MessageHandler for InputWindow<P> {
    fn handle(&self, _window: WindowId, message: &Message) -> Handled {
        match message {
            Message::Input(envelope) => self.on_input(envelope),
            Message::DeviceChange => self.on_device_change(),
            _ => {}
        }
        // Input messages still need the platform default for cleanup.
        Handled::No
    }
}

/// Receives raw mouse and keyboard input on a dedicated thread and delivers
/// decoded events to subscribers.
///
/// Callbacks run on the pump thread, in subscription order, and must not
/// block it for long.
pub struct RawInputReceiver<P: Platform> {
    config: ReceiverConfig,
    cache: Arc<DeviceMetadataCache>,
    registry: SubscriptionRegistry<P>,
    host: PumpHost<P>,
}

impl<P: Platform> RawInputReceiver<P> {
    /// Create a receiver and start its pump thread.
    ///
    /// Fails with [`crate::ReceiverError::WindowUnavailable`] if the message
    /// window cannot be created.
    pub fn new(platform: Arc<P>, config: ReceiverConfig) -> ReceiverResult<Self> {
        let cache = Arc::new(DeviceMetadataCache::new());
        if config.prime_cache {
            cache.prime(platform.as_ref());
        }

        let subscribers = Arc::new(Subscribers::default());
        let window = Arc::new(InputWindow {
            platform: Arc::clone(&platform),
            scope: config.scope,
            subscribers: Arc::clone(&subscribers),
            cache: Arc::clone(&cache),
        });
        let host = PumpHost::with_handler(Arc::clone(&platform), config.dispose_timeout(), window);
        let registry =
            SubscriptionRegistry::new(platform, config.scope, config.registration, subscribers);

        host.start()?;
        info!(scope = ?config.scope, "Raw input receiver started");

        Ok(Self {
            config,
            cache,
            registry,
            host,
        })
    }

    pub fn subscribe_mouse<F>(&self, callback: F) -> ReceiverResult<SubscriptionId>
    where
        F: Fn(&MouseEvent) + Send + Sync + 'static,
    {
        self.registry.subscribe_mouse(&self.host, Arc::new(callback))
    }

    pub fn subscribe_keyboard<F>(&self, callback: F) -> ReceiverResult<SubscriptionId>
    where
        F: Fn(&KeyboardEvent) + Send + Sync + 'static,
    {
        self.registry.subscribe_keyboard(&self.host, Arc::new(callback))
    }

    /// Returns `false` if `id` is not a current mouse subscription.
    pub fn unsubscribe_mouse(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(&self.host, DeviceClass::Mouse, id)
    }

    /// Returns `false` if `id` is not a current keyboard subscription.
    pub fn unsubscribe_keyboard(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(&self.host, DeviceClass::Keyboard, id)
    }

    /// Drop all subscribers, unregister raw input and stop the pump thread.
    ///
    /// Idempotent. Safe to call from a subscriber callback.
    pub fn dispose(&self) {
        if !self.registry.dispose_all(&self.host) {
            return;
        }
        self.host.dispose();
        info!("Raw input receiver disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn scope(&self) -> DeviceScope {
        self.config.scope
    }

    /// Current `(mouse, keyboard)` subscriber counts.
    pub fn subscriber_counts(&self) -> (usize, usize) {
        let subscribers = self.registry.subscribers();
        (subscribers.mouse.len(), subscribers.keyboard.len())
    }

    /// Whether `class` is currently registered for raw input.
    pub fn is_registered(&self, class: DeviceClass) -> bool {
        self.registry.is_registered(class)
    }

    pub fn cache(&self) -> &DeviceMetadataCache {
        &self.cache
    }

    pub fn host(&self) -> &PumpHost<P> {
        &self.host
    }

    /// Most recent failure absorbed on the pump thread.
    pub fn last_fault(&self) -> Option<PumpFault> {
        self.host.last_fault()
    }
}

impl<P: Platform> Drop for RawInputReceiver<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{MousePayload, RI_KEY_BREAK, RI_KEY_E0, RI_MOUSE_LEFT_BUTTON_DOWN, RI_MOUSE_WHEEL};
    use crate::error::ReceiverError;
    use crate::event::{EdgeState, MouseOperation, VirtualKey};
    use crate::testing::{flush, FakePlatform, RegistrationCall};
    use crate::DeviceHandle;
    use std::sync::Mutex;
    use std::thread;

    fn receiver(config: ReceiverConfig) -> (Arc<FakePlatform>, RawInputReceiver<FakePlatform>) {
        let platform = Arc::new(FakePlatform::new());
        platform.attach(0x10, "Office Keyboard", "Contoso");
        platform.attach(0x20, "Gaming Mouse", "Fabrikam");
        let receiver = RawInputReceiver::new(Arc::clone(&platform), config).unwrap();
        (platform, receiver)
    }

    fn collect_keys(
        receiver: &RawInputReceiver<FakePlatform>,
    ) -> (SubscriptionId, Arc<Mutex<Vec<KeyboardEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let id = receiver
            .subscribe_keyboard(move |event| sink.lock().unwrap().push(event.clone()))
            .unwrap();
        (id, events)
    }

    fn collect_mouse(
        receiver: &RawInputReceiver<FakePlatform>,
    ) -> (SubscriptionId, Arc<Mutex<Vec<MouseEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let id = receiver
            .subscribe_mouse(move |event| sink.lock().unwrap().push(event.clone()))
            .unwrap();
        (id, events)
    }

    #[test]
    fn test_extended_control_is_right_control() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let (_, events) = collect_keys(&receiver);

        platform.inject_keyboard(DeviceHandle(0x10), 0x1D, RI_KEY_E0, 0x11).unwrap();
        flush(receiver.host()).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].virtual_key, VirtualKey::RIGHT_CONTROL);
        assert_eq!(events[0].edge, EdgeState::Pressed);
        assert_eq!(events[0].metadata.product_name, "Office Keyboard");
        assert_eq!(events[0].metadata.manufacturer, "Contoso");
    }

    #[test]
    fn test_plain_control_is_left_control() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let (_, events) = collect_keys(&receiver);

        platform.inject_keyboard(DeviceHandle(0x10), 0x1D, 0, 0x11).unwrap();
        platform.inject_keyboard(DeviceHandle(0x10), 0x1D, RI_KEY_BREAK, 0x11).unwrap();
        flush(receiver.host()).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].virtual_key, VirtualKey::LEFT_CONTROL);
        assert_eq!(events[0].edge, EdgeState::Pressed);
        assert_eq!(events[1].edge, EdgeState::Released);
    }

    #[test]
    fn test_button_wins_over_wheel_in_one_packet() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let (_, events) = collect_mouse(&receiver);

        let payload = MousePayload {
            button_flags: RI_MOUSE_LEFT_BUTTON_DOWN | RI_MOUSE_WHEEL,
            button_data: 120,
            ..MousePayload::default()
        };
        platform.inject_mouse(DeviceHandle(0x20), payload).unwrap();
        flush(receiver.host()).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].operation, MouseOperation::ButtonLeft);
        assert_eq!(events[0].edge, Some(EdgeState::Pressed));
        assert_eq!(events[0].wheel_delta, 0);
        assert_eq!(events[0].metadata.product_name, "Gaming Mouse");
    }

    #[test]
    fn test_device_removal_evicts_cached_metadata() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let (_, events) = collect_keys(&receiver);
        let keyboard = DeviceHandle(0x10);
        assert!(receiver.cache().contains(keyboard));
        let lookups = platform.lookups();

        platform.detach(keyboard);
        platform.device_change().unwrap();
        flush(receiver.host()).unwrap();
        assert!(!receiver.cache().contains(keyboard));
        assert!(receiver.cache().contains(DeviceHandle(0x20)));

        platform.attach(0x10, "Replacement Keyboard", "Contoso");
        platform.inject_keyboard(keyboard, 0x1E, 0, 0x41).unwrap();
        flush(receiver.host()).unwrap();

        assert_eq!(platform.lookups(), lookups + 1);
        assert_eq!(
            events.lock().unwrap()[0].metadata.product_name,
            "Replacement Keyboard"
        );
    }

    #[test]
    fn test_overrun_never_reaches_subscribers() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let (_, events) = collect_keys(&receiver);

        platform.inject_keyboard(DeviceHandle(0x10), 0xFF, 0, 0xFF).unwrap();
        platform.inject_keyboard(DeviceHandle(0x10), 0x00, 0, 0xFF).unwrap();
        flush(receiver.host()).unwrap();

        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_device_gets_empty_metadata() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let (_, events) = collect_keys(&receiver);

        platform.inject_keyboard(DeviceHandle(0x99), 0x1E, 0, 0x41).unwrap();
        flush(receiver.host()).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].metadata.is_empty());
    }

    #[test]
    fn test_first_and_last_subscriber_drive_registration() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let (first, _) = collect_keys(&receiver);
        let (second, _) = collect_keys(&receiver);
        flush(receiver.host()).unwrap();
        assert!(receiver.is_registered(DeviceClass::Keyboard));
        assert!(!receiver.is_registered(DeviceClass::Mouse));

        assert!(receiver.unsubscribe_keyboard(first));
        flush(receiver.host()).unwrap();
        assert!(receiver.is_registered(DeviceClass::Keyboard));

        assert!(receiver.unsubscribe_keyboard(second));
        assert!(!receiver.unsubscribe_keyboard(second));
        flush(receiver.host()).unwrap();
        assert!(!receiver.is_registered(DeviceClass::Keyboard));

        let window = receiver.host().window().unwrap();
        assert_eq!(
            platform.registration_calls(),
            vec![
                RegistrationCall::Register {
                    class: DeviceClass::Keyboard,
                    window,
                    options: receiver.config().registration,
                },
                RegistrationCall::Unregister {
                    class: DeviceClass::Keyboard
                },
            ]
        );
    }

    #[test]
    fn test_concurrent_subscriptions_keep_registration_consistent() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let receiver = Arc::new(receiver);

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let id = receiver.subscribe_mouse(|_| {}).unwrap();
                        assert!(receiver.unsubscribe_mouse(id));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        flush(receiver.host()).unwrap();

        let calls = platform.registration_calls();
        for pair in calls.windows(2) {
            assert_ne!(
                matches!(pair[0], RegistrationCall::Register { .. }),
                matches!(pair[1], RegistrationCall::Register { .. }),
                "registration calls must alternate: {calls:?}"
            );
        }
        if let Some(first) = calls.first() {
            assert!(matches!(first, RegistrationCall::Register { .. }));
        }
        if let Some(last) = calls.last() {
            assert!(matches!(last, RegistrationCall::Unregister { .. }));
        }
        assert!(!receiver.is_registered(DeviceClass::Mouse));
        assert_eq!(receiver.subscriber_counts(), (0, 0));
    }

    #[test]
    fn test_registration_failure_keeps_subscription() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_registration(true);
        let receiver = RawInputReceiver::new(Arc::clone(&platform), ReceiverConfig::default()).unwrap();

        let (_, events) = collect_keys(&receiver);
        flush(receiver.host()).unwrap();
        assert!(!receiver.is_registered(DeviceClass::Keyboard));
        assert_eq!(receiver.subscriber_counts(), (0, 1));

        platform.inject_keyboard(DeviceHandle(1), 0x1E, 0, 0x41).unwrap();
        flush(receiver.host()).unwrap();
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_changes_queued_behind_busy_pump_are_coalesced() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let (entered_tx, entered_rx) = crossbeam_channel::bounded::<()>(1);
        let busy = receiver
            .host()
            .invoke(move |_| {
                let _ = entered_tx.send(());
                let _ = release_rx.recv();
                Ok(())
            })
            .unwrap();
        entered_rx.recv().unwrap();

        // 0 -> 1 -> 0 while the pump cannot act: nothing to register.
        let id = receiver.subscribe_mouse(|_| {}).unwrap();
        assert!(receiver.unsubscribe_mouse(id));
        // 0 -> 1 -> 0 -> 1: one registration for the final state.
        let first = receiver.subscribe_keyboard(|_| {}).unwrap();
        assert!(receiver.unsubscribe_keyboard(first));
        receiver.subscribe_keyboard(|_| {}).unwrap();

        release_tx.send(()).unwrap();
        busy.wait().unwrap();
        flush(receiver.host()).unwrap();

        assert_eq!(
            platform.registration_calls(),
            vec![RegistrationCall::Register {
                class: DeviceClass::Keyboard,
                window: receiver.host().window().unwrap(),
                options: receiver.config().registration,
            }]
        );
        assert!(!receiver.is_registered(DeviceClass::Mouse));
        assert!(receiver.is_registered(DeviceClass::Keyboard));
    }

    #[test]
    fn test_dispose_skips_classes_that_never_registered() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_registration(true);
        let receiver = RawInputReceiver::new(Arc::clone(&platform), ReceiverConfig::default()).unwrap();
        collect_keys(&receiver);
        flush(receiver.host()).unwrap();
        platform.fail_registration(false);

        receiver.dispose();

        assert!(receiver.is_disposed());
        assert!(platform.registration_calls().is_empty());
    }

    #[test]
    fn test_scope_limits_subscriptions() {
        let (_platform, receiver) = receiver(ReceiverConfig::with_scope(DeviceScope::Keyboard));

        assert!(matches!(
            receiver.subscribe_mouse(|_| {}),
            Err(ReceiverError::ClassNotEnabled(DeviceClass::Mouse))
        ));
        assert!(receiver.subscribe_keyboard(|_| {}).is_ok());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        collect_keys(&receiver);
        collect_mouse(&receiver);
        flush(receiver.host()).unwrap();
        platform.clear_registration_calls();

        receiver.dispose();
        receiver.dispose();

        assert!(receiver.is_disposed());
        assert_eq!(receiver.subscriber_counts(), (0, 0));
        assert_eq!(
            platform.registration_calls(),
            vec![
                RegistrationCall::Unregister {
                    class: DeviceClass::Mouse
                },
                RegistrationCall::Unregister {
                    class: DeviceClass::Keyboard
                },
            ]
        );
        assert!(matches!(
            receiver.subscribe_keyboard(|_| {}),
            Err(ReceiverError::Disposed)
        ));
        assert!(!receiver.host().is_running());
    }

    #[test]
    fn test_dispose_from_callback() {
        let (platform, receiver) = receiver(ReceiverConfig::default());
        let receiver = Arc::new(receiver);
        let weak = Arc::downgrade(&receiver);
        receiver
            .subscribe_keyboard(move |_| {
                if let Some(receiver) = weak.upgrade() {
                    receiver.dispose();
                }
            })
            .unwrap();
        flush(receiver.host()).unwrap();

        platform.inject_keyboard(DeviceHandle(0x10), 0x1E, 0, 0x41).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while receiver.host().is_running() && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(receiver.is_disposed());
        assert!(!receiver.host().is_running());
    }

    #[test]
    fn test_input_without_subscribers_is_not_decoded() {
        let config = ReceiverConfig {
            prime_cache: false,
            ..ReceiverConfig::default()
        };
        let (platform, receiver) = receiver(config);
        collect_keys(&receiver);

        platform.inject_mouse(DeviceHandle(0x20), MousePayload::default()).unwrap();
        flush(receiver.host()).unwrap();

        assert_eq!(platform.lookups(), 0);
        assert!(receiver.cache().is_empty());
    }

    #[test]
    fn test_window_creation_failure() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_window_creation(true);

        let result = RawInputReceiver::new(platform, ReceiverConfig::default());
        assert!(matches!(
            result,
            Err(ReceiverError::WindowUnavailable(PumpFault::WindowCreation(_)))
        ));
    }
}
