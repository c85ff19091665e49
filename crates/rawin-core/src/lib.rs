//! rawin-core: per-device raw input receiver engine.
//!
//! Design goal: keep this crate platform-agnostic. Everything native (message
//! window, raw input registration, device enumeration) sits behind the traits
//! in [`platform`] and is implemented in `rawin-platform`.
//!
//! ## Module Structure
//!
//! - `pump` - Dedicated message pump thread with a command queue
//! - `gateway` - Routing from the static window procedure to window handlers
//! - `subscription` - Lock-free subscriber lists and raw input registration
//! - `cache` - Device metadata cache
//! - `decoder` - `RAWMOUSE`/`RAWKEYBOARD` decoding
//! - `receiver` - The public receiver facade
//! - `testing` - In-memory platform

mod cache;
mod config;
pub mod decoder;
mod device;
mod error;
mod event;
pub mod gateway;
pub mod platform;
mod pump;
mod receiver;
mod subscription;
pub mod testing;

pub use cache::DeviceMetadataCache;
pub use config::{ConfigError, ReceiverConfig, RegistrationOptions};
pub use device::{
    device_instance_id, DeviceClass, DeviceHandle, DeviceMetadata, DevicePathInfo, DeviceScope,
};
pub use error::{
    PlatformError, PlatformResult, PumpFault, ReceiverError, ReceiverResult, ScaleError,
};
pub use event::{
    EdgeState, InputEvent, KeyboardEvent, MouseEvent, MouseOperation, PositionMode,
    RawEventEnvelope, RawPayload, VirtualKey,
};
pub use gateway::{route, Handled, Message, MessageHandler, WindowId, WindowToken};
pub use platform::{
    DeviceDirectory, KeyMapper, MessageWindowHost, Platform, PumpStatus, RawInputRegistrar,
    ScreenMetrics, ScreenRect,
};
pub use pump::{Completion, PumpHost};
pub use receiver::RawInputReceiver;
pub use subscription::{Callback, SubscriberList, SubscriptionId, SubscriptionRegistry, Subscribers};
