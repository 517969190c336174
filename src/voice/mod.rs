//! Voice SDK integration
//!
//! The vendor voice client is reached through the `VendorDevice` and
//! `VendorCall` traits. `DeviceAdapter` wraps a vendor device and turns its
//! event emitter into typed listener sets.
//! Features:
//! - Registration lifecycle events (registered, registering, unregistered)
//! - Incoming call notification
//! - Automatic token refresh before expiry
//! - Busy/state queries normalized to a small set of values

mod call;
mod device;
mod listeners;
#[cfg(target_arch = "wasm32")]
pub mod twilio;
#[cfg(test)]
pub(crate) mod testing;

pub use call::CallHandle;
pub use device::{DeviceAdapter, TokenSource};
pub use listeners::{ListenerSet, Subscription};

use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;

use crate::error::SoftphoneError;

/// Parameters forwarded to the vendor when placing a call (e.g. `To`)
pub type CallParams = BTreeMap<String, String>;

/// Runs a detached future on the UI event loop
pub type LocalSpawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// Device registration state as reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
}

impl RegistrationState {
    /// Unknown vendor values are treated as disconnected.
    pub fn from_vendor(state: &str) -> Self {
        match state {
            "registered" => RegistrationState::Registered,
            "registering" => RegistrationState::Registering,
            _ => RegistrationState::Unregistered,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Unregistered => "unregistered",
            RegistrationState::Registering => "registering",
            RegistrationState::Registered => "registered",
        }
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor SDK log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    #[default]
    Error,
    Silent,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "silent",
        }
    }
}

/// Preferred media codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Opus,
    Pcmu,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Opus => "opus",
            Codec::Pcmu => "pcmu",
        }
    }
}

/// Options passed to the vendor device constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOptions {
    pub log_level: LogLevel,
    pub codec_preferences: Vec<Codec>,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        DeviceOptions {
            log_level: LogLevel::Error,
            codec_preferences: vec![Codec::Opus, Codec::Pcmu],
        }
    }
}

/// Events emitted by a vendor device
pub enum DeviceEvent {
    Registered,
    Registering,
    Unregistered,
    Incoming(Rc<dyn VendorCall>),
    TokenWillExpire,
    Error(String),
}

impl std::fmt::Debug for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::Registered => write!(f, "Registered"),
            DeviceEvent::Registering => write!(f, "Registering"),
            DeviceEvent::Unregistered => write!(f, "Unregistered"),
            DeviceEvent::Incoming(_) => write!(f, "Incoming"),
            DeviceEvent::TokenWillExpire => write!(f, "TokenWillExpire"),
            DeviceEvent::Error(msg) => write!(f, "Error({})", msg),
        }
    }
}

/// Events emitted by a vendor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Accept,
    Mute,
    Unmute,
    Disconnect,
    Cancel,
    Reject,
    Error(String),
}

/// The vendor device surface consumed by `DeviceAdapter`
#[async_trait(?Send)]
pub trait VendorDevice {
    async fn register(&self) -> Result<(), SoftphoneError>;

    async fn unregister(&self) -> Result<(), SoftphoneError>;

    /// `None` when the vendor refuses to place the call.
    fn connect(&self, params: Option<&CallParams>) -> Option<Rc<dyn VendorCall>>;

    fn disconnect_all(&self);

    /// Raw vendor state string.
    fn state(&self) -> String;

    fn is_busy(&self) -> Result<bool, SoftphoneError>;

    async fn update_token(&self, token: &str) -> Result<(), SoftphoneError>;

    fn destroy(&self);

    /// Install the single handler that receives every device event.
    fn set_event_handler(&self, handler: Rc<dyn Fn(DeviceEvent)>);
}

/// The vendor call surface
pub trait VendorCall {
    fn accept(&self);

    fn reject(&self);

    fn disconnect(&self);

    fn mute(&self, muted: bool);

    fn is_muted(&self) -> bool;

    /// Call parameter such as `From` or `To`.
    fn parameter(&self, key: &str) -> Option<String>;

    /// Listeners stay attached for the lifetime of the call.
    fn on_event(&self, listener: Rc<dyn Fn(&CallEvent)>);
}

/// Constructs vendor devices
pub trait VoiceBackend {
    fn create_device(&self, token: &str, options: &DeviceOptions) -> Result<Rc<dyn VendorDevice>, SoftphoneError>;
}

/// Backend for builds without the browser voice SDK.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

#[cfg(not(target_arch = "wasm32"))]
impl VoiceBackend for UnsupportedBackend {
    fn create_device(&self, _token: &str, _options: &DeviceOptions) -> Result<Rc<dyn VendorDevice>, SoftphoneError> {
        Err(SoftphoneError::DeviceOperation(
            "voice SDK is only available in the browser build".to_string(),
        ))
    }
}

/// Backend used by the running application.
pub fn default_backend() -> Rc<dyn VoiceBackend> {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(twilio::TwilioBackend)
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Rc::new(UnsupportedBackend)
    }
}

/// Spawner for detached futures on the current event loop.
pub fn default_spawner() -> LocalSpawner {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(|fut: LocalBoxFuture<'static, ()>| wasm_bindgen_futures::spawn_local(fut))
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Rc::new(|fut: LocalBoxFuture<'static, ()>| {
            let _ = dioxus::core::spawn_forever(fut);
        })
    }
}
