//! Device adapter
//!
//! Wraps a vendor device, fans its events out to typed listener sets and
//! keeps its access token fresh.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use super::listeners::{ListenerSet, Subscription};
use super::{
    CallHandle, CallParams, DeviceEvent, DeviceOptions, LocalSpawner, RegistrationState, VendorDevice,
    VoiceBackend,
};
use crate::error::SoftphoneError;

/// Produces a fresh access token for the identity the device was built for
pub type TokenSource = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<String, SoftphoneError>>>;

#[derive(Default)]
struct DeviceListeners {
    incoming: ListenerSet<CallHandle>,
    registered: ListenerSet<()>,
    registering: ListenerSet<()>,
    unregistered: ListenerSet<()>,
    error: ListenerSet<SoftphoneError>,
}

impl DeviceListeners {
    fn clear(&self) {
        self.incoming.clear();
        self.registered.clear();
        self.registering.clear();
        self.unregistered.clear();
        self.error.clear();
    }
}

struct Shared {
    listeners: DeviceListeners,
    destroyed: Cell<bool>,
}

pub struct DeviceAdapter {
    device: Rc<dyn VendorDevice>,
    shared: Rc<Shared>,
}

impl DeviceAdapter {
    /// Build the vendor device from an already fetched token and wire up
    /// its events.
    ///
    /// `token_source` is kept for refreshing the token later.
    pub fn create(
        backend: &dyn VoiceBackend,
        token: &str,
        token_source: TokenSource,
        options: DeviceOptions,
        spawner: LocalSpawner,
    ) -> Result<Self, SoftphoneError> {
        let device = backend.create_device(token, &options)?;

        let shared = Rc::new(Shared {
            listeners: DeviceListeners::default(),
            destroyed: Cell::new(false),
        });

        let weak_shared = Rc::downgrade(&shared);
        let weak_device = Rc::downgrade(&device);
        device.set_event_handler(Rc::new(move |event: DeviceEvent| {
            let Some(shared) = weak_shared.upgrade() else {
                return;
            };
            if shared.destroyed.get() {
                return;
            }

            match event {
                DeviceEvent::Registered => shared.listeners.registered.notify(&()),
                DeviceEvent::Registering => shared.listeners.registering.notify(&()),
                DeviceEvent::Unregistered => shared.listeners.unregistered.notify(&()),
                DeviceEvent::Incoming(call) => shared.listeners.incoming.notify(&CallHandle::new(call)),
                DeviceEvent::TokenWillExpire => {
                    tracing::info!("Voice token about to expire, refreshing");
                    spawner(
                        refresh_token(weak_device.clone(), Rc::downgrade(&shared), token_source.clone())
                            .boxed_local(),
                    );
                }
                DeviceEvent::Error(message) => {
                    tracing::error!("Voice device error: {}", message);
                    shared.listeners.error.notify(&SoftphoneError::DeviceOperation(message));
                }
            }
        }));

        Ok(DeviceAdapter { device, shared })
    }

    fn ensure_live(&self) -> Result<(), SoftphoneError> {
        if self.shared.destroyed.get() {
            Err(SoftphoneError::DeviceOperation("device destroyed".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn register(&self) -> Result<(), SoftphoneError> {
        self.ensure_live()?;
        self.device.register().await
    }

    pub async fn unregister(&self) -> Result<(), SoftphoneError> {
        self.ensure_live()?;
        self.device.unregister().await
    }

    /// Place a call. `None` means the vendor refused (e.g. already busy).
    pub fn connect(&self, params: Option<&CallParams>) -> Option<CallHandle> {
        if self.shared.destroyed.get() {
            return None;
        }
        self.device.connect(params).map(CallHandle::new)
    }

    pub fn disconnect_all(&self) {
        if !self.shared.destroyed.get() {
            self.device.disconnect_all();
        }
    }

    pub fn state(&self) -> RegistrationState {
        if self.shared.destroyed.get() {
            return RegistrationState::Unregistered;
        }
        RegistrationState::from_vendor(&self.device.state())
    }

    /// Fails open: a vendor error reads as "not busy".
    pub fn is_busy(&self) -> bool {
        if self.shared.destroyed.get() {
            return false;
        }
        match self.device.is_busy() {
            Ok(busy) => busy,
            Err(e) => {
                tracing::warn!("Could not read busy state, assuming idle: {}", e);
                false
            }
        }
    }

    pub fn on_incoming(&self, listener: impl Fn(&CallHandle) + 'static) -> Subscription {
        self.shared.listeners.incoming.subscribe(listener)
    }

    pub fn on_registered(&self, listener: impl Fn() + 'static) -> Subscription {
        self.shared.listeners.registered.subscribe(move |_| listener())
    }

    pub fn on_registering(&self, listener: impl Fn() + 'static) -> Subscription {
        self.shared.listeners.registering.subscribe(move |_| listener())
    }

    pub fn on_unregistered(&self, listener: impl Fn() + 'static) -> Subscription {
        self.shared.listeners.unregistered.subscribe(move |_| listener())
    }

    pub fn on_error(&self, listener: impl Fn(&SoftphoneError) + 'static) -> Subscription {
        self.shared.listeners.error.subscribe(listener)
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.get()
    }

    /// Tear down the vendor device and drop every listener.
    pub fn destroy(&self) {
        if self.shared.destroyed.replace(true) {
            return;
        }
        self.shared.listeners.clear();
        self.device.destroy();
        tracing::info!("Voice device destroyed");
    }
}

async fn refresh_token(device: Weak<dyn VendorDevice>, shared: Weak<Shared>, token_source: TokenSource) {
    let result = match token_source().await {
        Ok(token) => match device.upgrade() {
            Some(device) if !is_destroyed(&shared) => device.update_token(&token).await,
            _ => return,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => tracing::info!("Voice token refreshed"),
        Err(err) => {
            // The device keeps running on its previous token
            tracing::error!("Error refreshing voice token: {}", err);
            if let Some(shared) = shared.upgrade() {
                shared.listeners.error.notify(&err);
            }
        }
    }
}

fn is_destroyed(shared: &Weak<Shared>) -> bool {
    shared.upgrade().map(|s| s.destroyed.get()).unwrap_or(true)
}
