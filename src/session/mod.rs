//! Session controller
//!
//! Owns the call state shown in the UI (status, identity, active and incoming
//! calls, mute/busy flags, last error) and mediates between the UI and the
//! device adapter. All state lives on the UI thread; vendor callbacks hold
//! weak references so dropping the controller releases the device.

mod status;

pub use status::{ConnectionStatus, SessionSnapshot};

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::FutureExt;

use crate::api::TokenFetcher;
use crate::error::SoftphoneError;
use crate::voice::{
    CallEvent, CallHandle, CallParams, DeviceAdapter, DeviceOptions, ListenerSet, LocalSpawner, Subscription,
    TokenSource, VoiceBackend,
};

#[derive(Debug, Clone, Default)]
struct SessionState {
    /// Registration side of the status; `InCall` is derived from `active_call`
    link: ConnectionStatus,
    identity: Option<String>,
    active_call: Option<CallHandle>,
    incoming_call: Option<CallHandle>,
    muted: bool,
    busy: bool,
    error: Option<String>,
}

impl SessionState {
    fn status(&self) -> ConnectionStatus {
        if self.active_call.is_some() {
            ConnectionStatus::InCall
        } else {
            self.link
        }
    }

    fn clear_calls(&mut self) {
        self.active_call = None;
        self.incoming_call = None;
        self.muted = false;
        self.busy = false;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(),
            identity: self.identity.clone(),
            has_active_call: self.active_call.is_some(),
            has_incoming_call: self.incoming_call.is_some(),
            incoming_caller: self.incoming_call.as_ref().and_then(CallHandle::caller),
            muted: self.muted,
            busy: self.busy,
            error: self.error.clone(),
        }
    }
}

struct Inner {
    backend: Rc<dyn VoiceBackend>,
    tokens: Rc<dyn TokenFetcher>,
    spawner: LocalSpawner,
    options: DeviceOptions,
    state: RefCell<SessionState>,
    device: RefCell<Option<Rc<DeviceAdapter>>>,
    device_subscriptions: RefCell<Vec<Subscription>>,
    /// Bumped by every connect/disconnect; stale completions compare against it
    generation: Cell<u64>,
    observers: ListenerSet<SessionSnapshot>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.device_subscriptions.get_mut().clear();
        if let Some(device) = self.device.get_mut().take() {
            device.destroy();
        }
    }
}

/// Cheap to clone; every clone drives the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Rc<Inner>,
}

impl SessionController {
    pub fn new(backend: Rc<dyn VoiceBackend>, tokens: Rc<dyn TokenFetcher>, spawner: LocalSpawner) -> Self {
        Self::with_options(backend, tokens, spawner, DeviceOptions::default())
    }

    pub fn with_options(
        backend: Rc<dyn VoiceBackend>,
        tokens: Rc<dyn TokenFetcher>,
        spawner: LocalSpawner,
        options: DeviceOptions,
    ) -> Self {
        SessionController {
            inner: Rc::new(Inner {
                backend,
                tokens,
                spawner,
                options,
                state: RefCell::new(SessionState::default()),
                device: RefCell::new(None),
                device_subscriptions: RefCell::new(Vec::new()),
                generation: Cell::new(0),
                observers: ListenerSet::new(),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| SessionController { inner })
    }

    // ==================== Queries ====================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().snapshot()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.borrow().status()
    }

    pub fn identity(&self) -> Option<String> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn active_call(&self) -> Option<CallHandle> {
        self.inner.state.borrow().active_call.clone()
    }

    pub fn incoming_call(&self) -> Option<CallHandle> {
        self.inner.state.borrow().incoming_call.clone()
    }

    pub fn is_muted(&self) -> bool {
        self.inner.state.borrow().muted
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.borrow().busy
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn has_device(&self) -> bool {
        self.inner.device.borrow().is_some()
    }

    /// Observe every state change.
    pub fn subscribe(&self, observer: impl Fn(&SessionSnapshot) + 'static) -> Subscription {
        self.inner.observers.subscribe(observer)
    }

    // ==================== Connection ====================

    /// Replace any existing device with a new one registered as `identity`.
    ///
    /// Failures are recorded in the session (`status = error` plus a
    /// message) rather than returned.
    pub async fn connect(&self, identity: &str) {
        let generation = self.begin_operation();
        let identity = identity.to_string();

        self.update(|s| {
            s.error = None;
            s.identity = Some(identity.clone());
            s.link = ConnectionStatus::Registering;
        });
        self.teardown_device();
        tracing::info!("Connecting voice device as {}", identity);

        let token_source = self.token_source(&identity);
        let token = token_source().await;

        // Superseded: a newer connect/disconnect owns the device slot
        if !self.is_current(generation) {
            tracing::warn!("Connect for {} superseded, skipping device creation", identity);
            return;
        }

        let created = token.and_then(|token| {
            DeviceAdapter::create(
                self.inner.backend.as_ref(),
                &token,
                token_source,
                self.inner.options.clone(),
                self.inner.spawner.clone(),
            )
        });

        let device = match created {
            Ok(device) => Rc::new(device),
            Err(err) => {
                self.record_failure(err);
                return;
            }
        };
        self.install_device(device.clone());

        if let Err(err) = device.register().await {
            if self.is_current(generation) {
                self.record_failure(err);
            }
        }
    }

    /// Unregister and destroy the device.
    ///
    /// Cleanup runs whether or not the unregister succeeds; its failure is
    /// still returned once the session has been reset.
    pub async fn disconnect(&self) -> Result<(), SoftphoneError> {
        let generation = self.begin_operation();
        let device = self.current_device();

        let result = match &device {
            Some(device) => device.unregister().await,
            None => Ok(()),
        };
        if let Err(err) = &result {
            tracing::error!("Error unregistering voice device: {}", err);
        }

        if self.is_current(generation) {
            self.teardown_device();
            self.update(|s| s.link = ConnectionStatus::Unregistered);
            tracing::info!("Voice device disconnected");
        } else if let Some(device) = device {
            device.destroy();
        }

        result
    }

    // ==================== Calls ====================

    /// Place an outbound call to `destination`.
    pub fn call(&self, destination: &str) -> Result<(), SoftphoneError> {
        let device = self.current_device().ok_or(SoftphoneError::NotRegistered)?;
        self.update(|s| s.error = None);

        let to = destination.trim();
        if to.is_empty() {
            return Err(SoftphoneError::InvalidDestination);
        }

        let mut params = CallParams::new();
        params.insert("To".to_string(), to.to_string());

        let Some(call) = device.connect(Some(&params)) else {
            tracing::warn!("Vendor refused call to {}", to);
            return Err(SoftphoneError::DialFailed);
        };

        tracing::info!("Dialing {}", to);
        self.attach_call(call);
        Ok(())
    }

    /// End the active call, or every call on the device if none is tracked.
    pub fn hangup(&self) {
        match self.active_call() {
            Some(call) => call.disconnect(),
            None => {
                if let Some(device) = self.current_device() {
                    device.disconnect_all();
                }
            }
        }
    }

    pub fn mute(&self) {
        self.set_muted(true);
    }

    pub fn unmute(&self) {
        self.set_muted(false);
    }

    fn set_muted(&self, muted: bool) {
        let Some(call) = self.active_call() else {
            return;
        };
        call.mute(muted);
        self.update(|s| s.muted = muted);
    }

    /// Promotion to active happens on the call's `accept` event.
    pub fn accept_incoming(&self) {
        if let Some(call) = self.incoming_call() {
            call.accept();
        }
    }

    pub fn reject_incoming(&self) {
        let Some(call) = self.incoming_call() else {
            return;
        };
        call.reject();
        self.update(|s| s.incoming_call = None);
    }

    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    // ==================== Internals ====================

    fn begin_operation(&self) -> u64 {
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.get() == generation
    }

    fn current_device(&self) -> Option<Rc<DeviceAdapter>> {
        self.inner.device.borrow().clone()
    }

    /// Apply a mutation, then notify observers with no borrow held.
    fn update(&self, mutate: impl FnOnce(&mut SessionState)) {
        let snapshot = {
            let mut state = self.inner.state.borrow_mut();
            mutate(&mut state);
            state.snapshot()
        };
        self.inner.observers.notify(&snapshot);
    }

    fn record_failure(&self, err: SoftphoneError) {
        tracing::error!("Unable to connect voice device: {}", err);
        self.update(|s| {
            s.link = ConnectionStatus::Error;
            s.error = Some(err.to_string());
        });
    }

    fn token_source(&self, identity: &str) -> TokenSource {
        let tokens = self.inner.tokens.clone();
        let identity = identity.to_string();
        Rc::new(move || {
            let tokens = tokens.clone();
            let identity = identity.clone();
            async move { tokens.fetch_token(&identity).await }.boxed_local()
        })
    }

    /// Detach listeners, destroy the device and forget every call.
    fn teardown_device(&self) {
        let subscriptions = std::mem::take(&mut *self.inner.device_subscriptions.borrow_mut());
        drop(subscriptions);

        let device = self.inner.device.borrow_mut().take();
        if let Some(device) = device {
            device.destroy();
        }
        self.update(SessionState::clear_calls);
    }

    fn install_device(&self, device: Rc<DeviceAdapter>) {
        let weak = Rc::downgrade(&self.inner);

        let subscriptions = vec![
            device.on_registered({
                let weak = weak.clone();
                move || {
                    if let Some(ctl) = Self::from_weak(&weak) {
                        let busy = ctl.device_busy();
                        ctl.update(|s| {
                            s.link = ConnectionStatus::Registered;
                            s.busy = busy;
                        });
                        tracing::info!("Voice device registered");
                    }
                }
            }),
            device.on_registering({
                let weak = weak.clone();
                move || {
                    if let Some(ctl) = Self::from_weak(&weak) {
                        ctl.update(|s| s.link = ConnectionStatus::Registering);
                    }
                }
            }),
            device.on_unregistered({
                let weak = weak.clone();
                move || {
                    if let Some(ctl) = Self::from_weak(&weak) {
                        ctl.update(|s| {
                            s.link = ConnectionStatus::Unregistered;
                            s.clear_calls();
                        });
                        tracing::info!("Voice device unregistered");
                    }
                }
            }),
            device.on_incoming({
                let weak = weak.clone();
                move |call| {
                    if let Some(ctl) = Self::from_weak(&weak) {
                        ctl.update(|s| s.link = ConnectionStatus::Registered);
                        ctl.handle_incoming(call.clone());
                    }
                }
            }),
            device.on_error(move |err| {
                if let Some(ctl) = Self::from_weak(&weak) {
                    ctl.update(|s| {
                        s.error = Some(err.to_string());
                        s.link = ConnectionStatus::Error;
                    });
                }
            }),
        ];

        *self.inner.device_subscriptions.borrow_mut() = subscriptions;
        *self.inner.device.borrow_mut() = Some(device);
    }

    fn device_busy(&self) -> bool {
        self.current_device().map(|d| d.is_busy()).unwrap_or(false)
    }

    /// Track a call until it ends.
    ///
    /// Promotion to active runs at most once: immediately, and again (as a
    /// no-op) when the vendor reports `accept`.
    fn attach_call(&self, call: CallHandle) {
        let weak = Rc::downgrade(&self.inner);
        let weak_call = call.downgrade();
        let started = Rc::new(Cell::new(false));

        let start = {
            let weak = weak.clone();
            let weak_call = weak_call.clone();
            move || {
                if started.get() {
                    return;
                }
                let (Some(ctl), Some(call)) = (Self::from_weak(&weak), weak_call.upgrade()) else {
                    return;
                };
                started.set(true);

                let muted = call.is_muted();
                ctl.update(|s| {
                    s.incoming_call = None;
                    s.active_call = Some(call.clone());
                    s.busy = true;
                    s.muted = muted;
                });
                tracing::info!("Call active");
            }
        };
        start();

        call.on_event(move |event| {
            let (Some(ctl), Some(call)) = (Self::from_weak(&weak), weak_call.upgrade()) else {
                return;
            };
            match event {
                CallEvent::Accept => start(),
                CallEvent::Mute => ctl.update_if_active(&call, |s| s.muted = true),
                CallEvent::Unmute => ctl.update_if_active(&call, |s| s.muted = false),
                CallEvent::Disconnect | CallEvent::Cancel | CallEvent::Reject => ctl.end_call(&call),
                CallEvent::Error(message) => {
                    tracing::error!("Call error: {}", message);
                    let err = SoftphoneError::CallRuntime(message.clone());
                    ctl.update(|s| s.error = Some(err.to_string()));
                }
            }
        });
    }

    fn update_if_active(&self, call: &CallHandle, mutate: impl FnOnce(&mut SessionState)) {
        self.update(|s| {
            if s.active_call.as_ref() == Some(call) {
                mutate(s);
            }
        });
    }

    /// Busy and status are re-read from the live device, not cached.
    fn end_call(&self, call: &CallHandle) {
        let device = self.current_device();
        let busy = device.as_ref().map(|d| d.is_busy()).unwrap_or(false);
        let link = device
            .as_ref()
            .map(|d| ConnectionStatus::from(d.state()))
            .unwrap_or(ConnectionStatus::Unregistered);

        self.update_if_active(call, |s| {
            s.active_call = None;
            s.muted = false;
            s.busy = busy;
            s.link = link;
        });
        tracing::info!("Call ended");
    }

    fn handle_incoming(&self, call: CallHandle) {
        tracing::info!(
            "Incoming call from {}",
            call.caller().as_deref().unwrap_or("unknown caller")
        );
        self.update(|s| s.incoming_call = Some(call.clone()));

        let weak = Rc::downgrade(&self.inner);
        let weak_call = call.downgrade();
        call.on_event(move |event| {
            let (Some(ctl), Some(call)) = (Self::from_weak(&weak), weak_call.upgrade()) else {
                return;
            };
            match event {
                CallEvent::Cancel | CallEvent::Disconnect | CallEvent::Reject => ctl.update(|s| {
                    // Only clear if a newer incoming call has not replaced this one
                    if s.incoming_call.as_ref() == Some(&call) {
                        s.incoming_call = None;
                    }
                }),
                CallEvent::Accept => ctl.attach_call(call),
                _ => {}
            }
        });
    }
}
