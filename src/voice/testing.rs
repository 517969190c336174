//! In-memory vendor doubles for unit tests

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;

use super::{CallEvent, CallParams, DeviceEvent, DeviceOptions, LocalSpawner, VendorCall, VendorDevice, VoiceBackend};
use crate::api::TokenFetcher;
use crate::error::SoftphoneError;

pub struct FakeCall {
    muted: Cell<bool>,
    params: BTreeMap<String, String>,
    listeners: RefCell<Vec<Rc<dyn Fn(&CallEvent)>>>,
    pub accepted: Cell<u32>,
    pub rejected: Cell<u32>,
    pub disconnected: Cell<u32>,
    pub mute_calls: RefCell<Vec<bool>>,
}

impl FakeCall {
    pub fn new(params: BTreeMap<String, String>) -> Rc<Self> {
        Rc::new(FakeCall {
            muted: Cell::new(false),
            params,
            listeners: RefCell::new(Vec::new()),
            accepted: Cell::new(0),
            rejected: Cell::new(0),
            disconnected: Cell::new(0),
            mute_calls: RefCell::new(Vec::new()),
        })
    }

    pub fn outbound() -> Rc<Self> {
        FakeCall::new(BTreeMap::new())
    }

    pub fn incoming(from: &str) -> Rc<Self> {
        let mut params = BTreeMap::new();
        params.insert("From".to_string(), from.to_string());
        FakeCall::new(params)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }

    /// Deliver an event the way the vendor would.
    pub fn emit(&self, event: CallEvent) {
        let snapshot: Vec<_> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener(&event);
        }
    }
}

impl VendorCall for FakeCall {
    fn accept(&self) {
        self.accepted.set(self.accepted.get() + 1);
    }

    fn reject(&self) {
        self.rejected.set(self.rejected.get() + 1);
    }

    fn disconnect(&self) {
        self.disconnected.set(self.disconnected.get() + 1);
    }

    fn mute(&self, muted: bool) {
        self.mute_calls.borrow_mut().push(muted);
        self.muted.set(muted);
    }

    fn is_muted(&self) -> bool {
        self.muted.get()
    }

    fn parameter(&self, key: &str) -> Option<String> {
        self.params.get(key).cloned()
    }

    fn on_event(&self, listener: Rc<dyn Fn(&CallEvent)>) {
        self.listeners.borrow_mut().push(listener);
    }
}

pub struct FakeDevice {
    token: String,
    options: DeviceOptions,
    state: RefCell<String>,
    busy: RefCell<Result<bool, SoftphoneError>>,
    register_result: RefCell<Result<(), SoftphoneError>>,
    unregister_result: RefCell<Result<(), SoftphoneError>>,
    update_result: RefCell<Result<(), SoftphoneError>>,
    next_call: RefCell<Option<Rc<FakeCall>>>,
    refuse_connect: Cell<bool>,
    handler: RefCell<Option<Rc<dyn Fn(DeviceEvent)>>>,
    pub connect_params: RefCell<Vec<Option<CallParams>>>,
    pub disconnect_all_count: Cell<u32>,
    pub register_count: Cell<u32>,
    pub unregister_count: Cell<u32>,
    updated_tokens: RefCell<Vec<String>>,
    destroy_count: Cell<u32>,
}

impl FakeDevice {
    fn new(token: &str, options: &DeviceOptions) -> Rc<Self> {
        Rc::new(FakeDevice {
            token: token.to_string(),
            options: options.clone(),
            state: RefCell::new("unregistered".to_string()),
            busy: RefCell::new(Ok(false)),
            register_result: RefCell::new(Ok(())),
            unregister_result: RefCell::new(Ok(())),
            update_result: RefCell::new(Ok(())),
            next_call: RefCell::new(None),
            refuse_connect: Cell::new(false),
            handler: RefCell::new(None),
            connect_params: RefCell::new(Vec::new()),
            disconnect_all_count: Cell::new(0),
            register_count: Cell::new(0),
            unregister_count: Cell::new(0),
            updated_tokens: RefCell::new(Vec::new()),
            destroy_count: Cell::new(0),
        })
    }

    pub fn initial_token(&self) -> String {
        self.token.clone()
    }

    pub fn options(&self) -> DeviceOptions {
        self.options.clone()
    }

    pub fn set_state(&self, state: &str) {
        *self.state.borrow_mut() = state.to_string();
    }

    pub fn set_busy(&self, busy: Result<bool, SoftphoneError>) {
        *self.busy.borrow_mut() = busy;
    }

    pub fn set_register_result(&self, result: Result<(), SoftphoneError>) {
        *self.register_result.borrow_mut() = result;
    }

    pub fn set_unregister_result(&self, result: Result<(), SoftphoneError>) {
        *self.unregister_result.borrow_mut() = result;
    }

    pub fn set_update_result(&self, result: Result<(), SoftphoneError>) {
        *self.update_result.borrow_mut() = result;
    }

    /// The call handed out by the next `connect`.
    pub fn queue_call(&self, call: Rc<FakeCall>) {
        *self.next_call.borrow_mut() = Some(call);
    }

    pub fn refuse_connect(&self) {
        self.refuse_connect.set(true);
    }

    pub fn updated_tokens(&self) -> Vec<String> {
        self.updated_tokens.borrow().clone()
    }

    pub fn destroy_count(&self) -> u32 {
        self.destroy_count.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroy_count.get() > 0
    }

    /// Deliver an event the way the vendor would.
    pub fn emit(&self, event: DeviceEvent) {
        let handler = self.handler.borrow().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Mirror the vendor: update the state, then emit the matching event.
    pub fn report(&self, state: &str) {
        self.set_state(state);
        match state {
            "registered" => self.emit(DeviceEvent::Registered),
            "registering" => self.emit(DeviceEvent::Registering),
            _ => self.emit(DeviceEvent::Unregistered),
        }
    }
}

#[async_trait(?Send)]
impl VendorDevice for FakeDevice {
    async fn register(&self) -> Result<(), SoftphoneError> {
        self.register_count.set(self.register_count.get() + 1);
        self.register_result.borrow().clone()
    }

    async fn unregister(&self) -> Result<(), SoftphoneError> {
        self.unregister_count.set(self.unregister_count.get() + 1);
        self.unregister_result.borrow().clone()
    }

    fn connect(&self, params: Option<&CallParams>) -> Option<Rc<dyn VendorCall>> {
        self.connect_params.borrow_mut().push(params.cloned());
        if self.refuse_connect.get() {
            return None;
        }
        let call = self.next_call.borrow_mut().take().unwrap_or_else(FakeCall::outbound);
        Some(call as Rc<dyn VendorCall>)
    }

    fn disconnect_all(&self) {
        self.disconnect_all_count.set(self.disconnect_all_count.get() + 1);
    }

    fn state(&self) -> String {
        self.state.borrow().clone()
    }

    fn is_busy(&self) -> Result<bool, SoftphoneError> {
        self.busy.borrow().clone()
    }

    async fn update_token(&self, token: &str) -> Result<(), SoftphoneError> {
        self.update_result.borrow().clone()?;
        self.updated_tokens.borrow_mut().push(token.to_string());
        Ok(())
    }

    fn destroy(&self) {
        self.destroy_count.set(self.destroy_count.get() + 1);
        self.handler.borrow_mut().take();
    }

    fn set_event_handler(&self, handler: Rc<dyn Fn(DeviceEvent)>) {
        *self.handler.borrow_mut() = Some(handler);
    }
}

/// Records every device it builds.
pub struct FakeBackend {
    devices: RefCell<Vec<Rc<FakeDevice>>>,
    live_at_creation: RefCell<Vec<usize>>,
    failure: RefCell<Option<SoftphoneError>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend {
            devices: RefCell::new(Vec::new()),
            live_at_creation: RefCell::new(Vec::new()),
            failure: RefCell::new(None),
        }
    }

    pub fn fail_with(&self, err: SoftphoneError) {
        *self.failure.borrow_mut() = Some(err);
    }

    pub fn created_count(&self) -> usize {
        self.devices.borrow().len()
    }

    pub fn device(&self, index: usize) -> Option<Rc<FakeDevice>> {
        self.devices.borrow().get(index).cloned()
    }

    pub fn last_device(&self) -> Option<Rc<FakeDevice>> {
        self.devices.borrow().last().cloned()
    }

    /// Number of devices still alive each time a new one was built.
    pub fn live_at_creation(&self) -> Vec<usize> {
        self.live_at_creation.borrow().clone()
    }

    pub fn live_count(&self) -> usize {
        self.devices.borrow().iter().filter(|d| !d.is_destroyed()).count()
    }
}

impl VoiceBackend for FakeBackend {
    fn create_device(&self, token: &str, options: &DeviceOptions) -> Result<Rc<dyn VendorDevice>, SoftphoneError> {
        if let Some(err) = self.failure.borrow().clone() {
            return Err(err);
        }
        let live = self.live_count();
        self.live_at_creation.borrow_mut().push(live);
        let device = FakeDevice::new(token, options);
        self.devices.borrow_mut().push(device.clone());
        Ok(device as Rc<dyn VendorDevice>)
    }
}

/// Token fetcher with scripted responses; defaults to `token-<n>`.
pub struct FakeTokenFetcher {
    responses: RefCell<VecDeque<Result<String, SoftphoneError>>>,
    pub requests: RefCell<Vec<String>>,
}

impl FakeTokenFetcher {
    pub fn new() -> Self {
        FakeTokenFetcher {
            responses: RefCell::new(VecDeque::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: Result<String, SoftphoneError>) {
        self.responses.borrow_mut().push_back(response);
    }
}

#[async_trait(?Send)]
impl TokenFetcher for FakeTokenFetcher {
    async fn fetch_token(&self, identity: &str) -> Result<String, SoftphoneError> {
        self.requests.borrow_mut().push(identity.to_string());
        let scripted = self.responses.borrow_mut().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("token-{}", self.requests.borrow().len())))
    }
}

/// Collects spawned futures so tests decide when they run.
#[derive(Clone)]
pub struct TestSpawner {
    queue: Rc<RefCell<Vec<LocalBoxFuture<'static, ()>>>>,
}

impl TestSpawner {
    pub fn new() -> Self {
        TestSpawner { queue: Rc::new(RefCell::new(Vec::new())) }
    }

    pub fn spawner(&self) -> LocalSpawner {
        let queue = self.queue.clone();
        Rc::new(move |fut: LocalBoxFuture<'static, ()>| queue.borrow_mut().push(fut))
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub async fn run_pending(&self) {
        loop {
            let batch: Vec<_> = std::mem::take(&mut *self.queue.borrow_mut());
            if batch.is_empty() {
                break;
            }
            for fut in batch {
                fut.await;
            }
        }
    }
}
