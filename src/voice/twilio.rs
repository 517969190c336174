//! Bindings for the Twilio Voice JavaScript SDK
//!
//! The SDK is loaded by `index.html` and exposed as the global `Twilio`.
//! `Twilio.Device` and the call objects it produces are wrapped here and
//! implement the vendor traits consumed by `DeviceAdapter`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use super::{CallEvent, CallParams, DeviceEvent, DeviceOptions, VendorCall, VendorDevice, VoiceBackend};
use crate::error::SoftphoneError;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = Twilio, js_name = Device)]
    type JsDevice;

    #[wasm_bindgen(constructor, js_namespace = Twilio, js_class = "Device", catch)]
    fn new(token: &str, options: &JsValue) -> Result<JsDevice, JsValue>;

    #[wasm_bindgen(method, js_class = "Device", catch)]
    fn register(this: &JsDevice) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, js_class = "Device", catch)]
    fn unregister(this: &JsDevice) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, js_class = "Device", catch)]
    fn connect(this: &JsDevice, options: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, js_class = "Device", js_name = disconnectAll)]
    fn disconnect_all(this: &JsDevice);

    #[wasm_bindgen(method, js_class = "Device", js_name = updateToken, catch)]
    fn update_token(this: &JsDevice, token: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, js_class = "Device")]
    fn destroy(this: &JsDevice);

    #[wasm_bindgen(method, js_class = "Device", js_name = on)]
    fn on(this: &JsDevice, event: &str, listener: &js_sys::Function);

    type JsCall;

    #[wasm_bindgen(method)]
    fn accept(this: &JsCall);

    #[wasm_bindgen(method)]
    fn reject(this: &JsCall);

    #[wasm_bindgen(method)]
    fn disconnect(this: &JsCall);

    #[wasm_bindgen(method)]
    fn mute(this: &JsCall, should_mute: bool);

    #[wasm_bindgen(method, js_name = isMuted)]
    fn is_muted(this: &JsCall) -> bool;

    #[wasm_bindgen(method, getter)]
    fn parameters(this: &JsCall) -> JsValue;

    #[wasm_bindgen(method, js_name = on)]
    fn on(this: &JsCall, event: &str, listener: &js_sys::Function);
}

const CALL_EVENTS: [&str; 7] = ["accept", "mute", "disconnect", "cancel", "reject", "error", "unmute"];

/// Best-effort message from a thrown JS value.
fn js_error_message(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    js_sys::Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

/// Read a property; SDK versions differ on whether it is a getter or a method.
fn read_property(target: &JsValue, name: &str) -> Result<JsValue, JsValue> {
    let value = js_sys::Reflect::get(target, &JsValue::from_str(name))?;
    match value.dyn_ref::<js_sys::Function>() {
        Some(func) => func.call0(target),
        None => Ok(value),
    }
}

fn to_call_event(name: &str, payload: &JsValue) -> Option<CallEvent> {
    let event = match name {
        "accept" => CallEvent::Accept,
        "disconnect" => CallEvent::Disconnect,
        "cancel" => CallEvent::Cancel,
        "reject" => CallEvent::Reject,
        "error" => CallEvent::Error(js_error_message(payload)),
        // The vendor reports both directions as `mute` with a boolean payload
        "mute" => match payload.as_bool() {
            Some(false) => CallEvent::Unmute,
            _ => CallEvent::Mute,
        },
        "unmute" => CallEvent::Unmute,
        _ => return None,
    };
    Some(event)
}

#[derive(Default)]
struct PendingOps {
    disconnect: bool,
    muted: Option<bool>,
}

/// A vendor call. Newer SDKs resolve `connect` asynchronously, so the
/// underlying object may arrive after the handle is returned; operations
/// issued before then are applied on arrival.
pub struct TwilioCall {
    call: RefCell<Option<JsCall>>,
    listeners: Rc<RefCell<Vec<Rc<dyn Fn(&CallEvent)>>>>,
    pending: RefCell<PendingOps>,
    muted: Cell<bool>,
}

impl TwilioCall {
    fn resolved(call: JsCall) -> Rc<Self> {
        let this = Rc::new(TwilioCall::empty());
        this.attach(call);
        this
    }

    fn empty() -> Self {
        TwilioCall {
            call: RefCell::new(None),
            listeners: Rc::new(RefCell::new(Vec::new())),
            pending: RefCell::new(PendingOps::default()),
            muted: Cell::new(false),
        }
    }

    fn pending(promise: js_sys::Promise) -> Rc<Self> {
        let this = Rc::new(TwilioCall::empty());
        let weak = Rc::downgrade(&this);
        wasm_bindgen_futures::spawn_local(async move {
            let result = JsFuture::from(promise).await;
            let Some(this) = weak.upgrade() else {
                return;
            };
            match result {
                Ok(value) => this.attach(value.unchecked_into()),
                Err(err) => {
                    let message = js_error_message(&err);
                    tracing::error!("Outbound call failed to start: {}", message);
                    this.dispatch(&CallEvent::Error(message));
                    this.dispatch(&CallEvent::Disconnect);
                }
            }
        });
        this
    }

    fn attach(&self, call: JsCall) {
        for name in CALL_EVENTS {
            let listeners = self.listeners.clone();
            let closure = Closure::wrap(Box::new(move |payload: JsValue| {
                if let Some(event) = to_call_event(name, &payload) {
                    let snapshot: Vec<_> = listeners.borrow().clone();
                    for listener in snapshot {
                        listener(&event);
                    }
                }
            }) as Box<dyn FnMut(JsValue)>);
            call.on(name, closure.as_ref().unchecked_ref());
            // The vendor may emit after the handle is dropped
            closure.forget();
        }

        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        if let Some(muted) = pending.muted {
            call.mute(muted);
        }
        if pending.disconnect {
            call.disconnect();
        }
        *self.call.borrow_mut() = Some(call);
    }

    fn dispatch(&self, event: &CallEvent) {
        let snapshot: Vec<_> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener(event);
        }
    }

    fn with_call<R>(&self, f: impl FnOnce(&JsCall) -> R) -> Option<R> {
        let call = self.call.borrow();
        call.as_ref().map(f)
    }
}

impl VendorCall for TwilioCall {
    fn accept(&self) {
        self.with_call(|call| call.accept());
    }

    fn reject(&self) {
        self.with_call(|call| call.reject());
    }

    fn disconnect(&self) {
        if self.with_call(|call| call.disconnect()).is_none() {
            self.pending.borrow_mut().disconnect = true;
        }
    }

    fn mute(&self, muted: bool) {
        self.muted.set(muted);
        if self.with_call(|call| call.mute(muted)).is_none() {
            self.pending.borrow_mut().muted = Some(muted);
        }
    }

    fn is_muted(&self) -> bool {
        self.with_call(|call| call.is_muted()).unwrap_or(self.muted.get())
    }

    fn parameter(&self, key: &str) -> Option<String> {
        let params = self.with_call(|call| call.parameters())?;
        if !params.is_object() {
            return None;
        }
        // Either a Map-like object with `get` or a plain record
        if let Ok(get) = js_sys::Reflect::get(&params, &JsValue::from_str("get")) {
            if let Some(get) = get.dyn_ref::<js_sys::Function>() {
                return get.call1(&params, &JsValue::from_str(key)).ok()?.as_string();
            }
        }
        js_sys::Reflect::get(&params, &JsValue::from_str(key)).ok()?.as_string()
    }

    fn on_event(&self, listener: Rc<dyn Fn(&CallEvent)>) {
        self.listeners.borrow_mut().push(listener);
    }
}

pub struct TwilioDevice {
    device: JsDevice,
}

impl TwilioDevice {
    fn install(&self, event: &str, handler: impl Fn(JsValue) + 'static) {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(JsValue)>);
        self.device.on(event, closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

async fn await_promise(result: Result<js_sys::Promise, JsValue>) -> Result<(), SoftphoneError> {
    let promise = result.map_err(|e| SoftphoneError::DeviceOperation(js_error_message(&e)))?;
    JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|e| SoftphoneError::DeviceOperation(js_error_message(&e)))
}

#[async_trait(?Send)]
impl VendorDevice for TwilioDevice {
    async fn register(&self) -> Result<(), SoftphoneError> {
        await_promise(self.device.register()).await
    }

    async fn unregister(&self) -> Result<(), SoftphoneError> {
        await_promise(self.device.unregister()).await
    }

    fn connect(&self, params: Option<&CallParams>) -> Option<Rc<dyn VendorCall>> {
        let options = match params {
            Some(params) => {
                let record = js_sys::Object::new();
                for (key, value) in params {
                    let _ = js_sys::Reflect::set(&record, &JsValue::from_str(key), &JsValue::from_str(value));
                }
                let options = js_sys::Object::new();
                let _ = js_sys::Reflect::set(&options, &JsValue::from_str("params"), &record);
                options.into()
            }
            None => JsValue::UNDEFINED,
        };

        let value = match self.device.connect(&options) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Vendor refused to place call: {}", js_error_message(&err));
                return None;
            }
        };
        if value.is_undefined() || value.is_null() {
            return None;
        }

        let call = match value.dyn_into::<js_sys::Promise>() {
            Ok(promise) => TwilioCall::pending(promise),
            Err(value) => TwilioCall::resolved(value.unchecked_into()),
        };
        Some(call as Rc<dyn VendorCall>)
    }

    fn disconnect_all(&self) {
        self.device.disconnect_all();
    }

    fn state(&self) -> String {
        read_property(&self.device, "state")
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    }

    fn is_busy(&self) -> Result<bool, SoftphoneError> {
        let value = read_property(&self.device, "isBusy")
            .map_err(|e| SoftphoneError::DeviceOperation(js_error_message(&e)))?;
        value
            .as_bool()
            .ok_or_else(|| SoftphoneError::DeviceOperation("isBusy is not a boolean".to_string()))
    }

    async fn update_token(&self, token: &str) -> Result<(), SoftphoneError> {
        let value = self
            .device
            .update_token(token)
            .map_err(|e| SoftphoneError::DeviceOperation(js_error_message(&e)))?;
        if let Ok(promise) = value.dyn_into::<js_sys::Promise>() {
            JsFuture::from(promise)
                .await
                .map_err(|e| SoftphoneError::DeviceOperation(js_error_message(&e)))?;
        }
        Ok(())
    }

    fn destroy(&self) {
        self.device.destroy();
    }

    fn set_event_handler(&self, handler: Rc<dyn Fn(DeviceEvent)>) {
        let h = handler.clone();
        self.install("registered", move |_| h(DeviceEvent::Registered));
        let h = handler.clone();
        self.install("registering", move |_| h(DeviceEvent::Registering));
        let h = handler.clone();
        self.install("unregistered", move |_| h(DeviceEvent::Unregistered));
        let h = handler.clone();
        self.install("tokenWillExpire", move |_| h(DeviceEvent::TokenWillExpire));
        let h = handler.clone();
        self.install("error", move |err| h(DeviceEvent::Error(js_error_message(&err))));
        self.install("incoming", move |call| {
            let call = TwilioCall::resolved(call.unchecked_into());
            handler(DeviceEvent::Incoming(call as Rc<dyn VendorCall>));
        });
    }
}

/// Builds `Twilio.Device` instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct TwilioBackend;

impl VoiceBackend for TwilioBackend {
    fn create_device(&self, token: &str, options: &DeviceOptions) -> Result<Rc<dyn VendorDevice>, SoftphoneError> {
        let js_options = js_sys::Object::new();
        let codecs: js_sys::Array = options
            .codec_preferences
            .iter()
            .map(|c| JsValue::from_str(c.as_str()))
            .collect();
        let _ = js_sys::Reflect::set(&js_options, &JsValue::from_str("logLevel"), &JsValue::from_str(options.log_level.as_str()));
        let _ = js_sys::Reflect::set(&js_options, &JsValue::from_str("codecPreferences"), &codecs);

        let device = JsDevice::new(token, &js_options)
            .map_err(|e| SoftphoneError::DeviceOperation(js_error_message(&e)))?;
        tracing::debug!("Created Twilio device");
        Ok(Rc::new(TwilioDevice { device }) as Rc<dyn VendorDevice>)
    }
}
