//! Installable-app lifecycle notifications
//!
//! The service worker registration script dispatches two window events,
//! `pwa:need-refresh` (detail: a function applying the update) and
//! `pwa:offline-ready`. In the browser build they are forwarded onto a typed
//! in-process bus the UI subscribes to.

use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::voice::{ListenerSet, Subscription};

pub const NEED_REFRESH_EVENT: &str = "pwa:need-refresh";
pub const OFFLINE_READY_EVENT: &str = "pwa:offline-ready";

type UpdateFn = dyn Fn() -> LocalBoxFuture<'static, anyhow::Result<()>>;

/// Applies a pending app update (reloading the page)
#[derive(Clone)]
pub struct UpdateHandle {
    apply: Rc<UpdateFn>,
}

impl UpdateHandle {
    pub fn new(apply: impl Fn() -> LocalBoxFuture<'static, anyhow::Result<()>> + 'static) -> Self {
        UpdateHandle { apply: Rc::new(apply) }
    }

    pub async fn apply(&self) -> anyhow::Result<()> {
        (self.apply)().await
    }
}

impl PartialEq for UpdateHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.apply, &other.apply)
    }
}

impl std::fmt::Debug for UpdateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UpdateHandle")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    UpdateAvailable(UpdateHandle),
    OfflineReady,
}

/// Broadcast of lifecycle events to any number of subscribers
#[derive(Clone, Default)]
pub struct LifecycleBus {
    listeners: ListenerSet<LifecycleEvent>,
}

impl LifecycleBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&LifecycleEvent) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    pub fn publish(&self, event: LifecycleEvent) {
        tracing::info!("App lifecycle event: {:?}", event);
        self.listeners.notify(&event);
    }
}

thread_local! {
    static LIFECYCLE_BUS: LifecycleBus = LifecycleBus::new();
}

/// Process-wide bus shared by the window bridge and the UI.
pub fn lifecycle_bus() -> LifecycleBus {
    LIFECYCLE_BUS.with(|bus| bus.clone())
}

/// Forward the service worker's window events onto the bus.
#[cfg(target_arch = "wasm32")]
pub fn bridge_window_events(bus: LifecycleBus) {
    use futures::FutureExt;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;

    let Some(win) = web_sys::window() else {
        tracing::warn!("No window available; lifecycle notifications disabled");
        return;
    };

    let refresh_bus = bus.clone();
    let on_refresh = Closure::wrap(Box::new(move |event: web_sys::CustomEvent| {
        let Some(update) = event.detail().dyn_into::<js_sys::Function>().ok() else {
            tracing::warn!("{} without an update function", NEED_REFRESH_EVENT);
            return;
        };
        let handle = UpdateHandle::new(move || {
            let result = update.call0(&JsValue::NULL);
            async move {
                let value = result.map_err(|e| anyhow::anyhow!("{:?}", e))?;
                if let Ok(promise) = value.dyn_into::<js_sys::Promise>() {
                    JsFuture::from(promise).await.map_err(|e| anyhow::anyhow!("{:?}", e))?;
                }
                Ok(())
            }
            .boxed_local()
        });
        refresh_bus.publish(LifecycleEvent::UpdateAvailable(handle));
    }) as Box<dyn FnMut(_)>);

    let on_offline = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        bus.publish(LifecycleEvent::OfflineReady);
    }) as Box<dyn FnMut(_)>);

    let _ = win.add_event_listener_with_callback(NEED_REFRESH_EVENT, on_refresh.as_ref().unchecked_ref());
    let _ = win.add_event_listener_with_callback(OFFLINE_READY_EVENT, on_offline.as_ref().unchecked_ref());

    // Keep the closures alive for the lifetime of the page
    on_refresh.forget();
    on_offline.forget();
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = LifecycleBus::new();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));

        let a2 = a.clone();
        let _sa = bus.subscribe(move |e| {
            if *e == LifecycleEvent::OfflineReady {
                a2.set(a2.get() + 1);
            }
        });
        let b2 = b.clone();
        let _sb = bus.subscribe(move |_| b2.set(b2.get() + 1));

        bus.publish(LifecycleEvent::OfflineReady);
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn test_unsubscribed_listener_stops_receiving() {
        let bus = LifecycleBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let sub = bus.subscribe(move |_| h.set(h.get() + 1));

        bus.publish(LifecycleEvent::OfflineReady);
        drop(sub);
        bus.publish(LifecycleEvent::OfflineReady);
        assert_eq!(hits.get(), 1);
    }

    #[tokio::test]
    async fn test_update_handle_runs_update() {
        let bus = LifecycleBus::new();
        let ran = Rc::new(Cell::new(false));
        let received: Rc<RefCell<Option<UpdateHandle>>> = Rc::new(RefCell::new(None));

        let r = received.clone();
        let _sub = bus.subscribe(move |e| {
            if let LifecycleEvent::UpdateAvailable(handle) = e {
                *r.borrow_mut() = Some(handle.clone());
            }
        });

        let flag = ran.clone();
        bus.publish(LifecycleEvent::UpdateAvailable(UpdateHandle::new(move || {
            flag.set(true);
            async { Ok(()) }.boxed_local()
        })));

        let handle = received.borrow().clone().expect("update delivered");
        handle.apply().await.unwrap();
        assert!(ran.get());
    }

    #[test]
    fn test_shared_bus_is_the_same_instance() {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let _sub = lifecycle_bus().subscribe(move |_| h.set(h.get() + 1));
        lifecycle_bus().publish(LifecycleEvent::OfflineReady);
        assert_eq!(hits.get(), 1);
    }
}
