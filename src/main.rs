//! Voice Softphone - browser softphone for call-center agents
//!
//! Agents register an identity with the voice provider, then place and
//! receive calls, mute and hang up. Runs as a Dioxus web app; the voice SDK
//! is reached through wasm-bindgen in the browser build.

mod api;
mod components;
mod config;
mod error;
mod pwa;
mod session;
mod state;
mod voice;

use std::rc::Rc;

use dioxus::prelude::*;
use futures::StreamExt;

use api::HttpTokenFetcher;
use components::common::Toast;
use components::phone::{CallControls, IdentityForm, IncomingToast};
use pwa::LifecycleEvent;
use session::{SessionController, SessionSnapshot};
use state::{SESSION_STATE, UI_STATE};
use voice::Subscription;

fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = config::AppConfig::from_env();
    api::init_api_client(&config.api_base);
    tracing::info!("Using token backend at {}", config.api_base);
    config::init_config(config);

    dioxus::launch(App);
}

#[cfg(not(target_arch = "wasm32"))]
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("voice_softphone=info".parse()?))
        .try_init()?;
    Ok(())
}

/// Keeps the controller and bus subscriptions alive for the app's lifetime
type AppSubscriptions = Rc<(Subscription, Subscription)>;

#[component]
fn App() -> Element {
    let (controller, _subscriptions): (SessionController, AppSubscriptions) = use_hook(|| {
        let controller = SessionController::new(
            voice::default_backend(),
            Rc::new(HttpTokenFetcher::default()),
            voice::default_spawner(),
        );

        // Vendor callbacks fire outside the component tree; funnel them
        // through channels drained by tasks owned by this scope
        let (session_tx, mut session_rx) = futures::channel::mpsc::unbounded::<SessionSnapshot>();
        let session_sub = controller.subscribe(move |snapshot| {
            let _ = session_tx.unbounded_send(snapshot.clone());
        });
        spawn(async move {
            while let Some(snapshot) = session_rx.next().await {
                state::sync_session(&snapshot);
            }
        });

        let bus = pwa::lifecycle_bus();
        let (lifecycle_tx, mut lifecycle_rx) = futures::channel::mpsc::unbounded::<LifecycleEvent>();
        let lifecycle_sub = bus.subscribe(move |event| {
            let _ = lifecycle_tx.unbounded_send(event.clone());
        });
        spawn(async move {
            while let Some(event) = lifecycle_rx.next().await {
                state::handle_lifecycle_event(&event);
            }
        });

        #[cfg(target_arch = "wasm32")]
        pwa::bridge_window_events(bus);

        (controller, Rc::new((session_sub, lifecycle_sub)))
    });
    use_context_provider(|| controller.clone());

    rsx! {
        style { {include_str!("../assets/styles.css")} }

        div { class: "min-h-screen bg-gray-100",
            div { class: "max-w-3xl mx-auto px-4 py-8 flex flex-col gap-6",
                Header {}
                IdentityForm {}
                CallControls {}
            }
            IncomingToast {}
            ToastStack {}
        }
    }
}

#[component]
fn Header() -> Element {
    rsx! {
        header {
            div { class: "flex items-center gap-3",
                span { class: "text-3xl", "\u{1F4DE}" }
                h1 { class: "text-3xl font-bold text-gray-800", "Voice Softphone" }
            }
            p { class: "text-gray-500 mt-1",
                "Connect with your agent identity to receive and place calls."
            }
        }
    }
}

/// Last error plus app update/offline notices
#[component]
fn ToastStack() -> Element {
    let controller = use_context::<SessionController>();
    let error = SESSION_STATE.read().error.clone();
    let ui = UI_STATE.read().clone();

    let apply_update = move |_: ()| {
        let Some(handle) = UI_STATE.read().pending_update.clone() else {
            return;
        };
        spawn(async move {
            if let Err(e) = handle.apply().await {
                tracing::error!("Failed to apply app update: {}", e);
            }
            state::dismiss_update();
        });
    };

    rsx! {
        div { class: "toast-stack fixed bottom-4 right-4 z-50 flex flex-col gap-3",
            if let Some(message) = error {
                Toast {
                    message,
                    on_close: move |_: ()| controller.clear_error(),
                }
            }
            if ui.pending_update.is_some() {
                Toast {
                    message: "New version available".to_string(),
                    action_label: "Update".to_string(),
                    on_action: apply_update,
                    on_close: move |_: ()| state::dismiss_update(),
                }
            }
            if ui.show_offline_notice() {
                Toast {
                    message: "Ready to work offline".to_string(),
                    on_close: move |_: ()| state::dismiss_offline_notice(),
                }
            }
        }
    }
}
