use dioxus::prelude::*;

use crate::session::SessionController;
use crate::state::SESSION_STATE;

/// Accept/Reject prompt for a ringing incoming call
#[component]
pub fn IncomingToast() -> Element {
    let controller = use_context::<SessionController>();

    let session = SESSION_STATE.read();
    if !session.has_incoming_call {
        return rsx! {};
    }
    let caller = session
        .incoming_caller
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());
    drop(session);

    let accept = {
        let controller = controller.clone();
        move |_| controller.accept_incoming()
    };
    let reject = move |_| controller.reject_incoming();

    rsx! {
        div { class: "fixed top-4 left-1/2 -translate-x-1/2 z-50 bg-white rounded-lg shadow-xl px-6 py-4 flex items-center gap-6 animate-slide-in",
            div {
                div { class: "font-semibold text-gray-800", "Incoming call" }
                div { class: "text-sm text-gray-500", "From: {caller}" }
            }
            div { class: "flex gap-2",
                button {
                    r#type: "button",
                    class: "px-4 py-2 bg-green-600 text-white rounded-lg hover:bg-green-700 font-medium",
                    onclick: accept,
                    "Accept"
                }
                button {
                    r#type: "button",
                    class: "px-4 py-2 bg-red-600 text-white rounded-lg hover:bg-red-700 font-medium",
                    onclick: reject,
                    "Reject"
                }
            }
        }
    }
}
