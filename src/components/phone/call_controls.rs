use dioxus::prelude::*;

use crate::components::common::StatusPill;
use crate::session::{ConnectionStatus, SessionController};
use crate::state::SESSION_STATE;

#[component]
pub fn CallControls() -> Element {
    let controller = use_context::<SessionController>();
    let mut destination = use_signal(String::new);
    let mut dialing = use_signal(|| false);

    let session = SESSION_STATE.read().clone();
    let status = session.status;
    let has_call = session.has_active_call;
    let muted = session.muted;

    let place_call = {
        let controller = controller.clone();
        move |_| {
            let number = destination();
            if number.is_empty() {
                return;
            }
            dialing.set(true);
            if let Err(e) = controller.call(&number) {
                tracing::error!("Error starting call: {}", e);
            }
            dialing.set(false);
        }
    };

    let hang_up = {
        let controller = controller.clone();
        move |_| controller.hangup()
    };

    let toggle_mute = move |_| {
        if muted {
            controller.unmute();
        } else {
            controller.mute();
        }
    };

    let can_dial = status == ConnectionStatus::Registered && !dialing();
    let input_enabled = status.is_online();
    let busy_text = if session.busy { "Yes" } else { "No" };
    let call_text = if has_call { "Yes" } else { "No" };
    let mute_label = if muted { "Unmute" } else { "Mute" };
    let call_label = if dialing() { "Dialing..." } else { "Call" };

    rsx! {
        div { class: "bg-white rounded-lg shadow-md p-6",
            h2 { class: "text-lg font-semibold text-gray-800 mb-3", "Call controls" }
            div { class: "text-sm text-gray-500 space-y-1",
                div { class: "flex items-center gap-2",
                    "Device status: "
                    StatusPill { status }
                }
                div { "Busy: {busy_text}" }
                div { "Active call: {call_text}" }
            }

            div { class: "mt-6 flex flex-col gap-4",
                input {
                    class: "w-full px-4 py-3 border border-gray-300 rounded-lg text-lg focus:outline-none focus:ring-2 focus:ring-blue-500 disabled:bg-gray-100",
                    r#type: "tel",
                    placeholder: "Number to dial",
                    value: "{destination}",
                    disabled: !input_enabled,
                    oninput: move |e| destination.set(e.value()),
                }

                div { class: "flex flex-wrap gap-3",
                    button {
                        r#type: "button",
                        class: "flex-1 min-w-[160px] py-3 bg-green-600 text-white rounded-lg hover:bg-green-700 font-medium disabled:opacity-50",
                        disabled: !can_dial,
                        onclick: place_call,
                        "{call_label}"
                    }
                    button {
                        r#type: "button",
                        class: "flex-1 min-w-[160px] py-3 bg-red-600 text-white rounded-lg hover:bg-red-700 font-medium disabled:opacity-50",
                        disabled: !has_call,
                        onclick: hang_up,
                        "Hang up"
                    }
                    button {
                        r#type: "button",
                        class: "flex-1 min-w-[160px] py-3 bg-gray-900 text-white rounded-lg hover:bg-gray-800 font-medium disabled:opacity-50",
                        disabled: !has_call,
                        onclick: toggle_mute,
                        "{mute_label}"
                    }
                }
            }
        }
    }
}
