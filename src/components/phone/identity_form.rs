use dioxus::prelude::*;

use crate::session::SessionController;
use crate::state::SESSION_STATE;

/// Identity input with a Connect/Disconnect toggle
#[component]
pub fn IdentityForm() -> Element {
    let controller = use_context::<SessionController>();
    let mut identity_input = use_signal(String::new);
    let mut is_busy = use_signal(|| false);

    let session = SESSION_STATE.read();
    let online = session.status.is_online();
    let status_label = session.status.display_name();
    let connected_as = session.identity.clone();
    drop(session);

    let submit = move |e: FormEvent| {
        e.prevent_default();
        let controller = controller.clone();

        if online {
            is_busy.set(true);
            spawn(async move {
                if let Err(e) = controller.disconnect().await {
                    tracing::warn!("Disconnect finished with error: {}", e);
                }
                is_busy.set(false);
            });
            return;
        }

        let identity = identity_input().trim().to_string();
        if identity.is_empty() {
            return;
        }
        is_busy.set(true);
        spawn(async move {
            controller.connect(&identity).await;
            is_busy.set(false);
        });
    };

    let disabled = is_busy() || (identity_input().trim().is_empty() && !online);
    let button_label = if online { "Disconnect" } else { "Connect" };

    rsx! {
        section { class: "bg-white rounded-lg shadow-md p-6",
            form { class: "flex flex-wrap items-center gap-3", onsubmit: submit,
                input {
                    class: "flex-1 min-w-[200px] px-4 py-3 border border-gray-300 rounded-lg focus:outline-none focus:ring-2 focus:ring-blue-500",
                    r#type: "text",
                    placeholder: "Agent identity",
                    autocomplete: "off",
                    value: "{identity_input}",
                    oninput: move |e| identity_input.set(e.value()),
                }
                button {
                    r#type: "submit",
                    class: "px-6 py-3 bg-blue-600 text-white rounded-lg hover:bg-blue-700 font-medium disabled:opacity-50",
                    disabled: disabled,
                    "{button_label}"
                }
                if let Some(identity) = connected_as {
                    span { class: "text-sm text-gray-500",
                        "Connected as: "
                        strong { "{identity}" }
                        " \u{00B7} {status_label}"
                    }
                }
            }
        }
    }
}
