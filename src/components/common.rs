use dioxus::prelude::*;

use crate::session::ConnectionStatus;

/// Dismissible notification with an optional action button
#[component]
pub fn Toast(
    message: String,
    action_label: Option<String>,
    on_action: Option<EventHandler<()>>,
    on_close: Option<EventHandler<()>>,
) -> Element {
    if message.is_empty() {
        return rsx! {};
    }

    rsx! {
        div { class: "bg-gray-900 text-white px-5 py-3 rounded-lg shadow-xl flex items-center justify-between gap-4 max-w-md animate-slide-in",
            span { class: "text-sm", "{message}" }
            div { class: "flex gap-2 flex-shrink-0",
                if let (Some(label), Some(handler)) = (action_label, on_action) {
                    button {
                        r#type: "button",
                        class: "px-3 py-1 rounded bg-blue-600 hover:bg-blue-700 text-sm font-medium",
                        onclick: move |_| handler.call(()),
                        "{label}"
                    }
                }
                if let Some(handler) = on_close {
                    button {
                        r#type: "button",
                        class: "px-3 py-1 rounded bg-gray-700 hover:bg-gray-600 text-sm",
                        onclick: move |_| handler.call(()),
                        "Close"
                    }
                }
            }
        }
    }
}

#[component]
pub fn StatusPill(status: ConnectionStatus) -> Element {
    let color = status.color();
    let label = status.as_str();

    rsx! {
        span { class: "inline-flex items-center gap-2 px-3 py-1 rounded-full bg-gray-100 text-sm font-medium text-gray-700",
            span { class: "w-2.5 h-2.5 rounded-full", style: "background-color: {color}" }
            "{label}"
        }
    }
}
