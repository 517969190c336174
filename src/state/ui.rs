use dioxus::prelude::*;

use crate::pwa::{LifecycleEvent, UpdateHandle};

/// Global UI state
pub static UI_STATE: GlobalSignal<UiState> = Signal::global(UiState::default);

#[derive(Clone, Default)]
pub struct UiState {
    pub pending_update: Option<UpdateHandle>,
    pub offline_ready: bool,
}

impl UiState {
    pub fn apply(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::UpdateAvailable(handle) => self.pending_update = Some(handle.clone()),
            LifecycleEvent::OfflineReady => self.offline_ready = true,
        }
    }

    /// The offline notice yields to a pending update.
    pub fn show_offline_notice(&self) -> bool {
        self.offline_ready && self.pending_update.is_none()
    }
}

pub fn handle_lifecycle_event(event: &LifecycleEvent) {
    UI_STATE.write().apply(event);
}

pub fn dismiss_update() {
    UI_STATE.write().pending_update = None;
}

pub fn dismiss_offline_notice() {
    UI_STATE.write().offline_ready = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn handle() -> UpdateHandle {
        UpdateHandle::new(|| async { Ok(()) }.boxed_local())
    }

    #[test]
    fn test_update_hides_offline_notice() {
        let mut state = UiState::default();
        state.apply(&LifecycleEvent::OfflineReady);
        assert!(state.show_offline_notice());

        state.apply(&LifecycleEvent::UpdateAvailable(handle()));
        assert!(state.pending_update.is_some());
        assert!(!state.show_offline_notice());
    }

    #[test]
    fn test_latest_update_wins() {
        let mut state = UiState::default();
        let first = handle();
        let second = handle();
        state.apply(&LifecycleEvent::UpdateAvailable(first.clone()));
        state.apply(&LifecycleEvent::UpdateAvailable(second.clone()));
        assert_eq!(state.pending_update, Some(second));
        assert_ne!(state.pending_update, Some(first));
    }
}
