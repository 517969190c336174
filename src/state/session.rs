use dioxus::prelude::*;

use crate::session::SessionSnapshot;

/// Latest session snapshot, mirrored from the `SessionController`
pub static SESSION_STATE: GlobalSignal<SessionSnapshot> = Signal::global(SessionSnapshot::default);

pub fn sync_session(snapshot: &SessionSnapshot) {
    if *SESSION_STATE.peek() != *snapshot {
        *SESSION_STATE.write() = snapshot.clone();
    }
}
