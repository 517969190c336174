//! Shared handle to a vendor call

use std::rc::{Rc, Weak};

use super::{CallEvent, VendorCall};

/// Reference to a call owned by the vendor SDK.
///
/// Equality is instance identity: two handles are equal only when they point
/// at the same vendor call.
#[derive(Clone)]
pub struct CallHandle {
    call: Rc<dyn VendorCall>,
}

impl CallHandle {
    pub fn new(call: Rc<dyn VendorCall>) -> Self {
        CallHandle { call }
    }

    pub fn accept(&self) {
        self.call.accept();
    }

    pub fn reject(&self) {
        self.call.reject();
    }

    pub fn disconnect(&self) {
        self.call.disconnect();
    }

    pub fn mute(&self, muted: bool) {
        self.call.mute(muted);
    }

    pub fn is_muted(&self) -> bool {
        self.call.is_muted()
    }

    /// The remote party for incoming calls.
    pub fn caller(&self) -> Option<String> {
        self.call.parameter("From").filter(|from| !from.is_empty())
    }

    pub fn on_event(&self, listener: impl Fn(&CallEvent) + 'static) {
        self.call.on_event(Rc::new(listener));
    }

    pub fn downgrade(&self) -> WeakCallHandle {
        WeakCallHandle { call: Rc::downgrade(&self.call) }
    }
}

impl PartialEq for CallHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.call), Rc::as_ptr(&other.call))
    }
}

impl Eq for CallHandle {}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("ptr", &Rc::as_ptr(&self.call).cast::<()>())
            .finish()
    }
}

/// Non-owning call reference, used by listeners attached to the call itself
#[derive(Clone)]
pub struct WeakCallHandle {
    call: Weak<dyn VendorCall>,
}

impl WeakCallHandle {
    pub fn upgrade(&self) -> Option<CallHandle> {
        self.call.upgrade().map(CallHandle::new)
    }
}
