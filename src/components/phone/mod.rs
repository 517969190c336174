mod call_controls;
mod identity_form;
mod incoming_toast;

pub use call_controls::*;
pub use identity_form::*;
pub use incoming_toast::*;
