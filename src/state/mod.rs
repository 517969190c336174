pub mod session;
pub mod ui;

pub use session::*;
pub use ui::*;
