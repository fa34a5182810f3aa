//! Host window seams: popup control, message listening, closure detection

mod closure;
mod listener;
mod popup;

pub use closure::{watch_for_closure, ClosedWithoutCompletion};
pub use listener::{CompletionListener, ListenerClosed, ListenerRegistration, MessageChannel};
pub use popup::{PopupController, PopupError, BLANK_PAGE};
