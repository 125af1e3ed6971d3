//! Dashboard core: application state and the event loop

pub mod app;
pub mod runtime;
pub mod state;

pub use app::{App, AppMessage, Screen, Task};
pub use runtime::run;
