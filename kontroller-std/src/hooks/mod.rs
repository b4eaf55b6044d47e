//! Stock hook steps.
//!
//! - [`log_request`]: logs every request an action serves
//! - [`traced`]: runs a step inside a `tracing` span

mod logging;
mod span;

pub use logging::log_request;
pub use span::traced;
