//! Metrics for the polling core.
//!
//! Code that wants to count something builds an event from [`events`] and
//! passes it to [`emit!`](crate::emit). Events go through the `metrics`
//! facade, so they cost nothing until [`init`] installs the Prometheus
//! recorder.

pub mod events;
mod server;

pub use events::InternalEvent;
pub use server::init;

/// Emit an [`InternalEvent`].
///
/// ```ignore
/// emit!(RowsRead { count: 3 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::InternalEvent::emit($event)
    };
}
