//! fileplotter: tail growing, possibly-compressed delimited files into
//! bounded per-column buffers.
//!
//! The core is synchronous and single-threaded. A [`store::DataStore`] is
//! polled once per cycle with the current [`store::Selection`]; it reads each
//! file's new rows through a [`source::DelimitedReader`] and appends them to
//! rolling [`store::ColumnBuffer`]s, notifying a [`render::RenderSink`] as
//! series appear, grow and are detached.
//!
//! # Example
//!
//! ```no_run
//! use fileplotter::render::TracingSink;
//! use fileplotter::session::Session;
//! use fileplotter::store::{Selection, StoreConfig};
//!
//! let mut session = Session::new(StoreConfig::default(), TracingSink::default());
//! session.select(Selection::new(vec!["run.csv.gz".into()], vec!["temp".into()]));
//! let summary = session.poll_cycle();
//! println!("{} new rows", summary.rows_added);
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod polling;
pub mod render;
pub mod session;
pub mod signal;
pub mod source;
pub mod store;
pub mod watch;

// Re-export main types
pub use config::Config;
pub use session::Session;
pub use store::{DataStore, Selection};
