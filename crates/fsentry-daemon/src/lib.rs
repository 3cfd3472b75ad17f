//! fsentry-daemon
//!
//! Scheduling and wiring of the suppression pipeline:
//!
//! ```text
//! ScanTask ──events──> ChangeDispatcher ──> ListUpdateHandler ──signal──> ListSuppressTask
//!                                      └──> SuppressListedHandler ──> filter -> batcher -> gateway
//! ```
//!
//! Each periodic job is an explicit task object that owns its schedule and
//! stops when the shared [`CancellationToken`](tokio_util::sync::CancellationToken)
//! is cancelled. [`runtime::run`] builds the whole graph from a validated
//! config.

pub mod capability;
pub mod dispatch;
pub mod handlers;
pub mod runtime;
pub mod scanner;
pub mod tasks;
pub mod watermark;

pub use capability::check_capability;
pub use dispatch::{ChangeDispatcher, ChangeHandler};
pub use handlers::{ListUpdateHandler, SuppressListedHandler};
pub use runtime::{run, RunOptions};
pub use scanner::{ChangeScanner, ScanError};
pub use tasks::{ListSuppressTask, ScanTask};
pub use watermark::Watermark;
