//! Task catalog, run dispatch, and run-list polling for the dashboard.

pub mod catalog;
pub mod dispatch;
pub mod poller;

pub use catalog::{load_catalog, sort_tasks, TASK_ORDER};
pub use dispatch::{dispatch_runs, parse_optional_number, ParamError, RunOptions};
pub use poller::RunPoller;
