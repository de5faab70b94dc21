//! Data models for the SEIAutomation API.
//!
//! - `User`, `AccessToken`: account and login responses
//! - `TaskDefinition`, `TaskRun`, `TaskRunRequest`: task catalog and runs

pub mod task;
pub mod user;

pub use task::{parse_timestamp, RunStatus, TaskDefinition, TaskRun, TaskRunRequest};
pub use user::{AccessToken, User};
