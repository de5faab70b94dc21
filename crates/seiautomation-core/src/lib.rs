//! Core library for the SEIAutomation client.
//!
//! - `api`: HTTP client for the automation server
//! - `auth`: session lifecycle and token persistence
//! - `models`: users, task definitions and task runs
//! - `tasks`: catalog ordering, run dispatch, run-list polling
//! - `config`: on-disk configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, AutomationApi};
pub use auth::{SessionManager, SessionPhase, SessionState, TokenStore};
pub use config::Config;
