//! REST API client module for the SEIAutomation server.
//!
//! This module provides the `ApiClient` for logging in, reading the current
//! user, listing tasks and runs, and dispatching new runs. The server uses
//! bearer token authentication obtained from `POST /auth/login`.
//!
//! `AutomationApi` is the seam the session and dispatch logic are written
//! against; `ApiClient` is its HTTP implementation.

pub mod client;
pub mod error;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AccessToken, TaskDefinition, TaskRun, TaskRunRequest, User};

pub use client::{ApiClient, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;

/// Remote operations used by the session manager and the dashboard.
#[async_trait]
pub trait AutomationApi: Send + Sync {
    /// Set or remove the bearer credential for subsequent calls.
    fn set_token(&self, token: Option<String>);

    async fn login(&self, email: &str, password: &str) -> Result<AccessToken>;

    async fn current_user(&self) -> Result<User>;

    async fn list_tasks(&self) -> Result<Vec<TaskDefinition>>;

    async fn list_runs(&self) -> Result<Vec<TaskRun>>;

    async fn run_task(&self, request: &TaskRunRequest) -> Result<TaskRun>;
}
