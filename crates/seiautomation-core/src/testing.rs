//! Test doubles shared across modules.
//!
//! `FakeApi` stands in for the automation server: it knows a set of accounts,
//! accepts or rejects tokens, records every run request, and notes which
//! bearer token each call was made with.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::api::{ApiError, AutomationApi};
use crate::models::{AccessToken, RunStatus, TaskDefinition, TaskRun, TaskRunRequest, User};

pub fn sample_user(email: &str) -> User {
    User {
        id: 1,
        email: email.to_string(),
        full_name: None,
        is_active: true,
        is_admin: false,
        allow_auto_credentials: false,
    }
}

pub fn task(slug: &str) -> TaskDefinition {
    TaskDefinition {
        name: slug.replace('_', " "),
        slug: slug.to_string(),
        description: format!("Runs {}", slug),
    }
}

pub fn run(id: &str, task_name: &str) -> TaskRun {
    TaskRun {
        id: id.to_string(),
        task_name: task_name.to_string(),
        status: RunStatus::Pending,
        log: String::new(),
        created_at: Utc::now(),
        finished_at: None,
        params: None,
    }
}

#[derive(Default)]
pub struct FakeApi {
    token: Mutex<Option<String>>,
    /// email -> (password, token issued on login)
    accounts: HashMap<String, (String, String)>,
    /// token -> profile it authenticates
    valid_tokens: Mutex<HashMap<String, User>>,
    fail_me: bool,
    fail_run_slug: Option<String>,
    tasks: Vec<TaskDefinition>,
    runs: Vec<TaskRun>,
    run_requests: Mutex<Vec<TaskRunRequest>>,
    seen_tokens: Mutex<Vec<Option<String>>>,
    me_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, email: &str, password: &str, token: &str) -> Self {
        self.accounts
            .insert(email.to_string(), (password.to_string(), token.to_string()));
        self.valid_tokens
            .get_mut()
            .unwrap()
            .insert(token.to_string(), sample_user(email));
        self
    }

    /// `/auth/me` fails for every token, as if the server were unreachable.
    pub fn failing_me(mut self) -> Self {
        self.fail_me = true;
        self
    }

    pub fn failing_run(mut self, slug: &str) -> Self {
        self.fail_run_slug = Some(slug.to_string());
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<TaskDefinition>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_runs(mut self, runs: Vec<TaskRun>) -> Self {
        self.runs = runs;
        self
    }

    pub fn revoke(&self, token: &str) {
        self.valid_tokens.lock().unwrap().remove(token);
    }

    pub fn current_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    /// Token the most recent call was made with; `None` if no call was made.
    pub fn last_seen_token(&self) -> Option<Option<String>> {
        self.seen_tokens.lock().unwrap().last().cloned()
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub fn run_requests(&self) -> Vec<TaskRunRequest> {
        self.run_requests.lock().unwrap().clone()
    }

    fn record_call(&self) -> Option<String> {
        let token = self.current_token();
        self.seen_tokens.lock().unwrap().push(token.clone());
        token
    }
}

#[async_trait]
impl AutomationApi for FakeApi {
    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    async fn login(&self, email: &str, password: &str) -> Result<AccessToken> {
        self.record_call();
        match self.accounts.get(email) {
            Some((expected, token)) if expected == password => Ok(AccessToken {
                access_token: token.clone(),
                token_type: "bearer".to_string(),
            }),
            _ => Err(ApiError::Unauthorized.into()),
        }
    }

    async fn current_user(&self) -> Result<User> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        let token = self.record_call();
        if self.fail_me {
            return Err(ApiError::ServerError("connection reset".to_string()).into());
        }
        token
            .and_then(|t| self.valid_tokens.lock().unwrap().get(&t).cloned())
            .ok_or_else(|| ApiError::Unauthorized.into())
    }

    async fn list_tasks(&self) -> Result<Vec<TaskDefinition>> {
        self.record_call();
        Ok(self.tasks.clone())
    }

    async fn list_runs(&self) -> Result<Vec<TaskRun>> {
        self.record_call();
        Ok(self.runs.clone())
    }

    async fn run_task(&self, request: &TaskRunRequest) -> Result<TaskRun> {
        self.record_call();
        self.run_requests.lock().unwrap().push(request.clone());
        if self.fail_run_slug.as_deref() == Some(request.task_slug.as_str()) {
            return Err(ApiError::Validation("invalid bloco".to_string()).into());
        }
        let count = self.run_requests.lock().unwrap().len();
        Ok(run(&count.to_string(), &request.task_slug))
    }
}
