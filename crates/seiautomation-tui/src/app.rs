//! Application state management for the SEIAutomation terminal client.
//!
//! `App` owns the session manager and follows its state through a watch
//! subscription. While the session is authenticated a `Dashboard` exists;
//! it is created on login and dropped on logout, which also stops its run
//! poller.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use seiautomation_core::auth::open_token_store;
use seiautomation_core::config::{TokenStoreKind, ENV_EMAIL, ENV_PASSWORD};
use seiautomation_core::models::{TaskDefinition, TaskRun, TaskRunRequest, User};
use seiautomation_core::tasks::{dispatch_runs, load_catalog, RunOptions, RunPoller};
use seiautomation_core::{ApiClient, AutomationApi, Config, SessionManager, SessionPhase, SessionState};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the run poller channel.
const RUNS_CHANNEL_SIZE: usize = 4;

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum digits accepted in a numeric form field.
const MAX_NUMBER_LENGTH: usize = 9;

pub const LOGIN_FAILED_MESSAGE: &str = "Could not sign in. Check your credentials.";
pub const DISPATCH_FAILED_MESSAGE: &str =
    "Failed to dispatch the tasks. Check the parameters and try again.";
pub const RUNS_REFRESH_FAILED_MESSAGE: &str = "Could not refresh the run list.";

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

/// Dashboard panel with keyboard focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardFocus {
    Tasks,
    Params,
    Runs,
}

impl DashboardFocus {
    pub fn next(&self) -> Self {
        match self {
            DashboardFocus::Tasks => DashboardFocus::Params,
            DashboardFocus::Params => DashboardFocus::Runs,
            DashboardFocus::Runs => DashboardFocus::Tasks,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            DashboardFocus::Tasks => DashboardFocus::Runs,
            DashboardFocus::Params => DashboardFocus::Tasks,
            DashboardFocus::Runs => DashboardFocus::Params,
        }
    }
}

/// Row of the parameters form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamField {
    BlocoId,
    Limit,
    Headless,
    AutoCredentials,
    DevMode,
    Submit,
}

impl ParamField {
    pub const ALL: [ParamField; 6] = [
        ParamField::BlocoId,
        ParamField::Limit,
        ParamField::Headless,
        ParamField::AutoCredentials,
        ParamField::DevMode,
        ParamField::Submit,
    ];

    pub fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

// ============================================================================
// Dashboard
// ============================================================================

/// State of the dashboard view. Exists only while a user is authenticated.
pub struct Dashboard {
    pub user: User,
    pub tasks: Vec<TaskDefinition>,
    pub selected: HashSet<String>,
    pub task_cursor: usize,
    pub options: RunOptions,
    pub focus: DashboardFocus,
    pub param_field: ParamField,
    pub runs: Vec<TaskRun>,
    pub run_selection: usize,
    pub submitting: bool,
    pub error: Option<String>,
    pub success: Option<String>,

    pending: Option<Vec<TaskRunRequest>>,
    runs_rx: mpsc::Receiver<Vec<TaskRun>>,
    _poller: RunPoller,
}

impl Dashboard {
    pub fn new(
        user: User,
        tasks: Vec<TaskDefinition>,
        runs_rx: mpsc::Receiver<Vec<TaskRun>>,
        poller: RunPoller,
    ) -> Self {
        let options = RunOptions::for_user(&user);
        Self {
            user,
            tasks,
            selected: HashSet::new(),
            task_cursor: 0,
            options,
            focus: DashboardFocus::Tasks,
            param_field: ParamField::BlocoId,
            runs: Vec::new(),
            run_selection: 0,
            submitting: false,
            error: None,
            success: None,
            pending: None,
            runs_rx,
            _poller: poller,
        }
    }

    /// Load the catalog once and start polling the run list.
    pub async fn activate(api: Arc<dyn AutomationApi>, user: User, config: &Config) -> Self {
        let tasks = match load_catalog(api.as_ref()).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "Task catalog unavailable");
                Vec::new()
            }
        };

        let (tx, rx) = mpsc::channel(RUNS_CHANNEL_SIZE);
        let poller = RunPoller::for_api(api, config.poll_interval(), tx);
        info!(tasks = tasks.len(), "Dashboard activated");
        Self::new(user, tasks, rx, poller)
    }

    pub fn allow_auto(&self) -> bool {
        self.user.allow_auto_credentials
    }

    pub fn is_selected(&self, slug: &str) -> bool {
        self.selected.contains(slug)
    }

    pub fn toggle_task_at_cursor(&mut self) {
        if self.submitting {
            return;
        }
        if let Some(task) = self.tasks.get(self.task_cursor) {
            if !self.selected.remove(&task.slug) {
                self.selected.insert(task.slug.clone());
            }
        }
    }

    /// Selected slugs in catalog order.
    pub fn selected_slugs(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| self.selected.contains(&t.slug))
            .map(|t| t.slug.clone())
            .collect()
    }

    pub fn move_task_cursor(&mut self, down: bool) {
        let max = self.tasks.len().saturating_sub(1);
        self.task_cursor = if down {
            (self.task_cursor + 1).min(max)
        } else {
            self.task_cursor.saturating_sub(1)
        };
    }

    pub fn move_run_selection(&mut self, down: bool) {
        let max = self.runs.len().saturating_sub(1);
        self.run_selection = if down {
            (self.run_selection + 1).min(max)
        } else {
            self.run_selection.saturating_sub(1)
        };
    }

    pub fn selected_run(&self) -> Option<&TaskRun> {
        self.runs.get(self.run_selection)
    }

    /// Text buffer behind the focused numeric field, if any.
    fn focused_number_mut(&mut self) -> Option<&mut String> {
        match self.param_field {
            ParamField::BlocoId => Some(&mut self.options.bloco_id),
            ParamField::Limit => Some(&mut self.options.limit),
            _ => None,
        }
    }

    pub fn input_char(&mut self, c: char) {
        if self.submitting {
            return;
        }
        if let Some(field) = self.focused_number_mut() {
            if can_add_digit(field.len(), c) {
                field.push(c);
            }
        }
    }

    pub fn backspace(&mut self) {
        if self.submitting {
            return;
        }
        if let Some(field) = self.focused_number_mut() {
            field.pop();
        }
    }

    /// Flip the focused checkbox. The auto flags stay off for users without
    /// permission to use them.
    pub fn toggle_focused_flag(&mut self) {
        if self.submitting {
            return;
        }
        let allow_auto = self.allow_auto();
        match self.param_field {
            ParamField::Headless if allow_auto => self.options.headless = !self.options.headless,
            ParamField::AutoCredentials if allow_auto => {
                self.options.auto_credentials = !self.options.auto_credentials
            }
            ParamField::DevMode => self.options.dev_mode = !self.options.dev_mode,
            _ => {}
        }
    }

    /// Validate the form and queue the runs for dispatch.
    /// Validation problems are shown in the form and nothing is queued.
    pub fn request_submit(&mut self) {
        if self.submitting {
            return;
        }
        self.error = None;
        self.success = None;

        match self.options.build_requests(&self.user, &self.selected_slugs()) {
            Ok(requests) => {
                self.pending = Some(requests);
                self.submitting = true;
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
    }

    fn take_pending(&mut self) -> Option<Vec<TaskRunRequest>> {
        self.pending.take()
    }

    fn finish_submit(&mut self, result: Result<Vec<TaskRun>>) {
        self.submitting = false;
        match result {
            Ok(runs) => {
                self.success = Some(format!("{} task(s) dispatched.", runs.len()));
            }
            Err(e) => {
                warn!(error = %e, "Task dispatch failed");
                self.error = Some(DISPATCH_FAILED_MESSAGE.to_string());
            }
        }
    }

    pub fn set_runs(&mut self, runs: Vec<TaskRun>) {
        self.runs = runs;
        self.run_selection = self.run_selection.min(self.runs.len().saturating_sub(1));
    }

    /// Apply any run lists the poller delivered since the last frame.
    fn drain_polled_runs(&mut self) {
        let mut latest = None;
        while let Ok(runs) = self.runs_rx.try_recv() {
            latest = Some(runs);
        }
        if let Some(runs) = latest {
            self.set_runs(runs);
        }
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    pub config: Config,
    api: Arc<dyn AutomationApi>,
    pub session: SessionManager,
    session_rx: watch::Receiver<SessionState>,
    pub session_state: SessionState,

    pub state: AppState,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub login_busy: bool,

    pub dashboard: Option<Dashboard>,
    refresh_requested: bool,

    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config, persist_token: bool) -> Result<Self> {
        debug!(base_url = %config.api_base_url, "App::new() starting");

        let api_client = ApiClient::new(&config.api_base_url, config.request_timeout())?;
        let api: Arc<dyn AutomationApi> = Arc::new(api_client);

        let store_kind = if persist_token {
            config.token_store
        } else {
            TokenStoreKind::Memory
        };
        let cache_dir = config
            .cache_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("./cache"));
        let store = open_token_store(store_kind, cache_dir);
        debug!(?store_kind, "Token store opened");

        let session = SessionManager::new(Arc::clone(&api), store);
        Ok(Self::with_parts(config, api, session))
    }

    fn with_parts(config: Config, api: Arc<dyn AutomationApi>, session: SessionManager) -> Self {
        let session_rx = session.subscribe();
        let session_state = session.state();

        // Get credentials from env vars or config
        let login_email = std::env::var(ENV_EMAIL)
            .ok()
            .or_else(|| config.last_email.clone())
            .unwrap_or_default();
        let login_password = std::env::var(ENV_PASSWORD).unwrap_or_default();

        Self {
            config,
            api,
            session,
            session_rx,
            session_state,
            state: AppState::Normal,
            login_email,
            login_password,
            login_focus: LoginFocus::Email,
            login_error: None,
            login_busy: false,
            dashboard: None,
            refresh_requested: false,
            status_message: None,
        }
    }

    /// Restore any persisted session.
    pub async fn start(&mut self) {
        self.session.initialize().await;
        self.sync_session().await;
        if self.session_state.phase() == SessionPhase::Unauthenticated {
            self.start_login();
        }
    }

    /// Session phase as the UI sees it. A session still being restored counts
    /// as authenticating even before a token has been read.
    pub fn phase(&self) -> SessionPhase {
        if self.session_state.loading {
            SessionPhase::Authenticating
        } else {
            self.session_state.phase()
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Reset the login form for a fresh attempt.
    pub fn start_login(&mut self) {
        self.login_focus = if self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
        self.login_busy = false;
    }

    /// Queue a login with the current form contents.
    pub fn request_login(&mut self) {
        if self.login_busy {
            return;
        }
        if self.login_email.trim().is_empty() || self.login_password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return;
        }
        self.login_error = None;
        self.login_busy = true;
    }

    /// Attempt login with the credentials from the login form
    async fn attempt_login(&mut self) {
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        match self.session.login(&email, &password).await {
            Ok(()) => {
                self.config.last_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                self.login_password.clear();
                self.login_error = None;
                self.status_message = None;
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.login_error = Some(LOGIN_FAILED_MESSAGE.to_string());
            }
        }
        self.login_busy = false;
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.status_message = Some("Signed out.".to_string());
    }

    // =========================================================================
    // Background updates
    // =========================================================================

    /// Follow session changes: build the dashboard on authentication, tear it
    /// down when the session ends.
    async fn sync_session(&mut self) {
        if self.session_rx.has_changed().unwrap_or(false) {
            self.session_state = self.session_rx.borrow_and_update().clone();
        }

        let user = self
            .session_state
            .user
            .clone()
            .filter(|_| self.session_state.is_authenticated());

        match user {
            Some(user) if self.dashboard.is_none() => {
                let api = Arc::clone(&self.api);
                self.dashboard = Some(Dashboard::activate(api, user, &self.config).await);
            }
            None if self.dashboard.is_some() => {
                info!("Session ended, closing dashboard");
                self.dashboard = None;
                self.start_login();
            }
            _ => {}
        }
    }

    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    async fn refresh_runs_now(&mut self) {
        match self.api.list_runs().await {
            Ok(runs) => {
                if let Some(dashboard) = self.dashboard.as_mut() {
                    dashboard.set_runs(runs);
                }
                self.status_message = None;
            }
            Err(e) => {
                warn!(error = %e, "Run list refresh failed");
                self.status_message = Some(RUNS_REFRESH_FAILED_MESSAGE.to_string());
            }
        }
    }

    async fn dispatch_pending(&mut self) {
        let Some(requests) = self.dashboard.as_mut().and_then(|d| d.take_pending()) else {
            return;
        };
        let result = dispatch_runs(self.api.as_ref(), &requests).await;
        let succeeded = result.is_ok();

        // The dashboard may have been torn down while the requests were out.
        if let Some(dashboard) = self.dashboard.as_mut() {
            dashboard.finish_submit(result);
        }
        if succeeded {
            self.refresh_runs_now().await;
        }
    }

    /// Run work queued by input handlers. Called after each frame is drawn so
    /// busy indicators are visible while requests are out.
    pub async fn run_pending_actions(&mut self) {
        if self.login_busy {
            self.attempt_login().await;
        }
        self.dispatch_pending().await;
        if std::mem::take(&mut self.refresh_requested) {
            self.refresh_runs_now().await;
        }
    }

    /// Pick up session changes and polled run lists.
    pub async fn check_background_tasks(&mut self) {
        self.sync_session().await;
        if let Some(dashboard) = self.dashboard.as_mut() {
            dashboard.drain_polled_runs();
        }
    }
}

// ============================================================================
// Input validation
// ============================================================================

fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_digit(current_len: usize, c: char) -> bool {
    current_len < MAX_NUMBER_LENGTH && c.is_ascii_digit()
}
