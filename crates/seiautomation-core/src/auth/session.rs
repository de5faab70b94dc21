use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AutomationApi;
use crate::models::User;

use super::TokenStore;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login failed")]
    LoginFailed(#[source] anyhow::Error),

    #[error("Logged in, but the user profile could not be loaded")]
    ProfileUnavailable,
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// Snapshot of the session as published to observers.
///
/// `user` is only ever set alongside a token that `/auth/me` accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<User>,
    pub loading: bool,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match (&self.token, &self.user) {
            (None, _) => SessionPhase::Unauthenticated,
            (Some(_), Some(_)) if !self.loading => SessionPhase::Authenticated,
            (Some(_), _) => SessionPhase::Authenticating,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }
}

/// Owns the token lifecycle: acquiring it, persisting it, attaching it to the
/// API client, and dropping all of it when the server stops accepting it.
///
/// Every transition is published as a single `SessionState` on a watch
/// channel, so subscribers never observe a token without its matching user.
pub struct SessionManager {
    api: Arc<dyn AutomationApi>,
    store: Box<dyn TokenStore>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn AutomationApi>, store: Box<dyn TokenStore>) -> Self {
        let initial = SessionState {
            loading: true,
            ..SessionState::default()
        };
        let (state_tx, _) = watch::channel(initial);
        Self {
            api,
            store,
            state_tx,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state_tx.borrow().user.clone()
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn publish(&self, state: SessionState) {
        debug!(phase = ?state.phase(), loading = state.loading, "Session state changed");
        self.state_tx.send_replace(state);
    }

    /// Drop the token everywhere it lives and forget the user.
    fn clear_session(&self) {
        self.api.set_token(None);
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove persisted token");
        }
        self.publish(SessionState::default());
    }

    /// Restore the session persisted by a previous run, if any.
    pub async fn initialize(&mut self) {
        match self.store.read() {
            None => {
                debug!("No persisted token");
                self.api.set_token(None);
                self.publish(SessionState::default());
            }
            Some(token) => {
                debug!("Persisted token found, validating");
                self.api.set_token(Some(token.clone()));
                self.publish(SessionState {
                    token: Some(token),
                    user: None,
                    loading: true,
                });
                self.fetch_current_user().await;
            }
        }
    }

    /// Validate the held token by fetching the profile it belongs to.
    ///
    /// Any failure, network errors included, is treated as an invalid token
    /// and ends the session.
    pub async fn fetch_current_user(&mut self) {
        let token = self.state_tx.borrow().token.clone();
        let Some(token) = token else {
            self.publish(SessionState::default());
            return;
        };

        match self.api.current_user().await {
            Ok(user) => {
                info!(user_id = user.id, "Session validated");
                self.publish(SessionState {
                    token: Some(token),
                    user: Some(user),
                    loading: false,
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to load current user, clearing session");
                self.clear_session();
            }
        }
    }

    /// Log in with email and password.
    ///
    /// A rejected login leaves the current state as it was. A login whose
    /// profile fetch then fails ends unauthenticated and returns
    /// `AuthError::ProfileUnavailable`.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<()> {
        let email = email.trim();

        let access = match self.api.login(email, password).await {
            Ok(access) => access,
            Err(e) => {
                warn!(error = %e, "Login rejected");
                return Err(AuthError::LoginFailed(e).into());
            }
        };

        let token = access.access_token;
        if let Err(e) = self.store.write(&token) {
            warn!(error = %e, "Failed to persist token");
        }
        self.api.set_token(Some(token.clone()));
        self.publish(SessionState {
            token: Some(token),
            user: None,
            loading: true,
        });

        self.fetch_current_user().await;

        let authenticated = self.state().is_authenticated();
        if authenticated {
            info!("Login successful");
            Ok(())
        } else {
            Err(AuthError::ProfileUnavailable.into())
        }
    }

    /// End the session locally. The server is not contacted.
    pub fn logout(&mut self) {
        info!("Logging out");
        self.clear_session();
    }
}
