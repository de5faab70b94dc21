use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::AutomationApi;
use crate::models::TaskRun;

/// Repeating run-list refresh owned by the dashboard.
///
/// The first load happens immediately, then once per period. Failed polls are
/// logged and skipped. The task ends when the poller is dropped or when the
/// receiving side of the channel goes away.
pub struct RunPoller {
    handle: JoinHandle<()>,
}

impl RunPoller {
    /// Poll `list_runs` on `api` every `period`.
    pub fn for_api(
        api: Arc<dyn AutomationApi>,
        period: Duration,
        tx: mpsc::Sender<Vec<TaskRun>>,
    ) -> Self {
        Self::spawn(
            period,
            move || {
                let api = Arc::clone(&api);
                async move { api.list_runs().await }.boxed()
            },
            tx,
        )
    }

    /// Run `fetch` every `period`, forwarding successful results to `tx`.
    pub fn spawn<F, Fut>(period: Duration, fetch: F, tx: mpsc::Sender<Vec<TaskRun>>) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<TaskRun>>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                match fetch().await {
                    Ok(runs) => {
                        debug!(count = runs.len(), "Run list refreshed");
                        if tx.send(runs).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Run list refresh failed, retrying next interval");
                    }
                }
            }
            debug!("Run poller stopped");
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for RunPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
