use anyhow::{Context, Result};
use tracing::debug;

use crate::api::AutomationApi;
use crate::models::TaskDefinition;

/// Display order of the known automations.
pub const TASK_ORDER: [&str; 3] = ["download_zip", "annotate_ok", "export_relation"];

fn order_of(slug: &str) -> usize {
    TASK_ORDER
        .iter()
        .position(|known| *known == slug)
        .unwrap_or(TASK_ORDER.len())
}

/// Sort into `TASK_ORDER`. Unknown slugs go last, in the order received.
pub fn sort_tasks(mut tasks: Vec<TaskDefinition>) -> Vec<TaskDefinition> {
    tasks.sort_by_key(|task| order_of(&task.slug));
    tasks
}

/// Fetch the task catalog in display order.
pub async fn load_catalog(api: &dyn AutomationApi) -> Result<Vec<TaskDefinition>> {
    let tasks = api.list_tasks().await.context("Failed to load task catalog")?;
    debug!(count = tasks.len(), "Task catalog loaded");
    Ok(sort_tasks(tasks))
}
